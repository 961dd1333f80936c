use serde::{Deserialize, Serialize};

use std::{fs::File, io::ErrorKind as IoErrorKind, path::Path, str::FromStr};

use super::*;
use crate::error::ErrorKind;
use crate::session::Session;

use thiserror::Error;

/// Extended options for flashing a binary file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinOptions {
    /// The address in memory where the binary will be put at.
    ///
    /// Raw binaries carry no addressing, so flashing one without a base address fails.
    pub base_address: Option<u64>,
    /// The number of bytes to skip at the start of the binary file.
    pub skip: u32,
}

/// A finite list of all the available binary formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Format {
    /// Marks a file in binary format. This means that the file contains the contents of the flash 1:1.
    /// [BinOptions] can be used to define the location in flash where the file contents should be put at.
    /// Additionally using the same config struct, you can skip the first N bytes of the binary file to have them not put into the flash.
    Bin(BinOptions),
    /// Marks a file in [Intel HEX](https://en.wikipedia.org/wiki/Intel_HEX) format.
    Hex,
    /// Marks a file in the [ELF](https://en.wikipedia.org/wiki/Executable_and_Linkable_Format) format.
    Elf,
}

impl Format {
    /// Detects the format of a file from its extension.
    ///
    /// `.elf` and `.axf` files are ELF, `.hex` and `.ihex` files are Intel HEX and
    /// `.bin` files are raw binaries placed according to `bin_options`, which must name a
    /// base address.
    pub fn from_path(path: &Path, bin_options: BinOptions) -> Result<Format, FileDownloadError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("elf" | "axf") => Ok(Format::Elf),
            Some("hex" | "ihex") => Ok(Format::Hex),
            Some("bin") if bin_options.base_address.is_none() => {
                Err(FileDownloadError::MissingBaseAddress)
            }
            Some("bin") => Ok(Format::Bin(bin_options)),
            _ => Err(FileDownloadError::UnknownFormat(path.display().to_string())),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "bin" | "binary" => Ok(Format::Bin(BinOptions {
                base_address: None,
                skip: 0,
            })),
            "hex" | "ihex" | "intelhex" => Ok(Format::Hex),
            "elf" | "axf" => Ok(Format::Elf),
            _ => Err(format!("Format '{s}' is unknown.")),
        }
    }
}

/// A finite list of all the errors that can occur when flashing a given file.
///
/// This includes corrupt file issues,
/// OS permission issues as well as chip connectivity and memory boundary issues.
#[derive(Debug, Error)]
pub enum FileDownloadError {
    /// An error with the actual flashing procedure has occured.
    #[error("Error while flashing")]
    Flash(#[from] FlashError),
    /// Reading and decoding the IHEX file has failed due to the given error.
    #[error("Could not read ihex format")]
    IhexRead(#[from] ihex::ReaderError),
    /// An IO error has occured while reading the firmware file.
    #[error("I/O error")]
    IO(#[from] std::io::Error),
    /// The given error has occured while reading the object file.
    #[error("Object Error: {0}.")]
    Object(&'static str),
    /// Reading and decoding the given ELF file has resulted in the given error.
    #[error("Could not read ELF file")]
    Elf(#[from] object::read::Error),
    /// No loadable segments were found in the ELF file.
    ///
    /// This is most likely because of a bad linker script.
    #[error("No loadable ELF sections were found.")]
    NoLoadableSegments,
    /// A raw binary was given without the address to put it at.
    #[error("A base address is required to flash a raw binary.")]
    MissingBaseAddress,
    /// The format of the file could not be detected from its name.
    #[error("The format of '{0}' is unknown.")]
    UnknownFormat(String),
}

impl FileDownloadError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FileDownloadError::Flash(error) => error.kind(),
            FileDownloadError::IO(error) if error.kind() == IoErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            FileDownloadError::UnknownFormat(_) | FileDownloadError::MissingBaseAddress => {
                ErrorKind::Unsupported
            }
            _ => ErrorKind::FlashError,
        }
    }
}

/// Options for downloading a file onto a target chip.
#[derive(Debug, Default)]
pub struct DownloadOptions<'progress> {
    /// The progress reporter. The default reporter ignores all events.
    pub progress: FlashProgress<'progress>,
    /// If `keep_unwritten_bytes` is `true`, erased portions of the flash that are not overwritten by the ELF data
    /// are restored afterwards, such that the old contents are untouched.
    ///
    /// This is necessary because the flash can only be erased in sectors. If only parts of the erased sector are written thereafter,
    /// instead of the full sector, the excessively erased bytes wont match the contents before the erase which might not be intuitive
    /// to the user or even worse, result in unexpected behavior if those contents contain important data.
    ///
    /// Ignored for a chip erase.
    pub keep_unwritten_bytes: bool,
    /// If this flag is set to true, the whole flash is erased before programming,
    /// with the mass erase routine of the flash algorithm if it has one.
    pub do_chip_erase: bool,
    /// After flashing, read back all the flashed data to verify it has been written correctly.
    pub verify: bool,
    /// Before erasing, read back the flash and skip the sectors which already hold the image.
    ///
    /// Ignored for a chip erase.
    pub preverify: bool,
    /// Build the flash layout and report it, without touching the target.
    pub dry_run: bool,
}

/// Downloads a file of given `format` at `path` to the flash of the target given in `session`.
///
/// This will ensure that memory bounderies are honored and does erasing and programming of the flash for you.
///
/// If you are looking for more options, have a look at [download_file_with_options].
pub fn download_file(
    session: &mut Session,
    path: impl AsRef<Path>,
    format: Format,
) -> Result<(), FileDownloadError> {
    download_file_with_options(session, path, format, DownloadOptions::default())
}

/// Downloads a file of given `format` at `path` to the flash of the target given in `session`.
///
/// This will ensure that memory bounderies are honored and does erasing and programming of the flash for you.
///
/// If you are looking for a simple version without many options, have a look at [download_file].
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn download_file_with_options(
    session: &mut Session,
    path: impl AsRef<Path>,
    format: Format,
    options: DownloadOptions<'_>,
) -> Result<(), FileDownloadError> {
    let file = File::open(path.as_ref())?;

    let mut loader = session.target().flash_loader();

    match format {
        Format::Bin(bin_options) => loader.load_bin_data(file, bin_options),
        Format::Elf => loader.load_elf_data(file),
        Format::Hex => loader.load_hex_data(file),
    }?;

    loader.commit(session, options)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use std::str::FromStr;

    use super::{BinOptions, FileDownloadError, Format};
    use crate::error::ErrorKind;

    #[test]
    fn parse_format() {
        assert_eq!(Format::from_str("hex"), Ok(Format::Hex));
        assert_eq!(Format::from_str("Hex"), Ok(Format::Hex));
        assert_eq!(Format::from_str("Ihex"), Ok(Format::Hex));
        assert_eq!(Format::from_str("IntelHex"), Ok(Format::Hex));
        assert_eq!(
            Format::from_str("bin"),
            Ok(Format::Bin(BinOptions {
                base_address: None,
                skip: 0
            }))
        );
        assert_eq!(
            Format::from_str("Binary"),
            Ok(Format::Bin(BinOptions {
                base_address: None,
                skip: 0
            }))
        );
        assert_eq!(Format::from_str("Elf"), Ok(Format::Elf));
        assert_eq!(
            Format::from_str("elfbin"),
            Err("Format 'elfbin' is unknown.".to_string())
        );
        assert_eq!(
            Format::from_str(""),
            Err("Format '' is unknown.".to_string())
        );
    }

    #[test]
    fn format_from_extension() {
        let bin = BinOptions {
            base_address: Some(0x0800_0000),
            skip: 4,
        };

        assert_eq!(
            Format::from_path(Path::new("firmware.elf"), bin).unwrap(),
            Format::Elf
        );
        assert_eq!(
            Format::from_path(Path::new("firmware.AXF"), bin).unwrap(),
            Format::Elf
        );
        assert_eq!(
            Format::from_path(Path::new("dir/firmware.ihex"), bin).unwrap(),
            Format::Hex
        );
        assert_eq!(
            Format::from_path(Path::new("firmware.bin"), bin).unwrap(),
            Format::Bin(bin)
        );
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        for name in ["firmware", "firmware.uf2", "firmware.bin.gz"] {
            let error = Format::from_path(Path::new(name), BinOptions::default()).unwrap_err();

            assert!(matches!(error, FileDownloadError::UnknownFormat(_)));
            assert_eq!(error.kind(), ErrorKind::Unsupported);
        }
    }

    #[test]
    fn bin_without_base_address_is_rejected() {
        let error = Format::from_path(Path::new("firmware.bin"), BinOptions::default()).unwrap_err();

        assert!(matches!(error, FileDownloadError::MissingBaseAddress));
        assert_eq!(error.kind(), ErrorKind::Unsupported);

        let skip_only = BinOptions {
            base_address: None,
            skip: 16,
        };
        assert!(Format::from_path(Path::new("firmware.BIN"), skip_only).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let error = FileDownloadError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}

use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, Instant};

use ihex::Record;
use object::elf::{FileHeader32, FileHeader64, PT_LOAD};
use object::read::elf::{FileHeader, ProgramHeader};
use object::Endianness;
use probe_host_target::{MemoryRange, MemoryRegion};

use super::builder::FlashBuilder;
use super::erase::erase_regions;
use super::flasher::{verify_blocks, Flasher};
use super::{
    BinOptions, DownloadOptions, FileDownloadError, FlashAlgorithm, FlashError, FlashProgress,
    ProgressOperation,
};
use crate::config::Target;
use crate::session::Session;
use crate::MemoryInterface;

/// How long the cores get to halt after the reset which precedes flashing.
pub(super) const RESET_HALT_TIMEOUT: Duration = Duration::from_millis(500);

/// `FlashLoader` is a struct which manages the flashing of any chunks of data onto any sections of flash.
///
/// Use [add_data()](FlashLoader::add_data) to add a chunk of data.
/// Once you are done adding all your data, use `commit()` to flash the data.
/// The flash loader will make sure to select the appropriate flash region for the right data chunks.
/// Region crossing data chunks are allowed as long as the regions are contiguous.
#[derive(Debug)]
pub struct FlashLoader {
    memory_map: Vec<MemoryRegion>,
    builder: FlashBuilder,
}

impl FlashLoader {
    /// Create a new flash loader.
    pub fn new(memory_map: Vec<MemoryRegion>) -> Self {
        Self {
            memory_map,
            builder: FlashBuilder::new(),
        }
    }

    /// Returns the region data can be written to which contains `address`.
    fn writable_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.memory_map.iter().find(|region| {
            region.contains(address)
                && match region {
                    MemoryRegion::Nvm(region) => !region.is_alias,
                    MemoryRegion::Ram(_) => true,
                    MemoryRegion::Generic(_) => false,
                }
        })
    }

    /// Stages a chunk of data to be programmed.
    ///
    /// The chunk can cross flash boundaries as long as one flash region connects to another flash region.
    pub fn add_data(&mut self, address: u64, data: &[u8]) -> Result<(), FlashError> {
        tracing::trace!(
            "Adding data at address {:#010x} with size {} bytes",
            address,
            data.len()
        );

        let end = address.saturating_add(data.len() as u64);
        let mut cursor = address;

        while cursor < end {
            let region = self
                .writable_region(cursor)
                .ok_or(FlashError::NoSuitableNvm {
                    start: address,
                    end,
                })?;
            cursor = region.address_range().end;
        }

        self.builder.add_data(address, data)
    }

    /// All staged data, as contiguous blocks in ascending address order.
    pub fn data(&self) -> impl Iterator<Item = (u64, &[u8])> {
        self.builder.blocks()
    }

    /// Reads the data from a binary file and adds it to the loader.
    pub fn load_bin_data<T: Read + Seek>(
        &mut self,
        mut file: T,
        options: BinOptions,
    ) -> Result<(), FileDownloadError> {
        let base_address = options
            .base_address
            .ok_or(FileDownloadError::MissingBaseAddress)?;

        // Skip the specified bytes.
        file.seek(SeekFrom::Start(u64::from(options.skip)))?;

        let mut buffer = vec![];
        file.read_to_end(&mut buffer)?;

        self.add_data(base_address, &buffer)?;

        Ok(())
    }

    /// Reads the HEX data segments and adds them as loadable data blocks to the loader.
    pub fn load_hex_data<T: Read>(&mut self, mut file: T) -> Result<(), FileDownloadError> {
        let mut base_address = 0;

        let mut data = String::new();
        file.read_to_string(&mut data)?;

        for record in ihex::Reader::new(&data) {
            match record? {
                Record::Data { offset, value } => {
                    let address = base_address + offset as u64;
                    self.add_data(address, &value)?;
                }
                Record::ExtendedSegmentAddress(address) => {
                    base_address = (address as u64) * 16;
                }
                Record::ExtendedLinearAddress(address) => {
                    base_address = (address as u64) << 16;
                }
                Record::EndOfFile
                | Record::StartSegmentAddress { .. }
                | Record::StartLinearAddress(_) => {}
            }
        }

        Ok(())
    }

    /// Prepares the data sections that have to be loaded into flash from an ELF file.
    ///
    /// The data of each loadable program header is put at its physical address.
    pub fn load_elf_data<T: Read>(&mut self, mut file: T) -> Result<(), FileDownloadError> {
        let mut buffer = vec![];
        file.read_to_end(&mut buffer)?;

        match object::FileKind::parse(buffer.as_slice())? {
            object::FileKind::Elf32 => {
                self.load_elf_segments::<FileHeader32<Endianness>>(&buffer)
            }
            object::FileKind::Elf64 => {
                self.load_elf_segments::<FileHeader64<Endianness>>(&buffer)
            }
            _ => Err(FileDownloadError::Object("Unsupported file type")),
        }
    }

    fn load_elf_segments<H>(&mut self, buffer: &[u8]) -> Result<(), FileDownloadError>
    where
        H: FileHeader<Endian = Endianness>,
    {
        let header = H::parse(buffer)?;
        let endian = header.endian()?;

        let mut loaded_segments = 0;

        for segment in header.program_headers(endian, buffer)? {
            if segment.p_type(endian) != PT_LOAD {
                continue;
            }

            // Get the physical address of the segment. The data will be programmed to that location.
            let p_paddr: u64 = segment.p_paddr(endian).into();

            let segment_data = segment
                .data(endian, buffer)
                .map_err(|_| FileDownloadError::Object("Failed to access data for an ELF segment."))?;

            if segment_data.is_empty() {
                continue;
            }

            tracing::info!(
                "Found loadable segment, address: {:#010x}, {} bytes",
                p_paddr,
                segment_data.len()
            );

            self.add_data(p_paddr, segment_data)?;
            loaded_segments += 1;
        }

        if loaded_segments == 0 {
            tracing::warn!("No loadable segments were found in the ELF file.");
            return Err(FileDownloadError::NoLoadableSegments);
        }

        Ok(())
    }

    /// Selects a flash algorithm and a core for every non-volatile region that has
    /// to be written. With `erase_all`, every region with an algorithm is selected.
    pub(super) fn flashers(
        &self,
        target: &Target,
        erase_all: bool,
    ) -> Result<Vec<Flasher>, FlashError> {
        let mut flashers = vec![];

        for region in self.memory_map.iter().filter_map(MemoryRegion::as_nvm_region) {
            if region.is_alias {
                continue;
            }

            let has_data = self.builder.blocks_in(&region.range).next().is_some();
            let region_name = || {
                region
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{:#010x?}", region.range))
            };

            let Some(raw) = target.flash_algorithm_for_region(region) else {
                if has_data {
                    return Err(FlashError::NoFlashLoaderAlgorithmAttached {
                        region: region_name(),
                    });
                }
                continue;
            };

            if !has_data && !erase_all {
                continue;
            }

            let algorithm = FlashAlgorithm::assemble(raw);
            let covered = self.builder.blocks_in(&region.range).all(|(address, data)| {
                algorithm
                    .flash_properties
                    .address_range
                    .contains_range(&(address..address + data.len() as u64))
            });
            if !covered {
                return Err(FlashError::NoFlashLoaderAlgorithmAttached {
                    region: region_name(),
                });
            }

            let core_index = raw
                .cores
                .iter()
                .chain(&region.cores)
                .find_map(|name| target.core_index_by_name(name))
                .unwrap_or(0);

            tracing::debug!(
                "Region {:#010x?} uses algorithm {} on core {}",
                region.range,
                algorithm.name,
                core_index
            );
            flashers.push(Flasher::new(algorithm, region.range.clone(), core_index));
        }

        Ok(flashers)
    }

    /// The image data which goes to RAM, with the core that writes it.
    fn ram_blocks<'a>(&'a self, target: &Target) -> Vec<(usize, u64, &'a [u8])> {
        self.memory_map
            .iter()
            .filter_map(MemoryRegion::as_ram_region)
            .flat_map(|region| {
                let core_index = region
                    .cores
                    .iter()
                    .find_map(|name| target.core_index_by_name(name))
                    .unwrap_or(0);

                self.builder
                    .blocks_in(&region.range)
                    .map(move |(address, data)| (core_index, address, data))
            })
            .collect()
    }

    /// Writes all the stored data chunks to flash and RAM.
    ///
    /// The phases run in this order, each reported through the progress of `options`:
    /// preverify (as [`ProgressOperation::Fill`]), reading the bytes to keep
    /// ([`ProgressOperation::Fill`]), erase, program and verify.
    #[tracing::instrument(skip_all)]
    pub fn commit(
        &self,
        session: &mut Session,
        options: DownloadOptions<'_>,
    ) -> Result<(), FlashError> {
        let DownloadOptions {
            mut progress,
            keep_unwritten_bytes,
            do_chip_erase,
            verify,
            preverify,
            dry_run,
        } = options;

        tracing::debug!("Committing FlashLoader!");

        let mut flashers = self.flashers(session.target(), do_chip_erase)?;
        let ram_blocks = self.ram_blocks(session.target());

        if !dry_run {
            let mut cores: BTreeSet<usize> = flashers.iter().map(Flasher::core_index).collect();
            cores.extend(ram_blocks.iter().map(|(core_index, _, _)| *core_index));

            for core_index in cores {
                session.core(core_index)?.reset_and_halt(RESET_HALT_TIMEOUT)?;
            }
        }

        let mut changed_sectors = vec![None; flashers.len()];

        if preverify && do_chip_erase {
            tracing::warn!("Skipping preverify, the chip erase rewrites every sector");
            progress.message("Preverify is skipped for a chip erase.".to_string());
        } else if preverify && dry_run {
            tracing::debug!("Skipping preverify for a dry run");
        } else if preverify {
            let total = flashers.iter().map(|f| f.image_size(&self.builder)).sum();

            changed_sectors = run_phase(&mut progress, ProgressOperation::Fill, total, |progress| {
                flashers
                    .iter()
                    .map(|flasher| {
                        let mut core = session.core(flasher.core_index())?;
                        flasher
                            .changed_sectors(&mut core, &self.builder, progress)
                            .map(Some)
                    })
                    .collect()
            })?;
        }

        let keep_unwritten_bytes = keep_unwritten_bytes && !do_chip_erase;
        for (flasher, sectors) in flashers.iter_mut().zip(&changed_sectors) {
            flasher.plan(&self.builder, sectors.as_ref(), keep_unwritten_bytes);
        }

        progress.initialized(flashers.iter().map(|f| f.layout().clone()).collect());

        if dry_run {
            tracing::info!("Dry run, leaving the target untouched");
            return Ok(());
        }

        if keep_unwritten_bytes {
            let total = flashers.iter().map(Flasher::fill_size).sum();

            run_phase(&mut progress, ProgressOperation::Fill, total, |progress| {
                for flasher in flashers.iter_mut() {
                    let mut core = session.core(flasher.core_index())?;
                    flasher.fill(&mut core, progress)?;
                }
                Ok(())
            })?;
        }

        if do_chip_erase {
            erase_regions(session, &flashers, &mut progress)?;
        } else {
            let total = flashers.iter().map(Flasher::erase_size).sum();

            run_phase(&mut progress, ProgressOperation::Erase, total, |progress| {
                for flasher in &flashers {
                    let mut core = session.core(flasher.core_index())?;
                    flasher.erase_sectors(&mut core, progress)?;
                }
                Ok(())
            })?;
        }

        let ram_size: u64 = ram_blocks.iter().map(|(_, _, data)| data.len() as u64).sum();
        let total = flashers.iter().map(Flasher::program_size).sum::<u64>() + ram_size;

        run_phase(&mut progress, ProgressOperation::Program, total, |progress| {
            for flasher in &flashers {
                let mut core = session.core(flasher.core_index())?;
                flasher.program(&mut core, progress)?;
            }

            for (core_index, address, data) in &ram_blocks {
                let t = Instant::now();
                session.core(*core_index)?.write_8(*address, data)?;
                progress.progressed(ProgressOperation::Program, data.len() as u64, t.elapsed());
            }
            Ok(())
        })?;

        if verify {
            let total = flashers
                .iter()
                .map(|f| f.image_size(&self.builder))
                .sum::<u64>()
                + ram_size;

            run_phase(&mut progress, ProgressOperation::Verify, total, |progress| {
                for flasher in &flashers {
                    let mut core = session.core(flasher.core_index())?;
                    verify_blocks(&mut core, self.builder.blocks_in(flasher.region()), progress)?;
                }

                for (core_index, address, data) in &ram_blocks {
                    let mut core = session.core(*core_index)?;
                    verify_blocks(&mut core, std::iter::once((*address, *data)), progress)?;
                }
                Ok(())
            })?;
        }

        tracing::info!("Flashing done");

        Ok(())
    }
}

/// Runs one phase of the flashing procedure, bracketed by its progress events.
pub(super) fn run_phase<T>(
    progress: &mut FlashProgress<'_>,
    operation: ProgressOperation,
    total: u64,
    phase: impl FnOnce(&mut FlashProgress<'_>) -> Result<T, FlashError>,
) -> Result<T, FlashError> {
    progress.add_progress_bar(operation, Some(total));
    progress.started(operation);

    match phase(progress) {
        Ok(value) => {
            progress.finished(operation);
            Ok(value)
        }
        Err(error) => {
            tracing::debug!("{operation:?} failed: {error}");
            progress.failed(operation);
            Err(error)
        }
    }
}

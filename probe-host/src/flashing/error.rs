use std::ops::Range;

use thiserror::Error;

use crate::error::{Error, ErrorKind};
use crate::probe::DebugProbeError;

/// Describes any error that happened during the or in preparation for the flashing procedure.
#[derive(Error, Debug)]
pub enum FlashError {
    /// No non-volatile memory or RAM contains the entire requested memory range.
    #[error(
        "No flash memory contains the entire requested memory range {start:#010X}..{end:#010X}."
    )]
    NoSuitableNvm {
        /// The start of the requested range.
        start: u64,
        /// The end of the requested range.
        end: u64,
    },

    /// The target has no flash algorithm for a region that has to be written.
    #[error("Trying to write flash region {region}, but no suitable flash loader algorithm is linked to the given target information.")]
    NoFlashLoaderAlgorithmAttached {
        /// The name of the region.
        region: String,
    },

    /// The probe driver can not run flash routines on the core.
    #[error("The probe driver cannot run flash routines on core {0}.")]
    RoutinesNotAvailable(usize),

    /// Erasing a sector failed.
    #[error("Failed to erase the sector at address {sector_address:#010X}.")]
    EraseFailed {
        /// The address of the sector.
        sector_address: u64,
        /// The error reported by the probe.
        #[source]
        source: DebugProbeError,
    },

    /// The mass erase of the flash failed.
    #[error("Failed to erase the whole flash with algorithm '{algorithm}'.")]
    ChipEraseFailed {
        /// The name of the flash algorithm.
        algorithm: String,
        /// The error reported by the probe.
        #[source]
        source: DebugProbeError,
    },

    /// Programming a page failed.
    #[error("The page write of the page at address {page_address:#010X} failed.")]
    PageWrite {
        /// The address of the page.
        page_address: u64,
        /// The error reported by the probe.
        #[source]
        source: DebugProbeError,
    },

    /// Something during the interaction with the core went wrong.
    #[error("Something during the interaction with the core went wrong")]
    Core(#[source] Box<Error>),

    /// The contents of the target do not match the image after programming.
    #[error("Verification failed, the target differs from the image at address {address:#010X}.")]
    Verify {
        /// The first address with a mismatch.
        address: u64,
    },

    /// Data was added to a range which already holds data.
    #[error("Data to be written overlaps with already added data: {added_addresses:#010X?} overlaps {existing_addresses:#010X?}")]
    DataOverlaps {
        /// The range of the added data.
        added_addresses: Range<u64>,
        /// The range of the data that was already present.
        existing_addresses: Range<u64>,
    },
}

impl FlashError {
    /// Classifies the flash error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlashError::Verify { .. } => ErrorKind::VerifyFailed,
            FlashError::Core(error) if error.kind() == ErrorKind::TransportError => {
                ErrorKind::TransportError
            }
            FlashError::EraseFailed { source, .. }
            | FlashError::ChipEraseFailed { source, .. }
            | FlashError::PageWrite { source, .. }
                if source.is_link_lost() =>
            {
                ErrorKind::TransportError
            }
            _ => ErrorKind::FlashError,
        }
    }
}

impl From<Error> for FlashError {
    fn from(error: Error) -> Self {
        match error {
            Error::Flash(error) => error,
            other => FlashError::Core(Box::new(other)),
        }
    }
}

use std::ops::Range;

use probe_host_target::{FlashProperties, PageInfo, RawFlashAlgorithm, SectorInfo};

use crate::probe::DebugProbeError;

/// A flash algorithm of a target, ready to be used by a [`FlashRoutines`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashAlgorithm {
    /// The name of the flash algorithm.
    pub name: String,
    /// Whether the algorithm can erase the whole flash at once.
    pub erase_all_supported: bool,
    /// The properties of the flash the algorithm operates on.
    pub flash_properties: FlashProperties,
}

impl FlashAlgorithm {
    /// Prepares a raw flash algorithm of a target description for use.
    pub fn assemble(raw: &RawFlashAlgorithm) -> Self {
        Self {
            name: raw.name.clone(),
            erase_all_supported: raw.erase_all,
            flash_properties: raw.flash_properties.clone(),
        }
    }

    /// The sector containing `address`.
    pub fn sector_info(&self, address: u64) -> Option<SectorInfo> {
        self.flash_properties.sector_info(address)
    }

    /// The page containing `address`.
    pub fn page_info(&self, address: u64) -> Option<PageInfo> {
        self.flash_properties.page_info(address)
    }

    /// The sectors which intersect `range`, in ascending order.
    pub fn sectors_in(&self, range: &Range<u64>) -> impl Iterator<Item = SectorInfo> + '_ {
        let range = range.clone();
        self.flash_properties
            .iter_sectors()
            .skip_while(move |sector| sector.base_address + sector.size <= range.start)
            .take_while({
                let end = range.end;
                move |sector| sector.base_address < end
            })
    }

    /// The value of an erased byte.
    pub fn erased_byte_value(&self) -> u8 {
        self.flash_properties.erased_byte_value
    }
}

/// The routines of a flash algorithm, executed on the target by the probe driver.
///
/// Addresses are absolute. [`FlashRoutines::program_page`] is only called with
/// whole pages of sectors that have been erased before.
pub trait FlashRoutines {
    /// Erases the sector starting at `address`.
    fn erase_sector(
        &mut self,
        algorithm: &FlashAlgorithm,
        address: u64,
    ) -> Result<(), DebugProbeError>;

    /// Erases the whole flash the algorithm operates on.
    fn erase_all(&mut self, algorithm: &FlashAlgorithm) -> Result<(), DebugProbeError>;

    /// Programs the page starting at `address`.
    fn program_page(
        &mut self,
        algorithm: &FlashAlgorithm,
        address: u64,
        data: &[u8],
    ) -> Result<(), DebugProbeError>;
}

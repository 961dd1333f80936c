use std::collections::BTreeSet;
use std::ops::Range;
use std::time::Instant;

use super::builder::FlashBuilder;
use super::{
    FlashAlgorithm, FlashError, FlashLayout, FlashProgress, FlashRoutines, ProgressOperation,
};
use crate::{Core, MemoryInterface};

/// The largest block read from the target at once when comparing.
const READ_CHUNK_SIZE: usize = 0x1000;

/// Programs one non-volatile memory region with one flash algorithm.
///
/// The phases are driven by the [`FlashLoader`](super::FlashLoader), which brackets
/// them with progress events across all regions.
#[derive(Debug)]
pub(super) struct Flasher {
    algorithm: FlashAlgorithm,
    region: Range<u64>,
    core_index: usize,
    layout: FlashLayout,
}

impl Flasher {
    pub(super) fn new(algorithm: FlashAlgorithm, region: Range<u64>, core_index: usize) -> Self {
        Self {
            algorithm,
            region,
            core_index,
            layout: FlashLayout::default(),
        }
    }

    pub(super) fn algorithm(&self) -> &FlashAlgorithm {
        &self.algorithm
    }

    pub(super) fn region(&self) -> &Range<u64> {
        &self.region
    }

    pub(super) fn core_index(&self) -> usize {
        self.core_index
    }

    pub(super) fn layout(&self) -> &FlashLayout {
        &self.layout
    }

    fn routines<'c>(core: &'c mut Core<'_>) -> Result<&'c mut dyn FlashRoutines, FlashError> {
        let id = core.id();
        core.flash_routines()
            .ok_or(FlashError::RoutinesNotAvailable(id))
    }

    /// The number of image bytes inside the region.
    pub(super) fn image_size(&self, builder: &FlashBuilder) -> u64 {
        builder
            .blocks_in(&self.region)
            .map(|(_, data)| data.len() as u64)
            .sum()
    }

    /// Reads back the image ranges of the region and returns the base addresses of
    /// the sectors whose contents differ from the image.
    pub(super) fn changed_sectors(
        &self,
        core: &mut Core<'_>,
        builder: &FlashBuilder,
        progress: &mut FlashProgress<'_>,
    ) -> Result<BTreeSet<u64>, FlashError> {
        let mut changed = BTreeSet::new();
        let mut buffer = vec![];

        for (address, data) in builder.blocks_in(&self.region) {
            let block = address..address + data.len() as u64;

            for sector in self.algorithm.sectors_in(&block) {
                let start = block.start.max(sector.base_address);
                let end = block.end.min(sector.base_address + sector.size);
                let expected = &data[(start - address) as usize..(end - address) as usize];

                for (index, expected) in expected.chunks(READ_CHUNK_SIZE).enumerate() {
                    let chunk_address = start + (index * READ_CHUNK_SIZE) as u64;
                    let t = Instant::now();

                    buffer.resize(expected.len(), 0);
                    core.read_8(chunk_address, &mut buffer)?;
                    progress.progressed(ProgressOperation::Fill, expected.len() as u64, t.elapsed());

                    if buffer != expected {
                        changed.insert(sector.base_address);
                        break;
                    }
                }
            }
        }

        tracing::debug!(
            "{} sector(s) of region {:#010x?} differ from the image",
            changed.len(),
            self.region
        );

        Ok(changed)
    }

    /// Lays out the image data of the region. With `sectors` given, only those sectors
    /// are erased and programmed.
    pub(super) fn plan(
        &mut self,
        builder: &FlashBuilder,
        sectors: Option<&BTreeSet<u64>>,
        keep_unwritten_bytes: bool,
    ) {
        self.layout =
            builder.build_layout(&self.algorithm, &self.region, sectors, keep_unwritten_bytes);
    }

    /// The number of bytes read back by [`Flasher::fill`].
    pub(super) fn fill_size(&self) -> u64 {
        self.layout.fills().iter().map(|fill| fill.size()).sum()
    }

    /// The number of bytes erased by [`Flasher::erase_sectors`].
    pub(super) fn erase_size(&self) -> u64 {
        self.layout.sectors().iter().map(|sector| sector.size()).sum()
    }

    /// The number of bytes written by [`Flasher::program`].
    pub(super) fn program_size(&self) -> u64 {
        self.layout.pages().iter().map(|page| page.size()).sum()
    }

    /// Reads the bytes the image does not cover into the pages, so the erase does not lose them.
    pub(super) fn fill(
        &mut self,
        core: &mut Core<'_>,
        progress: &mut FlashProgress<'_>,
    ) -> Result<(), FlashError> {
        let fills = self.layout.fills().to_vec();

        for fill in fills {
            let t = Instant::now();

            let page = &mut self.layout.pages_mut()[fill.page_index()];
            let offset = (fill.address() - page.address()) as usize;
            let size = fill.size() as usize;
            core.read_8(fill.address(), &mut page.data_mut()[offset..offset + size])?;

            progress.progressed(ProgressOperation::Fill, fill.size(), t.elapsed());
        }

        Ok(())
    }

    /// Erases the sectors of the layout.
    pub(super) fn erase_sectors(
        &self,
        core: &mut Core<'_>,
        progress: &mut FlashProgress<'_>,
    ) -> Result<(), FlashError> {
        let routines = Self::routines(core)?;

        for sector in self.layout.sectors() {
            let t = Instant::now();

            routines
                .erase_sector(&self.algorithm, sector.address())
                .map_err(|source| FlashError::EraseFailed {
                    sector_address: sector.address(),
                    source,
                })?;

            progress.progressed(ProgressOperation::Erase, sector.size(), t.elapsed());
        }

        Ok(())
    }

    /// Erases the whole region, with the mass erase routine of the algorithm
    /// if it has one, and sector by sector otherwise.
    pub(super) fn erase_region(
        &self,
        core: &mut Core<'_>,
        mass_erase: bool,
        progress: &mut FlashProgress<'_>,
    ) -> Result<(), FlashError> {
        let routines = Self::routines(core)?;
        let region_size = self.region.end - self.region.start;

        if mass_erase {
            let t = Instant::now();

            tracing::debug!("Mass erasing with algorithm {}", self.algorithm.name);
            routines
                .erase_all(&self.algorithm)
                .map_err(|source| FlashError::ChipEraseFailed {
                    algorithm: self.algorithm.name.clone(),
                    source,
                })?;

            progress.progressed(ProgressOperation::Erase, region_size, t.elapsed());
            return Ok(());
        }

        tracing::debug!(
            "Algorithm {} has no mass erase, erasing {:#010x?} sector by sector",
            self.algorithm.name,
            self.region
        );
        for sector in self.algorithm.sectors_in(&self.region) {
            let t = Instant::now();

            routines
                .erase_sector(&self.algorithm, sector.base_address)
                .map_err(|source| FlashError::EraseFailed {
                    sector_address: sector.base_address,
                    source,
                })?;

            progress.progressed(ProgressOperation::Erase, sector.size, t.elapsed());
        }

        Ok(())
    }

    /// Programs the pages of the layout.
    pub(super) fn program(
        &self,
        core: &mut Core<'_>,
        progress: &mut FlashProgress<'_>,
    ) -> Result<(), FlashError> {
        let routines = Self::routines(core)?;

        for page in self.layout.pages() {
            let t = Instant::now();

            routines
                .program_page(&self.algorithm, page.address(), page.data())
                .map_err(|source| FlashError::PageWrite {
                    page_address: page.address(),
                    source,
                })?;

            progress.progressed(ProgressOperation::Program, page.size(), t.elapsed());
        }

        Ok(())
    }
}

/// Reads back every block and compares it with the expected contents.
pub(super) fn verify_blocks<'b>(
    core: &mut Core<'_>,
    blocks: impl Iterator<Item = (u64, &'b [u8])>,
    progress: &mut FlashProgress<'_>,
) -> Result<(), FlashError> {
    let mut buffer = vec![];

    for (address, data) in blocks {
        for (index, expected) in data.chunks(READ_CHUNK_SIZE).enumerate() {
            let chunk_address = address + (index * READ_CHUNK_SIZE) as u64;
            let t = Instant::now();

            buffer.resize(expected.len(), 0);
            core.read_8(chunk_address, &mut buffer)?;

            if let Some(offset) = buffer.iter().zip(expected).position(|(a, b)| a != b) {
                let address = chunk_address + offset as u64;
                tracing::warn!("Verification failed at {address:#010x}");
                return Err(FlashError::Verify { address });
            }

            progress.progressed(ProgressOperation::Verify, expected.len() as u64, t.elapsed());
        }
    }

    Ok(())
}

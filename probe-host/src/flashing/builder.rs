use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::ops::Range;

use probe_host_target::{PageInfo, SectorInfo};

use super::{FlashAlgorithm, FlashError};

/// The description of a page in flash.
#[derive(Clone, PartialEq, Eq)]
pub struct FlashPage {
    address: u64,
    data: Vec<u8>,
}

impl Debug for FlashPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashPage")
            .field("address", &format_args!("{:#010X}", self.address))
            .field("size", &format_args!("{:#X}", self.size()))
            .finish()
    }
}

impl FlashPage {
    /// Creates a page filled with the erased value of the flash.
    fn new(page_info: &PageInfo, erased_byte_value: u8) -> Self {
        Self {
            address: page_info.base_address,
            data: vec![erased_byte_value; page_info.size as usize],
        }
    }

    /// Returns the start address of the page.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Returns the size of the page in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns the data slice of the page.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the mut data slice of the page.
    pub(super) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// The description of a sector in flash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FlashSector {
    address: u64,
    size: u64,
}

impl Debug for FlashSector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashSector")
            .field("address", &format_args!("{:#010X}", self.address))
            .field("size", &format_args!("{:#X}", self.size))
            .finish()
    }
}

impl FlashSector {
    fn new(sector_info: &SectorInfo) -> Self {
        Self {
            address: sector_info.base_address,
            size: sector_info.size,
        }
    }

    /// Returns the start address of the sector.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Returns the size of the sector in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A range of a page which the image does not cover, and which is read back from
/// the target before the erase so it can be restored afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashFill {
    address: u64,
    size: u64,
    page_index: usize,
}

impl FlashFill {
    fn new(address: u64, size: u64, page_index: usize) -> Self {
        Self {
            address,
            size,
            page_index,
        }
    }

    /// Returns the start address of the fill.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Returns the size of the fill in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the corresponding page index of the fill.
    pub fn page_index(&self) -> usize {
        self.page_index
    }
}

/// The built layout of the data in flash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashLayout {
    sectors: Vec<FlashSector>,
    pages: Vec<FlashPage>,
    fills: Vec<FlashFill>,
}

impl FlashLayout {
    /// Get the sectors of the flash layout.
    pub fn sectors(&self) -> &[FlashSector] {
        &self.sectors
    }

    /// Get the pages of the flash layout.
    pub fn pages(&self) -> &[FlashPage] {
        &self.pages
    }

    /// Get the pages of the flash layout as mut.
    pub(super) fn pages_mut(&mut self) -> &mut [FlashPage] {
        &mut self.pages
    }

    /// Get the fills of the flash layout.
    pub fn fills(&self) -> &[FlashFill] {
        &self.fills
    }
}

/// The image data to be written, as non-overlapping blocks keyed by address.
///
/// Adjacent blocks are merged when added.
#[derive(Debug, Default, Clone)]
pub(super) struct FlashBuilder {
    blocks: BTreeMap<u64, Vec<u8>>,
}

impl FlashBuilder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Adds a block of data to be programmed at `address`.
    pub(super) fn add_data(&mut self, address: u64, data: &[u8]) -> Result<(), FlashError> {
        if data.is_empty() {
            return Ok(());
        }

        let end = address
            .checked_add(data.len() as u64)
            .ok_or(FlashError::NoSuitableNvm {
                start: address,
                end: u64::MAX,
            })?;

        // The last block starting before the end of the new one is the only candidate for an overlap.
        if let Some((&existing, block)) = self.blocks.range(..end).next_back() {
            let existing_end = existing + block.len() as u64;
            if existing_end > address {
                return Err(FlashError::DataOverlaps {
                    added_addresses: address..end,
                    existing_addresses: existing..existing_end,
                });
            }
        }

        let mut start = address;
        let mut merged = data.to_vec();

        let previous = self
            .blocks
            .range(..address)
            .next_back()
            .filter(|&(&previous, block)| previous + block.len() as u64 == address)
            .map(|(&previous, _)| previous);

        if let Some(previous) = previous {
            if let Some(mut block) = self.blocks.remove(&previous) {
                block.append(&mut merged);
                merged = block;
                start = previous;
            }
        }

        if let Some(mut next) = self.blocks.remove(&end) {
            merged.append(&mut next);
        }

        self.blocks.insert(start, merged);

        Ok(())
    }

    /// All blocks, in ascending address order.
    pub(super) fn blocks(&self) -> impl Iterator<Item = (u64, &[u8])> {
        self.blocks
            .iter()
            .map(|(&address, data)| (address, data.as_slice()))
    }

    /// The parts of the blocks which fall into `range`, in ascending address order.
    pub(super) fn blocks_in(&self, range: &Range<u64>) -> impl Iterator<Item = (u64, &[u8])> {
        let range = range.clone();

        self.blocks().filter_map(move |(address, data)| {
            let end = address + data.len() as u64;
            let start = address.max(range.start);
            let stop = end.min(range.end);

            if start >= stop {
                return None;
            }

            let offset = (start - address) as usize;
            Some((start, &data[offset..offset + (stop - start) as usize]))
        })
    }

    /// Returns `true` if no data was added.
    pub(super) fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Lays out the data inside `region` onto the sectors and pages of the flash.
    ///
    /// With `sectors` given, only those sectors are laid out. Pages without any data
    /// are left out unless `keep_unwritten_bytes` is set, in which case every page of
    /// a sector is programmed and the bytes the image does not cover become fills.
    pub(super) fn build_layout(
        &self,
        algorithm: &FlashAlgorithm,
        region: &Range<u64>,
        sectors: Option<&BTreeSet<u64>>,
        keep_unwritten_bytes: bool,
    ) -> FlashLayout {
        let mut touched = BTreeMap::new();
        for (address, data) in self.blocks_in(region) {
            for sector in algorithm.sectors_in(&(address..address + data.len() as u64)) {
                touched.insert(sector.base_address, sector);
            }
        }

        let erased_byte_value = algorithm.erased_byte_value();
        let mut layout = FlashLayout::default();

        for sector in touched.values() {
            if sectors.is_some_and(|sectors| !sectors.contains(&sector.base_address)) {
                continue;
            }

            layout.sectors.push(FlashSector::new(sector));

            let mut page_address = sector.base_address;
            while page_address < sector.base_address + sector.size {
                let Some(page) = algorithm.page_info(page_address) else {
                    break;
                };
                let page_range = page.address_range();
                page_address = page_range.end;

                let mut covered = self.blocks_in(&page_range).peekable();
                if covered.peek().is_none() && !keep_unwritten_bytes {
                    continue;
                }

                let page_index = layout.pages.len();
                let mut flash_page = FlashPage::new(&page, erased_byte_value);
                let mut cursor = page_range.start;

                for (address, data) in covered {
                    if keep_unwritten_bytes && address > cursor {
                        layout
                            .fills
                            .push(FlashFill::new(cursor, address - cursor, page_index));
                    }

                    let offset = (address - page_range.start) as usize;
                    flash_page.data_mut()[offset..offset + data.len()].copy_from_slice(data);
                    cursor = address + data.len() as u64;
                }

                if keep_unwritten_bytes && cursor < page_range.end {
                    layout.fills.push(FlashFill::new(
                        cursor,
                        page_range.end - cursor,
                        page_index,
                    ));
                }

                layout.pages.push(flash_page);
            }
        }

        layout
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::get_target_by_name;
    use pretty_assertions::assert_eq;

    fn algorithm() -> FlashAlgorithm {
        let target = get_target_by_name("stm32f407vgtx").unwrap();
        FlashAlgorithm::assemble(&target.flash_algorithms[0])
    }

    const FLASH: Range<u64> = 0x0800_0000..0x0810_0000;

    #[test]
    fn adjacent_blocks_are_merged() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0004, &[2, 2]).unwrap();
        builder.add_data(0x0800_0000, &[1, 1, 1, 1]).unwrap();
        builder.add_data(0x0800_0006, &[3]).unwrap();

        let blocks: Vec<_> = builder.blocks().collect();
        assert_eq!(blocks, vec![(0x0800_0000, &[1, 1, 1, 1, 2, 2, 3][..])]);
    }

    #[test]
    fn overlapping_blocks_are_rejected() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0000, &[0; 8]).unwrap();

        assert!(matches!(
            builder.add_data(0x0800_0007, &[0; 2]),
            Err(FlashError::DataOverlaps { .. })
        ));
        assert!(matches!(
            builder.add_data(0x07ff_fffc, &[0; 16]),
            Err(FlashError::DataOverlaps { .. })
        ));
        builder.add_data(0x0800_0008, &[0; 2]).unwrap();
    }

    #[test]
    fn blocks_are_clipped_to_a_range() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0000, &[0, 1, 2, 3, 4, 5]).unwrap();

        let blocks: Vec<_> = builder.blocks_in(&(0x0800_0002..0x0800_0004)).collect();
        assert_eq!(blocks, vec![(0x0800_0002, &[2, 3][..])]);
    }

    #[test]
    fn layout_of_a_partial_page() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0010, &[0xaa; 16]).unwrap();

        let layout = builder.build_layout(&algorithm(), &FLASH, None, false);

        assert_eq!(layout.sectors().len(), 1);
        assert_eq!(layout.sectors()[0].size(), 0x4000);
        assert_eq!(layout.pages().len(), 1);
        assert!(layout.fills().is_empty());

        let page = &layout.pages()[0];
        assert_eq!(page.address(), 0x0800_0000);
        assert_eq!(page.size(), 0x400);
        assert_eq!(page.data()[0x0f], 0xff);
        assert_eq!(page.data()[0x10], 0xaa);
        assert_eq!(page.data()[0x20], 0xff);
    }

    #[test]
    fn keeping_unwritten_bytes_fills_the_whole_sector() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0010, &[0xaa; 16]).unwrap();

        let layout = builder.build_layout(&algorithm(), &FLASH, None, true);

        assert_eq!(layout.pages().len(), 0x4000 / 0x400);
        assert_eq!(
            layout.fills()[..2].to_vec(),
            vec![
                FlashFill::new(0x0800_0000, 0x10, 0),
                FlashFill::new(0x0800_0020, 0x400 - 0x20, 0),
            ]
        );
        assert_eq!(layout.fills()[2], FlashFill::new(0x0800_0400, 0x400, 1));
    }

    #[test]
    fn layout_restricted_to_sectors() {
        let mut builder = FlashBuilder::new();
        builder.add_data(0x0800_0000, &[0; 4]).unwrap();
        builder.add_data(0x0800_4000, &[0; 4]).unwrap();

        let only_second = BTreeSet::from([0x0800_4000]);
        let layout = builder.build_layout(&algorithm(), &FLASH, Some(&only_second), false);

        assert_eq!(layout.sectors().len(), 1);
        assert_eq!(layout.sectors()[0].address(), 0x0800_4000);
        assert_eq!(layout.pages().len(), 1);
    }
}

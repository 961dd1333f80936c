use super::memory::{PageInfo, SectorDescription, SectorInfo};
use crate::serialize::{hex_range, hex_u_int};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Properties of flash memory, which
/// are used when programming Flash memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FlashProperties {
    /// The range of the device flash.
    #[serde(serialize_with = "hex_range")]
    pub address_range: Range<u64>,
    /// The page size of the device flash.
    #[serde(serialize_with = "hex_u_int")]
    pub page_size: u32,
    /// The value of a byte in flash that was just erased.
    #[serde(serialize_with = "hex_u_int")]
    pub erased_byte_value: u8,
    /// The approximative time it takes to program a page, in milliseconds.
    pub program_page_timeout: u32,
    /// The approximative time it takes to erase a sector, in milliseconds.
    pub erase_sector_timeout: u32,
    /// The available sectors of the device flash.
    #[serde(default)]
    pub sectors: Vec<SectorDescription>,
}

impl Default for FlashProperties {
    fn default() -> Self {
        FlashProperties {
            address_range: 0..0,
            page_size: 0,
            erased_byte_value: 0,
            program_page_timeout: 0,
            erase_sector_timeout: 0,
            sectors: vec![],
        }
    }
}

impl FlashProperties {
    /// Returns the sector containing `address`, if the address is inside the flash.
    pub fn sector_info(&self, address: u64) -> Option<SectorInfo> {
        if !self.address_range.contains(&address) {
            return None;
        }

        let offset = address - self.address_range.start;

        // The last description starting at or before the offset applies.
        let description = self
            .sectors
            .iter()
            .rev()
            .find(|description| description.address <= offset)?;

        if description.size == 0 {
            return None;
        }

        let sector_index = (offset - description.address) / description.size;
        let base_address =
            self.address_range.start + description.address + sector_index * description.size;

        Some(SectorInfo {
            base_address,
            size: description.size,
        })
    }

    /// Returns the page containing `address`, if the address is inside the flash.
    pub fn page_info(&self, address: u64) -> Option<PageInfo> {
        if !self.address_range.contains(&address) || self.page_size == 0 {
            return None;
        }

        let offset = address - self.address_range.start;
        let page_size = self.page_size as u64;

        Some(PageInfo {
            base_address: self.address_range.start + offset - offset % page_size,
            size: self.page_size,
        })
    }

    /// Iterates over all sectors of the flash, in ascending address order.
    pub fn iter_sectors(&self) -> impl Iterator<Item = SectorInfo> + '_ {
        let mut address = self.address_range.start;

        std::iter::from_fn(move || {
            let sector = self.sector_info(address)?;
            address = sector.base_address + sector.size;
            Some(sector)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stm32_like() -> FlashProperties {
        FlashProperties {
            address_range: 0x0800_0000..0x0804_0000,
            page_size: 0x400,
            erased_byte_value: 0xff,
            program_page_timeout: 400,
            erase_sector_timeout: 2000,
            sectors: vec![
                SectorDescription {
                    size: 0x4000,
                    address: 0x0,
                },
                SectorDescription {
                    size: 0x10000,
                    address: 0x10000,
                },
                SectorDescription {
                    size: 0x20000,
                    address: 0x20000,
                },
            ],
        }
    }

    #[test]
    fn sector_of_address_in_first_group() {
        let props = stm32_like();

        assert_eq!(
            props.sector_info(0x0800_4123),
            Some(SectorInfo {
                base_address: 0x0800_4000,
                size: 0x4000
            })
        );
    }

    #[test]
    fn sector_of_address_in_later_group() {
        let props = stm32_like();

        assert_eq!(
            props.sector_info(0x0803_ffff),
            Some(SectorInfo {
                base_address: 0x0802_0000,
                size: 0x20000
            })
        );
    }

    #[test]
    fn sector_outside_flash() {
        assert_eq!(stm32_like().sector_info(0x0804_0000), None);
    }

    #[test]
    fn all_sectors_cover_flash() {
        let props = stm32_like();
        let sectors: Vec<_> = props.iter_sectors().collect();

        assert_eq!(sectors.len(), 4 + 1 + 1);
        assert_eq!(sectors[0].base_address, 0x0800_0000);
        assert_eq!(
            sectors.last().map(|s| s.base_address + s.size),
            Some(0x0804_0000)
        );
    }

    #[test]
    fn page_of_address() {
        let page = stm32_like().page_info(0x0800_0401).unwrap();

        assert_eq!(page.address_range(), 0x0800_0400..0x0800_0800);
    }
}

//! Chip catalog schema
//!
//! Every chip the host can attach to is described by a [`ChipFamily`]. A family
//! groups chip variants which share a manufacturer and a set of flash
//! algorithms; each [`Chip`] variant lists its cores and its memory map.
//!
//! This crate only contains the schema structs, it does no I/O. The families
//! are usually read from YAML files.
#![warn(missing_docs)]

mod chip;
mod chip_family;
mod flash_algorithm;
mod flash_properties;
mod memory;
pub(crate) mod serialize;

pub use chip::{Chip, Core};
pub use chip_family::{Architecture, ChipFamily, CoreType, InstructionSet};
pub use flash_algorithm::RawFlashAlgorithm;
pub use flash_properties::FlashProperties;
pub use memory::{
    GenericRegion, MemoryAccess, MemoryRange, MemoryRegion, NvmRegion, PageInfo, RamRegion,
    SectorDescription, SectorInfo,
};

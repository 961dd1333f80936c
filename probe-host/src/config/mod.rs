//! Chip catalog and target descriptions.
//!
//! The catalog is built once per process from the chip family descriptions
//! embedded in the crate and never changes afterwards.

mod catalog;
mod registry;
mod target;

pub use catalog::{
    catalog, ChipCatalog, ChipSpecification, CoreSpecification, RegionSpecification,
};
pub use probe_host_target::{
    Chip, ChipFamily, CoreType, GenericRegion, InstructionSet, MemoryAccess, MemoryRange,
    MemoryRegion, NvmRegion, RamRegion, RawFlashAlgorithm,
};
pub use registry::{families, get_target_by_name, Registry, RegistryError};
pub use target::Target;

use super::registry::RegistryError;
use crate::flashing::FlashLoader;
use jep106::JEP106Code;
use probe_host_target::{
    Architecture, Chip, ChipFamily, Core, CoreType, MemoryRange, MemoryRegion, NvmRegion,
    RawFlashAlgorithm,
};

/// This describes a complete target with a fixed chip model and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The name of the target.
    pub name: String,
    /// The JEP106 code of the manufacturer.
    pub manufacturer: Option<JEP106Code>,
    /// The cores of the target.
    pub cores: Vec<Core>,
    /// The memory map of the target.
    pub memory_map: Vec<MemoryRegion>,
    /// The flash algorithms available for the target.
    pub flash_algorithms: Vec<RawFlashAlgorithm>,
}

impl Target {
    /// Create a new target for the given details.
    ///
    /// The flash algorithms named by the chip are resolved against the family.
    pub fn new(family: &ChipFamily, chip: &Chip) -> Result<Target, RegistryError> {
        let flash_algorithms = chip
            .flash_algorithms
            .iter()
            .map(|name| {
                family
                    .get_algorithm(name)
                    .cloned()
                    .ok_or_else(|| RegistryError::AlgorithmNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if chip.cores.is_empty() {
            return Err(RegistryError::InvalidChipFamilyDefinition(
                family.name.clone(),
                format!("variant `{}` does not contain any cores", chip.name),
            ));
        }

        Ok(Target {
            name: chip.name.clone(),
            manufacturer: family.manufacturer,
            cores: chip.cores.clone(),
            memory_map: chip.memory_map.clone(),
            flash_algorithms,
        })
    }

    /// The architecture of the target.
    ///
    /// All cores of a target share one architecture.
    pub fn architecture(&self) -> Architecture {
        self.cores
            .first()
            .map(|core| core.core_type.architecture())
            .unwrap_or(Architecture::Arm)
    }

    /// The type of the core with the given index.
    pub fn core_type(&self, core_index: usize) -> Option<CoreType> {
        self.cores.get(core_index).map(|core| core.core_type)
    }

    /// The name of the manufacturer, or `Generic` if the target has none.
    pub fn manufacturer_name(&self) -> &'static str {
        manufacturer_name(self.manufacturer)
    }

    /// Returns the flash algorithm to use for the given NVM region.
    ///
    /// A default algorithm is preferred over others covering the region.
    pub fn flash_algorithm_for_region(&self, region: &NvmRegion) -> Option<&RawFlashAlgorithm> {
        let mut algorithms = self.flash_algorithms.iter().filter(|algorithm| {
            algorithm
                .flash_properties
                .address_range
                .intersects_range(&region.range)
        });

        let first = algorithms.next()?;
        if first.default {
            return Some(first);
        }

        Some(algorithms.find(|a| a.default).unwrap_or(first))
    }

    /// The index of the core with the given name.
    pub fn core_index_by_name(&self, name: &str) -> Option<usize> {
        self.cores.iter().position(|core| core.name == name)
    }

    /// Creates a [`FlashLoader`] for the memory map of the target.
    pub fn flash_loader(&self) -> FlashLoader {
        FlashLoader::new(self.memory_map.clone())
    }

    /// Returns the memory region which contains `address`.
    pub fn memory_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.memory_map.iter().find(|region| region.contains(address))
    }
}

/// The JEP106 name of a manufacturer, or `Generic`.
pub(crate) fn manufacturer_name(manufacturer: Option<JEP106Code>) -> &'static str {
    manufacturer
        .and_then(|code| code.get())
        .unwrap_or("Generic")
}

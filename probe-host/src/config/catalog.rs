use super::registry::{registry, Registry, RegistryError};
use super::target::{manufacturer_name, Target};
use crate::error::Error;
use once_cell::sync::Lazy;
use probe_host_target::MemoryRegion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static CATALOG: Lazy<ChipCatalog> = Lazy::new(|| ChipCatalog::new(registry()));

/// The chip catalog of the internal registry.
pub fn catalog() -> &'static ChipCatalog {
    &CATALOG
}

#[derive(Debug)]
struct Manufacturer {
    name: String,
    models: Vec<String>,
}

/// An index view on a registry: manufacturers sorted by name, and the sorted
/// model names of each manufacturer.
#[derive(Debug)]
pub struct ChipCatalog {
    registry: &'static Registry,
    manufacturers: Vec<Manufacturer>,
}

impl ChipCatalog {
    /// Builds the index of a registry.
    pub fn new(registry: &'static Registry) -> Self {
        let mut by_manufacturer: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for family in registry.families() {
            by_manufacturer
                .entry(manufacturer_name(family.manufacturer))
                .or_default()
                .extend(family.variants.iter().map(|chip| chip.name.clone()));
        }

        let manufacturers = by_manufacturer
            .into_iter()
            .map(|(name, mut models)| {
                models.sort();
                models.dedup();
                Manufacturer {
                    name: name.to_string(),
                    models,
                }
            })
            .collect();

        Self {
            registry,
            manufacturers,
        }
    }

    fn manufacturer(&self, index: usize) -> Result<&Manufacturer, Error> {
        self.manufacturers
            .get(index)
            .ok_or_else(|| Error::CatalogEntryNotFound(format!("Manufacturer {index}")))
    }

    /// The number of manufacturers.
    pub fn manufacturer_count(&self) -> usize {
        self.manufacturers.len()
    }

    /// The name of the manufacturer with the given index.
    pub fn manufacturer_name(&self, index: usize) -> Result<&str, Error> {
        Ok(&self.manufacturer(index)?.name)
    }

    /// The number of models of a manufacturer.
    pub fn model_count(&self, manufacturer: usize) -> Result<usize, Error> {
        Ok(self.manufacturer(manufacturer)?.models.len())
    }

    /// The name of a model of a manufacturer.
    pub fn model_name(&self, manufacturer: usize, model: usize) -> Result<&str, Error> {
        self.manufacturer(manufacturer)?
            .models
            .get(model)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::CatalogEntryNotFound(format!("Model {model} of manufacturer {manufacturer}"))
            })
    }

    /// The specification of a model of a manufacturer.
    pub fn model_specs(&self, manufacturer: usize, model: usize) -> Result<ChipSpecification, Error> {
        let name = self.model_name(manufacturer, model)?;
        self.specs_by_name(name)
    }

    /// The specification of the chip with the given exact name.
    ///
    /// A name missing from the catalog is a [`Error::CatalogEntryNotFound`].
    pub fn specs_by_name(&self, name: &str) -> Result<ChipSpecification, Error> {
        let target = match self.registry.get_target_by_name(name) {
            Ok(target) => target,
            Err(RegistryError::ChipNotFound(chip)) => {
                return Err(Error::CatalogEntryNotFound(format!("Chip '{chip}'")))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ChipSpecification::from(&target))
    }
}

/// A core of a [`ChipSpecification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSpecification {
    /// The name of the core.
    pub name: String,
    /// The type of the core.
    #[serde(rename = "type")]
    pub core_type: String,
}

/// A memory region of a [`ChipSpecification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpecification {
    /// `Ram`, `Nvm` or `Generic`.
    pub kind: String,
    /// The name of the region.
    pub name: Option<String>,
    /// The first address of the region.
    pub start: u64,
    /// The first address after the region.
    pub end: u64,
}

/// The structured description of a chip, as reported by catalog queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipSpecification {
    /// The name of the manufacturer.
    pub manufacturer: String,
    /// The name of the chip.
    pub chip: String,
    /// The architecture of the cores.
    pub architecture: String,
    /// The cores of the chip.
    pub cores: Vec<CoreSpecification>,
    /// The total size of the RAM regions.
    pub ram_bytes: u64,
    /// The total size of the non-volatile regions, without aliases.
    pub nvm_bytes: u64,
    /// The memory map of the chip.
    pub regions: Vec<RegionSpecification>,
    /// The names of the flash algorithms of the chip.
    pub flash_algorithms: Vec<String>,
    /// The image format used when none is given.
    pub default_format: String,
}

impl ChipSpecification {
    /// Serializes the specification to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Other(e.into()))
    }
}

impl From<&Target> for ChipSpecification {
    fn from(target: &Target) -> Self {
        let size = |region: &MemoryRegion| {
            let range = region.address_range();
            range.end.saturating_sub(range.start)
        };

        let ram_bytes = target
            .memory_map
            .iter()
            .filter(|region| region.is_ram())
            .map(size)
            .sum();

        let nvm_bytes = target
            .memory_map
            .iter()
            .filter(|region| matches!(region, MemoryRegion::Nvm(nvm) if !nvm.is_alias))
            .map(size)
            .sum();

        ChipSpecification {
            manufacturer: target.manufacturer_name().to_string(),
            chip: target.name.clone(),
            architecture: target.architecture().to_string(),
            cores: target
                .cores
                .iter()
                .map(|core| CoreSpecification {
                    name: core.name.clone(),
                    core_type: core.core_type.to_string(),
                })
                .collect(),
            ram_bytes,
            nvm_bytes,
            regions: target
                .memory_map
                .iter()
                .map(|region| {
                    let range = region.address_range();
                    RegionSpecification {
                        kind: region.kind().to_string(),
                        name: region.name().map(str::to_string),
                        start: range.start,
                        end: range.end,
                    }
                })
                .collect(),
            flash_algorithms: target
                .flash_algorithms
                .iter()
                .map(|algorithm| algorithm.name.clone())
                .collect(),
            default_format: "elf".to_string(),
        }
    }
}

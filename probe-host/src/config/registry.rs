//! Internal target registry

use super::target::Target;
use once_cell::sync::Lazy;
use probe_host_target::ChipFamily;

/// Error type for all errors which occur when working
/// with the internal registry of targets.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The requested chip was not found in the registry.
    #[error("The requested chip '{0}' was not found in the list of known targets.")]
    ChipNotFound(String),
    /// The requested algorithm was not found in the registry.
    #[error("The requested flash algorithm '{0}' was not found.")]
    AlgorithmNotFound(String),
    /// An invalid [`ChipFamily`] was encountered.
    #[error("Invalid chip family definition ({0}): {1}")]
    InvalidChipFamilyDefinition(String, String),
    /// Parsing a target description file failed.
    #[error("An error occurred while parsing a target description file.")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(feature = "builtin-targets")]
const BUILTIN_TARGETS: &[(&str, &str)] = &[
    (
        "STM32F4_Series.yaml",
        include_str!("../../targets/STM32F4_Series.yaml"),
    ),
    (
        "nRF52_Series.yaml",
        include_str!("../../targets/nRF52_Series.yaml"),
    ),
    ("RP2040.yaml", include_str!("../../targets/RP2040.yaml")),
    ("esp32c3.yaml", include_str!("../../targets/esp32c3.yaml")),
    ("esp32s3.yaml", include_str!("../../targets/esp32s3.yaml")),
];

#[cfg(not(feature = "builtin-targets"))]
const BUILTIN_TARGETS: &[(&str, &str)] = &[];

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::from_builtin_families);

/// The chip families known to the process.
#[derive(Debug, Default)]
pub struct Registry {
    /// All the available chips.
    families: Vec<ChipFamily>,
}

impl Registry {
    fn from_builtin_families() -> Self {
        let registry = Self::from_yaml_sources(BUILTIN_TARGETS);
        tracing::debug!(
            "Loaded {} builtin chip families",
            registry.families.len()
        );
        registry
    }

    /// Builds a registry from named YAML chip family descriptions.
    ///
    /// Descriptions which do not parse or validate are logged and skipped.
    pub fn from_yaml_sources(sources: &[(&str, &str)]) -> Self {
        let mut families = Vec::with_capacity(sources.len());

        for (name, yaml) in sources {
            match Self::parse_family(yaml) {
                Ok(family) => families.push(family),
                Err(error) => tracing::warn!("Skipping target description {name}: {error}"),
            }
        }

        Self { families }
    }

    fn parse_family(yaml: &str) -> Result<ChipFamily, RegistryError> {
        let family: ChipFamily = serde_yaml::from_str(yaml)?;

        family
            .validate()
            .map_err(|e| RegistryError::InvalidChipFamilyDefinition(family.name.clone(), e))?;

        Ok(family)
    }

    /// All chip families of the registry.
    pub fn families(&self) -> &[ChipFamily] {
        &self.families
    }

    /// Resolves a chip by its exact name.
    pub fn get_target_by_name(&self, name: impl AsRef<str>) -> Result<Target, RegistryError> {
        let name = name.as_ref();

        tracing::debug!("Searching registry for chip with name {}", name);

        for family in &self.families {
            if let Some(chip) = family.get_chip(name) {
                return Target::new(family, chip);
            }
        }

        Err(RegistryError::ChipNotFound(name.to_string()))
    }
}

/// Get a target from the internal registry based on its name.
pub fn get_target_by_name(name: impl AsRef<str>) -> Result<Target, RegistryError> {
    REGISTRY.get_target_by_name(name)
}

/// The chip families of the internal registry.
pub fn families() -> &'static [ChipFamily] {
    REGISTRY.families()
}

/// The internal registry.
pub(crate) fn registry() -> &'static Registry {
    &REGISTRY
}

#[cfg(test)]
mod test {
    use super::*;
    use probe_host_target::{Architecture, CoreType};

    const FAMILY: &str = r#"
name: Test Series
variants:
  - name: test_chip
    cores:
      - name: main
        type: armv6m
    memory_map:
      - !Ram
        range:
          start: 0x20000000
          end: 0x20004000
        cores:
          - main
flash_algorithms: []
"#;

    #[test]
    fn builtin_targets_are_valid() {
        assert_eq!(families().len(), BUILTIN_TARGETS.len());
    }

    #[test]
    fn exact_name_match() {
        let target = get_target_by_name("stm32f407vgtx").unwrap();

        assert_eq!(target.name, "stm32f407vgtx");
        assert_eq!(target.architecture(), Architecture::Arm);
        assert_eq!(target.cores.len(), 1);
        assert!(!target.flash_algorithms.is_empty());
    }

    #[test]
    fn partial_or_differently_cased_names_are_rejected() {
        assert!(matches!(
            get_target_by_name("stm32f407"),
            Err(RegistryError::ChipNotFound(_))
        ));
        assert!(matches!(
            get_target_by_name("STM32F407VGTX"),
            Err(RegistryError::ChipNotFound(_))
        ));
    }

    #[test]
    fn multi_core_target() {
        let target = get_target_by_name("rp2040").unwrap();

        assert_eq!(target.cores.len(), 2);
        assert_eq!(target.core_type(1), Some(CoreType::Armv6m));
    }

    #[test]
    fn invalid_families_are_skipped() {
        let broken = FAMILY.replace("type: armv6m", "type: z80");
        let registry =
            Registry::from_yaml_sources(&[("good.yaml", FAMILY), ("broken.yaml", &broken)]);

        assert_eq!(registry.families().len(), 1);
        assert!(registry.get_target_by_name("test_chip").is_ok());
    }
}

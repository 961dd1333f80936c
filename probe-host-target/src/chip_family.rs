use crate::serialize::hex_jep106_option;
use crate::MemoryRegion;

use super::chip::Chip;
use super::flash_algorithm::RawFlashAlgorithm;
use jep106::JEP106Code;

use serde::{Deserialize, Serialize};

/// Type of a supported core.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreType {
    /// ARMv6-M: Cortex M0, M0+, M1
    Armv6m,
    /// ARMv7-M: Cortex M3
    Armv7m,
    /// ARMv7e-M: Cortex M4, M7
    Armv7em,
    /// ARMv8-M: Cortex M23, M33
    Armv8m,
    /// RISC-V
    Riscv,
    /// Xtensa
    Xtensa,
}

impl CoreType {
    /// Returns true if the core type is an ARM Cortex-M
    pub fn is_cortex_m(&self) -> bool {
        matches!(
            self,
            CoreType::Armv6m | CoreType::Armv7em | CoreType::Armv7m | CoreType::Armv8m
        )
    }

    /// Returns the parent architecture family of this core type.
    pub fn architecture(&self) -> Architecture {
        match self {
            CoreType::Riscv => Architecture::Riscv,
            CoreType::Xtensa => Architecture::Xtensa,
            _ => Architecture::Arm,
        }
    }

    /// Returns the instruction set the core executes.
    pub fn instruction_set(&self) -> InstructionSet {
        match self {
            CoreType::Riscv => InstructionSet::RV32C,
            CoreType::Xtensa => InstructionSet::Xtensa,
            _ => InstructionSet::Thumb2,
        }
    }
}

impl std::fmt::Display for CoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CoreType::Armv6m => "Armv6m",
            CoreType::Armv7m => "Armv7m",
            CoreType::Armv7em => "Armv7em",
            CoreType::Armv8m => "Armv8m",
            CoreType::Riscv => "Riscv",
            CoreType::Xtensa => "Xtensa",
        };
        f.write_str(name)
    }
}

/// The architecture family of a specific [`CoreType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// An ARM core of one of the specific types [`CoreType::Armv6m`], [`CoreType::Armv7m`], [`CoreType::Armv7em`] or [`CoreType::Armv8m`]
    Arm,
    /// A RISC-V core.
    Riscv,
    /// An Xtensa core.
    Xtensa,
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Arm => f.write_str("ARM"),
            Architecture::Riscv => f.write_str("RISC-V"),
            Architecture::Xtensa => f.write_str("Xtensa"),
        }
    }
}

/// Instruction set used by a core
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionSet {
    /// ARM Thumb 2 instruction set
    Thumb2,
    /// RISC-V 32-bit compressed instruction sets (RV32C).
    RV32C,
    /// Xtensa instruction set
    Xtensa,
}

impl InstructionSet {
    /// Get the minimum instruction size in bytes.
    pub fn get_minimum_instruction_size(&self) -> u8 {
        match self {
            InstructionSet::Thumb2 => 2,
            InstructionSet::RV32C => 2,
            InstructionSet::Xtensa => 2,
        }
    }

    /// Get the maximum instruction size in bytes.
    pub fn get_maximum_instruction_size(&self) -> u8 {
        match self {
            InstructionSet::Thumb2 | InstructionSet::RV32C => 4,
            InstructionSet::Xtensa => 3,
        }
    }
}

/// This describes a chip family with all its variants.
///
/// This struct is usually read from a target description
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipFamily {
    /// This is the name of the chip family in base form.
    /// E.g. `nRF52832`.
    pub name: String,
    /// The JEP106 code of the manufacturer.
    #[serde(default, serialize_with = "hex_jep106_option")]
    pub manufacturer: Option<JEP106Code>,
    /// This vector holds all the variants of the family.
    pub variants: Vec<Chip>,
    /// This vector holds all available algorithms.
    #[serde(default)]
    pub flash_algorithms: Vec<RawFlashAlgorithm>,
}

impl ChipFamily {
    /// Validates the [`ChipFamily`] such that probe-host can make assumptions about the correctness without validating thereafter.
    ///
    /// This method should be called right after the [`ChipFamily`] is created!
    pub fn validate(&self) -> Result<(), String> {
        for variant in &self.variants {
            if variant.cores.is_empty() {
                return Err(format!("variant `{}` does not contain any cores", variant.name));
            }

            for algorithm_name in &variant.flash_algorithms {
                if self.get_algorithm(algorithm_name).is_none() {
                    return Err(format!(
                        "unknown flash algorithm `{}` for `{}`",
                        algorithm_name, variant.name
                    ));
                }
            }

            for memory in &variant.memory_map {
                for core in memory.cores() {
                    if !variant.cores.iter().any(|c| c.name == *core) {
                        return Err(format!(
                            "memory region {:?} of `{}` is assigned to unknown core `{}`",
                            memory.name(),
                            variant.name,
                            core
                        ));
                    }
                }

                if let MemoryRegion::Nvm(region) = memory {
                    if region.range.start > region.range.end {
                        return Err(format!(
                            "memory region {:?} of `{}` has an inverted range",
                            region.name, variant.name
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the chip variant with the given name.
    pub fn get_chip(&self, name: &str) -> Option<&Chip> {
        self.variants.iter().find(|chip| chip.name == name)
    }

    /// Tries to find a [`RawFlashAlgorithm`] with a given name.
    pub fn get_algorithm(&self, name: impl AsRef<str>) -> Option<&RawFlashAlgorithm> {
        let name = name.as_ref();
        self.flash_algorithms.iter().find(|elem| elem.name == name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FAMILY: &str = r#"
name: Test Family
manufacturer:
  id: 0x20
  cc: 0x0
variants:
  - name: test_chip
    cores:
      - name: main
        type: armv7em
    memory_map:
      - !Nvm
        range:
          start: 0x0
          end: 0x10000
        cores:
          - main
    flash_algorithms:
      - test_algo
flash_algorithms:
  - name: test_algo
    default: true
    flash_properties:
      address_range:
        start: 0x0
        end: 0x10000
      page_size: 0x100
      erased_byte_value: 0xff
      program_page_timeout: 100
      erase_sector_timeout: 500
      sectors:
        - size: 0x1000
          address: 0x0
"#;

    #[test]
    fn parse_and_validate_family() {
        let family: ChipFamily = serde_yaml::from_str(FAMILY).unwrap();

        family.validate().unwrap();
        assert_eq!(family.manufacturer.and_then(|m| m.get()), Some("STMicroelectronics"));
        assert_eq!(family.get_chip("test_chip").unwrap().cores[0].core_type, CoreType::Armv7em);
        assert!(family.get_algorithm("test_algo").unwrap().default);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut family: ChipFamily = serde_yaml::from_str(FAMILY).unwrap();
        family.variants[0].flash_algorithms.push("missing".to_string());

        assert!(family.validate().is_err());
    }

    #[test]
    fn memory_for_unknown_core_is_rejected() {
        let yaml = FAMILY.replace("          - main\n    flash_algorithms", "          - other\n    flash_algorithms");
        let family: ChipFamily = serde_yaml::from_str(&yaml).unwrap();

        assert!(family.validate().is_err());
    }

    #[test]
    fn core_type_architecture() {
        assert_eq!(CoreType::Armv6m.architecture(), Architecture::Arm);
        assert_eq!(CoreType::Riscv.architecture(), Architecture::Riscv);
        assert_eq!(CoreType::Xtensa.architecture(), Architecture::Xtensa);
        assert!(!CoreType::Riscv.is_cortex_m());
    }
}

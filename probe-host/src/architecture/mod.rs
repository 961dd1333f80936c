//! Register files of the supported core architectures.

pub mod arm;
pub mod riscv;
pub mod xtensa;

use crate::core::CoreRegisters;
use crate::CoreType;

/// The register file of a core of the given type.
pub fn registers(core_type: CoreType) -> &'static CoreRegisters {
    match core_type {
        CoreType::Armv6m | CoreType::Armv7m | CoreType::Armv8m => &arm::CORTEX_M_CORE_REGISTERS,
        CoreType::Armv7em => &arm::CORTEX_M_WITH_FP_CORE_REGISTERS,
        CoreType::Riscv => &riscv::RISCV_CORE_REGISTERS,
        CoreType::Xtensa => &xtensa::XTENSA_CORE_REGISTERS,
    }
}

/// The number of hardware breakpoint comparators a core of the given type usually has.
pub fn default_breakpoint_units(core_type: CoreType) -> u32 {
    match core_type {
        CoreType::Armv6m => 4,
        CoreType::Armv7m | CoreType::Armv7em | CoreType::Armv8m => 6,
        CoreType::Riscv => 4,
        CoreType::Xtensa => 2,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case(CoreType::Armv6m, 20)]
    #[test_case(CoreType::Armv7em, 53)]
    #[test_case(CoreType::Riscv, 40)]
    #[test_case(CoreType::Xtensa, 22)]
    fn register_file_sizes(core_type: CoreType, expected: usize) {
        assert_eq!(registers(core_type).len(), expected);
    }

    #[test_case(CoreType::Armv7m)]
    #[test_case(CoreType::Armv7em)]
    #[test_case(CoreType::Riscv)]
    #[test_case(CoreType::Xtensa)]
    fn register_ids_are_unique(core_type: CoreType) {
        let file = registers(core_type);
        let ids: HashSet<_> = file.iter().map(|r| r.id).collect();

        assert_eq!(ids.len(), file.len());
        assert!(file.pc().is_some());
    }
}

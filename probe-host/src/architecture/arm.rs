//! Cortex-M register file.

use crate::core::{CoreRegister, CoreRegisters, RegisterRole};
use once_cell::sync::Lazy;

pub(crate) const PC: CoreRegister =
    CoreRegister::new("R15", 15, 32).with_roles(&[RegisterRole::ProgramCounter]);

pub(crate) const FP: CoreRegister =
    CoreRegister::new("R7", 7, 32).with_roles(&[RegisterRole::FramePointer]);

pub(crate) const SP: CoreRegister =
    CoreRegister::new("R13", 13, 32).with_roles(&[RegisterRole::StackPointer]);

pub(crate) const RA: CoreRegister =
    CoreRegister::new("R14", 14, 32).with_roles(&[RegisterRole::ReturnAddress]);

/// Cortex-M cores without a floating point unit.
pub static CORTEX_M_CORE_REGISTERS: Lazy<CoreRegisters> = Lazy::new(|| {
    CoreRegisters::new(
        ARM32_COMMON_REGS_SET
            .iter()
            .chain(CORTEX_M_COMMON_REGS_SET)
            .copied()
            .collect(),
    )
});

/// Cortex-M cores with a single precision floating point unit.
pub static CORTEX_M_WITH_FP_CORE_REGISTERS: Lazy<CoreRegisters> = Lazy::new(|| {
    CoreRegisters::new(
        ARM32_COMMON_REGS_SET
            .iter()
            .chain(CORTEX_M_COMMON_REGS_SET)
            .copied()
            .chain(fp_registers())
            .collect(),
    )
});

static ARM32_COMMON_REGS_SET: &[CoreRegister] = &[
    CoreRegister::new("R0", 0, 32)
        .with_roles(&[RegisterRole::Argument("a1"), RegisterRole::Return("r1")]),
    CoreRegister::new("R1", 1, 32)
        .with_roles(&[RegisterRole::Argument("a2"), RegisterRole::Return("r2")]),
    CoreRegister::new("R2", 2, 32).with_roles(&[RegisterRole::Argument("a3")]),
    CoreRegister::new("R3", 3, 32).with_roles(&[RegisterRole::Argument("a4")]),
    CoreRegister::new("R4", 4, 32),
    CoreRegister::new("R5", 5, 32),
    CoreRegister::new("R6", 6, 32),
    FP,
    CoreRegister::new("R8", 8, 32),
    CoreRegister::new("R9", 9, 32),
    CoreRegister::new("R10", 10, 32),
    CoreRegister::new("R11", 11, 32),
    CoreRegister::new("R12", 12, 32),
    SP,
    RA,
    PC,
];

static CORTEX_M_COMMON_REGS_SET: &[CoreRegister] = &[
    CoreRegister::new("XPSR", 0b1_0000, 32).with_roles(&[RegisterRole::ProcessorStatus]),
    CoreRegister::new("MSP", 0b1_0001, 32).with_roles(&[RegisterRole::MainStackPointer]),
    CoreRegister::new("PSP", 0b1_0010, 32).with_roles(&[RegisterRole::ProcessStackPointer]),
    // CONTROL bits [31:24], FAULTMASK bits [23:16],
    // BASEPRI bits [15:8], and PRIMASK bits [7:0]
    CoreRegister::new("EXTRA", 0b1_0100, 32).with_roles(&[RegisterRole::Other("EXTRA")]),
];

static FP_REGISTER_NAMES: [&str; 32] = [
    "S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9", "S10", "S11", "S12", "S13", "S14",
    "S15", "S16", "S17", "S18", "S19", "S20", "S21", "S22", "S23", "S24", "S25", "S26", "S27",
    "S28", "S29", "S30", "S31",
];

fn fp_registers() -> impl Iterator<Item = CoreRegister> {
    let fpscr =
        CoreRegister::new("FPSCR", 33, 32).with_roles(&[RegisterRole::FloatingPointStatus]);

    std::iter::once(fpscr).chain(FP_REGISTER_NAMES.iter().copied().zip(64u16..).map(|(name, id)| {
        CoreRegister::new(name, id, 32)
            .with_roles(&[RegisterRole::FloatingPoint])
            .floating_point()
    }))
}

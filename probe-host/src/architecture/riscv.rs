//! RISC-V (RV32) register file.

use crate::core::{CoreRegister, CoreRegisters, RegisterRole};
use once_cell::sync::Lazy;

/// The program counter register. This is the `dpc` CSR.
pub const PC: CoreRegister =
    CoreRegister::new("pc", 0x7b1, 32).with_roles(&[RegisterRole::ProgramCounter]);

/// The zero register, x0.
pub const ZERO: CoreRegister = CoreRegister::new("x0", 0x1000, 32)
    .with_roles(&[RegisterRole::Other("zero")])
    .read_only();

pub(crate) const RA: CoreRegister =
    CoreRegister::new("x1", 0x1001, 32).with_roles(&[RegisterRole::ReturnAddress]);

pub(crate) const SP: CoreRegister =
    CoreRegister::new("x2", 0x1002, 32).with_roles(&[RegisterRole::StackPointer]);

pub(crate) const FP: CoreRegister =
    CoreRegister::new("x8", 0x1008, 32).with_roles(&[RegisterRole::FramePointer]);

/// The RISC-V core registers.
pub static RISCV_CORE_REGISTERS: Lazy<CoreRegisters> = Lazy::new(|| {
    CoreRegisters::new(
        RISCV_COMMON_REGS_SET
            .iter()
            .chain(RISCV_CSR_SET)
            .copied()
            .collect(),
    )
});

static RISCV_COMMON_REGS_SET: &[CoreRegister] = &[
    ZERO,
    RA,
    SP,
    CoreRegister::new("x3", 0x1003, 32).with_roles(&[RegisterRole::Other("gp")]),
    CoreRegister::new("x4", 0x1004, 32).with_roles(&[RegisterRole::Other("tp")]),
    CoreRegister::new("x5", 0x1005, 32),
    CoreRegister::new("x6", 0x1006, 32),
    CoreRegister::new("x7", 0x1007, 32),
    FP,
    CoreRegister::new("x9", 0x1009, 32),
    CoreRegister::new("x10", 0x100A, 32)
        .with_roles(&[RegisterRole::Argument("a0"), RegisterRole::Return("r0")]),
    CoreRegister::new("x11", 0x100B, 32)
        .with_roles(&[RegisterRole::Argument("a1"), RegisterRole::Return("r1")]),
    CoreRegister::new("x12", 0x100C, 32).with_roles(&[RegisterRole::Argument("a2")]),
    CoreRegister::new("x13", 0x100D, 32).with_roles(&[RegisterRole::Argument("a3")]),
    CoreRegister::new("x14", 0x100E, 32).with_roles(&[RegisterRole::Argument("a4")]),
    CoreRegister::new("x15", 0x100F, 32).with_roles(&[RegisterRole::Argument("a5")]),
    CoreRegister::new("x16", 0x1010, 32).with_roles(&[RegisterRole::Argument("a6")]),
    CoreRegister::new("x17", 0x1011, 32).with_roles(&[RegisterRole::Argument("a7")]),
    CoreRegister::new("x18", 0x1012, 32),
    CoreRegister::new("x19", 0x1013, 32),
    CoreRegister::new("x20", 0x1014, 32),
    CoreRegister::new("x21", 0x1015, 32),
    CoreRegister::new("x22", 0x1016, 32),
    CoreRegister::new("x23", 0x1017, 32),
    CoreRegister::new("x24", 0x1018, 32),
    CoreRegister::new("x25", 0x1019, 32),
    CoreRegister::new("x26", 0x101A, 32),
    CoreRegister::new("x27", 0x101B, 32),
    CoreRegister::new("x28", 0x101C, 32),
    CoreRegister::new("x29", 0x101D, 32),
    CoreRegister::new("x30", 0x101E, 32),
    CoreRegister::new("x31", 0x101F, 32),
    PC,
];

static RISCV_CSR_SET: &[CoreRegister] = &[
    CoreRegister::new("mstatus", 0x300, 32).with_roles(&[RegisterRole::ProcessorStatus]),
    CoreRegister::new("misa", 0x301, 32),
    CoreRegister::new("mtvec", 0x305, 32),
    CoreRegister::new("mepc", 0x341, 32),
    CoreRegister::new("mcause", 0x342, 32),
    CoreRegister::new("mtval", 0x343, 32),
    CoreRegister::new("mhartid", 0xF14, 32).read_only(),
];

//! Xtensa register file.
//!
//! Address registers are the sixteen registers of the current window.
//! Special registers are addressed as `0x100 + SR number`.

use crate::core::{CoreRegister, CoreRegisters, RegisterRole};
use once_cell::sync::Lazy;

/// The program counter register.
pub const PC: CoreRegister =
    CoreRegister::new("pc", 0xFF00, 32).with_roles(&[RegisterRole::ProgramCounter]);

/// The return address register.
pub const RA: CoreRegister =
    CoreRegister::new("a0", 0x0000, 32).with_roles(&[RegisterRole::ReturnAddress]);

/// The stack pointer register.
pub const SP: CoreRegister =
    CoreRegister::new("a1", 0x0001, 32).with_roles(&[RegisterRole::StackPointer]);

/// The frame pointer register.
pub const FP: CoreRegister =
    CoreRegister::new("a7", 0x0007, 32).with_roles(&[RegisterRole::FramePointer]);

pub(crate) static XTENSA_CORE_REGISTERS: Lazy<CoreRegisters> =
    Lazy::new(|| CoreRegisters::new(XTENSA_REGISTERS_SET.to_vec()));

static XTENSA_REGISTERS_SET: &[CoreRegister] = &[
    RA,
    SP,
    CoreRegister::new("a2", 0x0002, 32).with_roles(&[RegisterRole::Argument("a2")]),
    CoreRegister::new("a3", 0x0003, 32).with_roles(&[RegisterRole::Argument("a3")]),
    CoreRegister::new("a4", 0x0004, 32).with_roles(&[RegisterRole::Argument("a4")]),
    CoreRegister::new("a5", 0x0005, 32).with_roles(&[RegisterRole::Argument("a5")]),
    CoreRegister::new("a6", 0x0006, 32).with_roles(&[RegisterRole::Argument("a6")]),
    FP,
    CoreRegister::new("a8", 0x0008, 32),
    CoreRegister::new("a9", 0x0009, 32),
    CoreRegister::new("a10", 0x000A, 32),
    CoreRegister::new("a11", 0x000B, 32),
    CoreRegister::new("a12", 0x000C, 32),
    CoreRegister::new("a13", 0x000D, 32),
    CoreRegister::new("a14", 0x000E, 32),
    CoreRegister::new("a15", 0x000F, 32),
    PC,
    CoreRegister::new("sar", 0x0103, 6),
    CoreRegister::new("windowbase", 0x0148, 4),
    CoreRegister::new("epc1", 0x01B1, 32),
    CoreRegister::new("ps", 0x01E6, 32).with_roles(&[RegisterRole::ProcessorStatus]),
    CoreRegister::new("exccause", 0x01E8, 6).read_only(),
];

//! Core registers are represented by the [`CoreRegister`] struct, and collected in
//! a [`CoreRegisters`] file for each of the supported architectures.

use std::fmt;

/// The location of a CPU register. This is not an actual memory address, but a
/// core specific location that represents a specific core register.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct RegisterId(pub u16);

impl From<RegisterId> for u32 {
    fn from(value: RegisterId) -> Self {
        u32::from(value.0)
    }
}

impl From<u16> for RegisterId {
    fn from(value: u16) -> Self {
        RegisterId(value)
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// The type of data stored in a register, with its width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterDataType {
    /// Unsigned integer data.
    UnsignedInteger(usize),
    /// Floating point data.
    FloatingPoint(usize),
}

/// The role a register plays in the calling convention or the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRole {
    /// Function argument, with its ABI name.
    Argument(&'static str),
    /// Function return value, with its ABI name.
    Return(&'static str),
    /// Program counter.
    ProgramCounter,
    /// Frame pointer.
    FramePointer,
    /// Stack pointer.
    StackPointer,
    /// Main stack pointer (ARM).
    MainStackPointer,
    /// Process stack pointer (ARM).
    ProcessStackPointer,
    /// Processor status register.
    ProcessorStatus,
    /// Return address.
    ReturnAddress,
    /// Floating point register.
    FloatingPoint,
    /// Floating point status register.
    FloatingPointStatus,
    /// A core specific register.
    Other(&'static str),
}

/// Whether a register can be written by the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// The register can be read and written.
    ReadWrite,
    /// The register can only be read.
    ReadOnly,
}

/// Describes a core register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreRegister {
    /// The display name of the register.
    pub name: &'static str,
    /// The roles of the register.
    pub roles: &'static [RegisterRole],
    /// The id of the register.
    pub id: RegisterId,
    /// The data type of the register.
    pub data_type: RegisterDataType,
    /// Whether the register can be written.
    pub access: RegisterAccess,
}

impl CoreRegister {
    /// A read-write unsigned integer register without a role.
    pub const fn new(name: &'static str, id: u16, bits: usize) -> Self {
        CoreRegister {
            name,
            roles: &[],
            id: RegisterId(id),
            data_type: RegisterDataType::UnsignedInteger(bits),
            access: RegisterAccess::ReadWrite,
        }
    }

    pub(crate) const fn with_roles(mut self, roles: &'static [RegisterRole]) -> Self {
        self.roles = roles;
        self
    }

    pub(crate) const fn floating_point(mut self) -> Self {
        self.data_type = match self.data_type {
            RegisterDataType::UnsignedInteger(bits) | RegisterDataType::FloatingPoint(bits) => {
                RegisterDataType::FloatingPoint(bits)
            }
        };
        self
    }

    pub(crate) const fn read_only(mut self) -> Self {
        self.access = RegisterAccess::ReadOnly;
        self
    }

    /// Get the display name of this register
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the id of this register
    pub fn id(&self) -> RegisterId {
        self.id
    }

    /// Get the size, in bits, of this register
    pub fn size_in_bits(&self) -> usize {
        match self.data_type {
            RegisterDataType::UnsignedInteger(bits) | RegisterDataType::FloatingPoint(bits) => {
                bits
            }
        }
    }

    /// Get the size, in bytes, of this register
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bits().div_ceil(8)
    }

    /// The mask covering all bits of the register.
    pub fn mask(&self) -> u64 {
        match self.size_in_bits() {
            bits if bits >= 64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }

    /// Returns `true` if the register can not be written.
    pub fn is_read_only(&self) -> bool {
        self.access == RegisterAccess::ReadOnly
    }

    /// Returns `true` if the register has the given role.
    pub fn has_role(&self, role: RegisterRole) -> bool {
        self.roles.contains(&role)
    }
}

impl From<CoreRegister> for RegisterId {
    fn from(description: CoreRegister) -> RegisterId {
        description.id
    }
}

impl From<&CoreRegister> for RegisterId {
    fn from(description: &CoreRegister) -> RegisterId {
        description.id
    }
}

/// The register file of a core, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreRegisters(Vec<CoreRegister>);

impl CoreRegisters {
    /// Construct a register file from a list of registers.
    pub fn new(registers: Vec<CoreRegister>) -> Self {
        Self(registers)
    }

    /// The number of registers in the file.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the file has no registers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all registers in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &CoreRegister> {
        self.0.iter()
    }

    /// The register at the enumeration index.
    pub fn get(&self, index: usize) -> Option<&CoreRegister> {
        self.0.get(index)
    }

    /// Looks up a register by its id.
    pub fn get_by_id(&self, id: RegisterId) -> Option<&CoreRegister> {
        self.0.iter().find(|r| r.id == id)
    }

    /// Looks up a register by its name, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<&CoreRegister> {
        self.0.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// The first register with the given role.
    pub fn by_role(&self, role: RegisterRole) -> Option<&CoreRegister> {
        self.0.iter().find(|r| r.has_role(role))
    }

    /// The program counter.
    pub fn pc(&self) -> Option<&CoreRegister> {
        self.by_role(RegisterRole::ProgramCounter)
    }

    /// The stack pointer.
    pub fn sp(&self) -> Option<&CoreRegister> {
        self.by_role(RegisterRole::StackPointer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn masks() {
        assert_eq!(CoreRegister::new("a", 0, 32).mask(), 0xffff_ffff);
        assert_eq!(CoreRegister::new("b", 1, 8).mask(), 0xff);
        assert_eq!(CoreRegister::new("c", 2, 64).mask(), u64::MAX);
        assert_eq!(CoreRegister::new("d", 3, 24).size_in_bytes(), 3);
    }

    #[test]
    fn lookup() {
        static PC_ROLES: &[RegisterRole] = &[RegisterRole::ProgramCounter];
        let regs = CoreRegisters::new(vec![
            CoreRegister::new("r0", 0, 32),
            CoreRegister::new("pc", 15, 32).with_roles(PC_ROLES),
            CoreRegister::new("id", 0x20, 32).read_only(),
        ]);

        assert_eq!(regs.len(), 3);
        assert_eq!(regs.pc().map(|r| r.id), Some(RegisterId(15)));
        assert_eq!(regs.get(1).map(|r| r.name()), Some("pc"));
        assert!(regs.get_by_id(RegisterId(0x20)).unwrap().is_read_only());
        assert_eq!(regs.get_by_name("R0").map(|r| r.id), Some(RegisterId(0)));
        assert!(regs.get_by_id(RegisterId(7)).is_none());
    }
}

pub(crate) mod core_status;
pub(crate) mod registers;

pub use core_status::{CoreInformation, CoreStatus, HaltReason};
pub use registers::{
    CoreRegister, CoreRegisters, RegisterAccess, RegisterDataType, RegisterId, RegisterRole,
};

use crate::error::Error;
use crate::flashing::FlashRoutines;
use crate::memory::{check_alignment, check_range, MemoryInterface};
use crate::probe::DebugProbeError;
use crate::CoreType;
use std::time::{Duration, Instant};

/// The transport level interface to one core of the target.
///
/// This is implemented by the probe drivers. The state machine, register
/// validation and breakpoint bookkeeping are done by [`Core`] on top of it.
pub trait CoreInterface {
    /// The type of the core.
    fn core_type(&self) -> CoreType;

    /// Polls the execution status of the core.
    fn status(&mut self) -> Result<CoreStatus, DebugProbeError>;

    /// Requests the core to halt. Does not wait for the core to halt.
    fn halt(&mut self) -> Result<(), DebugProbeError>;

    /// Resumes execution of the core.
    fn run(&mut self) -> Result<(), DebugProbeError>;

    /// Executes a single instruction of the halted core.
    fn step(&mut self) -> Result<CoreInformation, DebugProbeError>;

    /// Resets the core. The core resumes execution unless reset catch is enabled.
    fn reset(&mut self) -> Result<(), DebugProbeError>;

    /// Makes the core halt right after the next reset.
    fn reset_catch_set(&mut self) -> Result<(), DebugProbeError>;

    /// Undoes [`CoreInterface::reset_catch_set`].
    fn reset_catch_clear(&mut self) -> Result<(), DebugProbeError>;

    /// The register file of the core.
    fn registers(&self) -> &'static CoreRegisters;

    /// Reads a core register. The id has been validated against [`CoreInterface::registers`].
    fn read_core_reg(&mut self, id: RegisterId) -> Result<u64, DebugProbeError>;

    /// Writes a core register. The value has already been truncated to the register width.
    fn write_core_reg(&mut self, id: RegisterId, value: u64) -> Result<(), DebugProbeError>;

    /// Reads bytes from the memory space of the core.
    fn read_8(&mut self, address: u64, data: &mut [u8]) -> Result<(), DebugProbeError>;

    /// Writes bytes to the memory space of the core.
    fn write_8(&mut self, address: u64, data: &[u8]) -> Result<(), DebugProbeError>;

    /// Reads aligned words from the memory space of the core.
    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), DebugProbeError>;

    /// Writes aligned words to the memory space of the core.
    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), DebugProbeError>;

    /// The number of hardware breakpoint comparators of the core.
    fn available_breakpoint_units(&mut self) -> Result<u32, DebugProbeError>;

    /// Returns `true` if the breakpoint unit is enabled.
    fn hw_breakpoints_enabled(&self) -> bool;

    /// Enables or disables the breakpoint unit.
    fn enable_breakpoints(&mut self, state: bool) -> Result<(), DebugProbeError>;

    /// Programs comparator `unit_index` to halt at `address`.
    fn set_hw_breakpoint(&mut self, unit_index: usize, address: u64)
        -> Result<(), DebugProbeError>;

    /// Releases comparator `unit_index`.
    fn clear_hw_breakpoint(&mut self, unit_index: usize) -> Result<(), DebugProbeError>;

    /// The flash routines of the target, if the driver can run them on this core.
    fn flash_routines(&mut self) -> Option<&mut dyn FlashRoutines> {
        None
    }
}

/// A hardware breakpoint, bound to one comparator unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    address: u64,
    unit: usize,
}

impl Breakpoint {
    /// The address the breakpoint halts at.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The comparator unit which is used for the breakpoint.
    pub fn unit(&self) -> usize {
        self.unit
    }
}

/// The state of a core which outlives a [`Core`] handle.
///
/// This is owned by the [`Session`](crate::Session).
#[derive(Debug)]
pub struct CoreState {
    id: usize,
    status: CoreStatus,
    breakpoints: Vec<Breakpoint>,
}

impl CoreState {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            status: CoreStatus::Unknown,
            breakpoints: vec![],
        }
    }

    /// The index of the core.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The last observed status of the core.
    pub fn status(&self) -> CoreStatus {
        self.status
    }

    /// The breakpoints which are currently set.
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }
}

/// Generic core handle representing a physical core on an MCU.
///
/// This should be considered as a temporary view of the core which locks the debug probe driver to as single consumer by borrowing it.
///
/// As soon as you did your atomic task (e.g. halt the core, read the core state and all other debug relevant info) you should drop this object,
/// to allow potential other shareholders of the session struct to grab a core handle too.
pub struct Core<'probe> {
    state: &'probe mut CoreState,
    inner: Box<dyn CoreInterface + 'probe>,
}

impl<'probe> Core<'probe> {
    pub(crate) fn new(state: &'probe mut CoreState, inner: Box<dyn CoreInterface + 'probe>) -> Self {
        Self { state, inner }
    }

    /// Returns the ID of this core.
    pub fn id(&self) -> usize {
        self.state.id
    }

    /// The type of the core.
    pub fn core_type(&self) -> CoreType {
        self.inner.core_type()
    }

    /// Turns a transport error into a crate error, forgetting the core status
    /// when the link to the core was lost.
    fn probe_error(&mut self, error: DebugProbeError) -> Error {
        if error.is_link_lost() {
            self.state.status = CoreStatus::Unknown;
        }
        Error::Probe(error)
    }

    fn memory_error(&mut self, address: u64, source: DebugProbeError) -> Error {
        if source.is_link_lost() {
            self.state.status = CoreStatus::Unknown;
        }
        Error::MemoryAccess { address, source }
    }

    /// Polls the current status of the core.
    pub fn status(&mut self) -> Result<CoreStatus, Error> {
        match self.inner.status() {
            Ok(status) => {
                self.state.status = status;
                Ok(status)
            }
            Err(e) => Err(self.probe_error(e)),
        }
    }

    /// The status observed by the last successful poll, without talking to the target.
    pub fn cached_status(&self) -> CoreStatus {
        self.state.status
    }

    /// Wait until the core is halted. If the core does not halt on its own,
    /// a [`Error::Timeout`] error will be returned.
    pub fn wait_for_core_halted(&mut self, timeout: Duration) -> Result<(), Error> {
        let start = Instant::now();

        loop {
            if self.status()?.is_halted() {
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::debug!("Core {} did not halt within {:?}", self.id(), timeout);
                return Err(Error::Timeout);
            }

            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn pc(&mut self) -> Result<CoreInformation, Error> {
        let pc = match self.inner.registers().pc() {
            Some(pc) => pc.id,
            None => return Err(Error::Other(anyhow::anyhow!("core has no program counter"))),
        };

        Ok(CoreInformation {
            pc: self.read_core_reg(pc)?,
        })
    }

    /// Try to halt the core. This function ensures the core is actually halted, and
    /// returns a [`Error::Timeout`] otherwise.
    #[tracing::instrument(skip(self))]
    pub fn halt(&mut self, timeout: Duration) -> Result<CoreInformation, Error> {
        if !self.status()?.is_halted() {
            if let Err(e) = self.inner.halt() {
                return Err(self.probe_error(e));
            }
            self.wait_for_core_halted(timeout)?;
        }

        self.pc()
    }

    /// Continue to execute instructions.
    ///
    /// Fails with [`Error::InvalidState`] if the core is already running.
    pub fn run(&mut self) -> Result<(), Error> {
        let status = self.status()?;
        if status.is_running() {
            return Err(Error::InvalidState {
                operation: "run",
                status,
            });
        }

        if let Err(e) = self.inner.run() {
            return Err(self.probe_error(e));
        }

        let status = self.status()?;
        tracing::debug!("Core {} resumed, now {:?}", self.id(), status);

        Ok(())
    }

    /// Executes a single instruction.
    ///
    /// Fails with [`Error::InvalidState`] unless the core is halted.
    pub fn step(&mut self) -> Result<CoreInformation, Error> {
        let status = self.status()?;
        if !status.is_halted() {
            return Err(Error::InvalidState {
                operation: "step",
                status,
            });
        }

        match self.inner.step() {
            Ok(info) => {
                self.state.status = CoreStatus::Halted(HaltReason::Step);
                Ok(info)
            }
            Err(e) => Err(self.probe_error(e)),
        }
    }

    /// Reset the core, and then continue to execute instructions.
    pub fn reset(&mut self) -> Result<(), Error> {
        if let Err(e) = self.inner.reset() {
            return Err(self.probe_error(e));
        }
        self.status()?;

        Ok(())
    }

    /// Reset the core, and then immediately halt. To continue execution after
    /// reset, use the `reset` function.
    #[tracing::instrument(skip(self))]
    pub fn reset_and_halt(&mut self, timeout: Duration) -> Result<CoreInformation, Error> {
        let result = self
            .inner
            .reset_catch_set()
            .and_then(|_| self.inner.reset());
        if let Err(e) = result {
            return Err(self.probe_error(e));
        }

        let halted = self.wait_for_core_halted(timeout);

        if let Err(e) = self.inner.reset_catch_clear() {
            tracing::warn!("Failed to clear reset catch: {e}");
        }
        halted?;

        self.pc()
    }

    /// The register file of the core.
    pub fn registers(&self) -> &'static CoreRegisters {
        self.inner.registers()
    }

    fn register(&self, id: RegisterId) -> Result<CoreRegister, Error> {
        self.inner
            .registers()
            .get_by_id(id)
            .copied()
            .ok_or(Error::UnknownRegister(id))
    }

    /// Read the value of a core register.
    ///
    /// The value is zero extended to 64 bits.
    pub fn read_core_reg(&mut self, id: impl Into<RegisterId>) -> Result<u64, Error> {
        let register = self.register(id.into())?;

        match self.inner.read_core_reg(register.id) {
            Ok(value) => Ok(value & register.mask()),
            Err(source) => {
                if source.is_link_lost() {
                    self.state.status = CoreStatus::Unknown;
                }
                Err(Error::RegisterAccess {
                    id: register.id,
                    source,
                })
            }
        }
    }

    /// Write the value of a core register.
    ///
    /// Bits above the width of the register are dropped.
    pub fn write_core_reg(&mut self, id: impl Into<RegisterId>, value: u64) -> Result<(), Error> {
        let register = self.register(id.into())?;

        if register.is_read_only() {
            return Err(Error::ReadOnlyRegister(register.name));
        }

        match self.inner.write_core_reg(register.id, value & register.mask()) {
            Ok(()) => Ok(()),
            Err(source) => {
                if source.is_link_lost() {
                    self.state.status = CoreStatus::Unknown;
                }
                Err(Error::RegisterAccess {
                    id: register.id,
                    source,
                })
            }
        }
    }

    /// Returns the number of hardware breakpoints the core supports.
    pub fn available_breakpoint_units(&mut self) -> Result<u32, Error> {
        self.inner
            .available_breakpoint_units()
            .map_err(|e| self.probe_error(e))
    }

    /// The breakpoints which are currently set on this core.
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.state.breakpoints
    }

    /// Set a hardware breakpoint
    ///
    /// This function will try to set a hardware breakpoint. The amount
    /// of hardware breakpoints which are supported is chip specific,
    /// and can be queried using the `available_breakpoint_units` function.
    ///
    /// Setting a breakpoint at an address which already has one succeeds
    /// without using another unit.
    pub fn set_hw_breakpoint(&mut self, address: u64) -> Result<(), Error> {
        if self.state.breakpoints.iter().any(|bp| bp.address == address) {
            tracing::debug!("HW breakpoint at {address:#010x} is already set");
            return Ok(());
        }

        let num_hw_breakpoints = self.available_breakpoint_units()? as usize;

        if num_hw_breakpoints <= self.state.breakpoints.len() {
            tracing::warn!(
                "Maximum number of breakpoints ({}) reached, unable to set additional HW breakpoint.",
                num_hw_breakpoints
            );
            return Err(Error::BreakpointUnitsExceeded);
        }

        if !self.inner.hw_breakpoints_enabled() {
            if let Err(e) = self.inner.enable_breakpoints(true) {
                return Err(self.probe_error(e));
            }
        }

        let unit = self.find_free_breakpoint_unit();

        tracing::debug!("Using comparator {unit} for breakpoint at {address:#010x}");
        if let Err(e) = self.inner.set_hw_breakpoint(unit, address) {
            return Err(self.probe_error(e));
        }

        self.state.breakpoints.push(Breakpoint { address, unit });

        Ok(())
    }

    /// Clear a hardware breakpoint. Clearing an address without a breakpoint does nothing.
    pub fn clear_hw_breakpoint(&mut self, address: u64) -> Result<(), Error> {
        let Some(position) = self
            .state
            .breakpoints
            .iter()
            .position(|bp| bp.address == address)
        else {
            return Ok(());
        };

        let unit = self.state.breakpoints[position].unit;
        if let Err(e) = self.inner.clear_hw_breakpoint(unit) {
            return Err(self.probe_error(e));
        }

        // Only forget the breakpoint once the comparator was actually released.
        self.state.breakpoints.swap_remove(position);

        Ok(())
    }

    /// Clear all hardware breakpoints of this core.
    pub fn clear_all_hw_breakpoints(&mut self) -> Result<(), Error> {
        while let Some(bp) = self.state.breakpoints.last().copied() {
            self.clear_hw_breakpoint(bp.address)?;
        }

        Ok(())
    }

    fn find_free_breakpoint_unit(&self) -> usize {
        let mut used_bp: Vec<_> = self.state.breakpoints.iter().map(|bp| bp.unit).collect();
        used_bp.sort_unstable();

        let mut free_bp = 0;

        for bp in used_bp {
            if bp == free_bp {
                free_bp += 1;
            } else {
                return free_bp;
            }
        }

        free_bp
    }

    pub(crate) fn flash_routines(&mut self) -> Option<&mut dyn FlashRoutines> {
        self.inner.flash_routines()
    }
}

impl MemoryInterface for Core<'_> {
    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        check_alignment(address, 4)?;
        check_range(address, data.len() * 4)?;

        self.inner
            .read_32(address, data)
            .map_err(|e| self.memory_error(address, e))
    }

    fn read_8(&mut self, address: u64, data: &mut [u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(address, data.len())?;

        self.inner
            .read_8(address, data)
            .map_err(|e| self.memory_error(address, e))
    }

    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        check_alignment(address, 4)?;
        check_range(address, data.len() * 4)?;

        self.inner
            .write_32(address, data)
            .map_err(|e| self.memory_error(address, e))
    }

    fn write_8(&mut self, address: u64, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(address, data.len())?;

        self.inner
            .write_8(address, data)
            .map_err(|e| self.memory_error(address, e))
    }
}

impl std::fmt::Debug for Core<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("id", &self.state.id)
            .field("status", &self.state.status)
            .field("breakpoints", &self.state.breakpoints)
            .finish()
    }
}

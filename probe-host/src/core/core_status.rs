/// The status of the core.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CoreStatus {
    /// The core is currently running.
    Running,
    /// The core is currently halted. This also specifies the reason as a payload.
    Halted(HaltReason),
    /// The core state is currently unknown. This is always the case when the core is first created,
    /// and again after the link to the core was lost.
    Unknown,
}

impl CoreStatus {
    /// Returns `true` if the core is currently halted.
    pub fn is_halted(&self) -> bool {
        matches!(self, CoreStatus::Halted(_))
    }

    /// Returns `true` if the core is currently running.
    pub fn is_running(&self) -> bool {
        self == &Self::Running
    }

    /// The status code of the handle interface: 0 unknown, 1 halted, 2 running.
    pub fn code(&self) -> u32 {
        match self {
            CoreStatus::Unknown => 0,
            CoreStatus::Halted(_) => 1,
            CoreStatus::Running => 2,
        }
    }
}

/// The reason why a core was halted.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum HaltReason {
    /// Core halted due to a hardware breakpoint.
    Breakpoint,
    /// Core halted after single step
    Step,
    /// Core halted because of a debugger request
    Request,
    /// Core halted after a reset, because reset catch was enabled.
    Reset,
    /// External halt request
    External,
    /// Unknown reason for halt.
    ///
    /// This can happen for example when the core is already halted when we connect.
    Unknown,
}

/// Information about the halted core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreInformation {
    /// The current program counter.
    pub pc: u64,
}

//! # Debug probe control and firmware programming
//!
//! probe-host attaches to microcontrollers through a debug probe, controls the
//! execution of their cores, reads and writes memory and registers, manages
//! hardware breakpoints and programs firmware images into their flash.
//!
//! The physical probe drivers are not part of this crate. They plug in through
//! the [`DebugProbe`] and [`ProbeFactory`] traits, and are found by a
//! [`Lister`]. A simulated probe ([`probe::fake_probe`]) is included for
//! tests and dry runs.
//!
//! ## Halting the attached chip
//!
//! ```no_run
//! # use probe_host::Error;
//! use std::time::Duration;
//! use probe_host::{Lister, SessionConfig};
//!
//! let lister = Lister::new();
//! let probes = lister.list_all();
//!
//! // Use the first probe found.
//! let probe = lister.open(&probes[0])?;
//!
//! // Attach to a chip.
//! let target = probe_host::config::get_target_by_name("nrf52840_xxaa")?;
//! let mut session = probe.attach(target, SessionConfig::default())?;
//!
//! // Select a core.
//! let mut core = session.core(0)?;
//!
//! // Halt the attached core.
//! core.halt(Duration::from_millis(100))?;
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Handle based access
//!
//! The [`host`] module wraps the engine in a handle based interface with
//! signed status codes, a last-error slot and a progress observer, suitable
//! for exposing the engine across a library boundary.
#![warn(missing_docs)]

pub mod architecture;
pub mod config;
mod core;
mod error;
pub mod flashing;
pub mod host;
mod memory;
pub mod probe;
mod session;

pub use crate::config::{CoreType, InstructionSet, Target};
pub use crate::core::{
    Breakpoint, Core, CoreInformation, CoreInterface, CoreRegister, CoreRegisters, CoreState,
    CoreStatus, HaltReason, RegisterAccess, RegisterDataType, RegisterId, RegisterRole,
};
pub use crate::error::{Error, ErrorKind};
pub use crate::memory::MemoryInterface;
pub use crate::probe::{
    list::Lister, list::ProbeLister, DebugProbe, DebugProbeError, DebugProbeInfo,
    DebugProbeSelector, DebugProbeType, DriverFlags, FeatureFlags, Probe, ProbeCreationError,
    ProbeFactory, WireProtocol,
};
pub use crate::session::{Session, SessionConfig};

/// The version of this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

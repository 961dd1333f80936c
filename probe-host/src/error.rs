use crate::config::RegistryError;
use crate::core::{CoreStatus, RegisterId};
use crate::flashing::{FileDownloadError, FlashError};
use crate::probe::{DebugProbeError, DebugProbeSelectorParseError, ProbeCreationError};
use probe_host_target::Architecture;

/// The overarching error type which contains all possible errors as variants.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error with the usage of the probe occurred
    #[error("An error with the usage of the probe occurred")]
    Probe(#[from] DebugProbeError),
    /// No probe was found.
    #[error("No connected probe was found")]
    NoProbeFound,
    /// The probe at the given index does not exist.
    #[error("Probe {0} does not exist")]
    ProbeNotFound(usize),
    /// The probe selector could not be parsed.
    #[error("Invalid probe selector")]
    InvalidSelector(#[from] DebugProbeSelectorParseError),
    /// The probe family is unknown or excluded by the programmer type filter.
    #[error("{0}")]
    UnsupportedProbeType(String),
    /// The requested item of the chip catalog does not exist.
    #[error("{0} does not exist in the chip catalog")]
    CatalogEntryNotFound(String),
    /// The session handle does not refer to an open session.
    #[error("Session handle {0:#x} is not valid")]
    InvalidSession(u64),
    /// The core with the given index does not exist.
    #[error("Core {0} does not exist")]
    CoreNotFound(usize),
    /// The chip could not be resolved.
    #[error("Unable to load specification for chip")]
    ChipNotFound(#[from] RegistryError),
    /// Neither the requested protocol nor any protocol shared by probe and chip could be selected.
    #[error("No usable wire protocol: {0}")]
    UnsupportedProtocol(String),
    /// The probe has no interface for the architecture of the chip.
    #[error("The probe does not support {0} targets")]
    ArchitectureNotSupported(Architecture),
    /// The operation did not complete in time.
    #[error("Operation timed out")]
    Timeout,
    /// The requested operation is not allowed in the current state of the core.
    #[error("Unable to {operation}, the core is {status:?}")]
    InvalidState {
        /// The operation which was rejected.
        operation: &'static str,
        /// The status of the core when the operation was attempted.
        status: CoreStatus,
    },
    /// A memory access failed.
    #[error("Memory access at {address:#010x} failed")]
    MemoryAccess {
        /// The address of the failed access.
        address: u64,
        /// The error reported by the probe.
        #[source]
        source: DebugProbeError,
    },
    /// A word access was not aligned to the word size.
    #[error("Memory access at {address:#010x} is not aligned to {alignment} bytes")]
    MemoryNotAligned {
        /// The address of the access.
        address: u64,
        /// The required alignment in bytes.
        alignment: usize,
    },
    /// A memory access would run past the end of the address space.
    #[error("Accessing {len} bytes at {address:#010x} exceeds the address space")]
    OutOfBounds {
        /// The start address of the access.
        address: u64,
        /// The length of the access in bytes.
        len: usize,
    },
    /// A register access failed.
    #[error("Access to register {id:?} failed")]
    RegisterAccess {
        /// The register which was accessed.
        id: RegisterId,
        /// The error reported by the probe.
        #[source]
        source: DebugProbeError,
    },
    /// The register does not exist in the register file of the core.
    #[error("Register {0:?} does not exist on this core")]
    UnknownRegister(RegisterId),
    /// The register file has no register at the given position.
    #[error("Register index {0} is out of range")]
    RegisterNotFound(usize),
    /// The register can not be written.
    #[error("Register {0} is read-only")]
    ReadOnlyRegister(&'static str),
    /// All hardware breakpoint units of the core are in use.
    #[error("Unable to set hardware breakpoint, all available breakpoint units are in use.")]
    BreakpointUnitsExceeded,
    /// Flashing failed.
    #[error(transparent)]
    Flash(#[from] FlashError),
    /// Loading or flashing a file failed.
    #[error(transparent)]
    FileDownload(#[from] FileDownloadError),
    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Probe(e) => e.kind(),
            Error::NoProbeFound
            | Error::ProbeNotFound(_)
            | Error::InvalidSelector(_)
            | Error::RegisterNotFound(_)
            | Error::CatalogEntryNotFound(_) => ErrorKind::NotFound,
            Error::UnsupportedProbeType(_) => ErrorKind::Unsupported,
            Error::InvalidSession(_) => ErrorKind::InvalidSession,
            Error::CoreNotFound(_) => ErrorKind::InvalidCore,
            Error::ChipNotFound(_) => ErrorKind::UnknownChip,
            Error::UnsupportedProtocol(_) => ErrorKind::UnsupportedProtocol,
            Error::ArchitectureNotSupported(_) => ErrorKind::Unsupported,
            Error::Timeout => ErrorKind::Timeout,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::MemoryAccess { source, .. } | Error::RegisterAccess { source, .. } => {
                if source.is_link_lost() {
                    ErrorKind::TransportError
                } else {
                    ErrorKind::AccessFault
                }
            }
            Error::MemoryNotAligned { .. } | Error::OutOfBounds { .. } => ErrorKind::AccessFault,
            Error::UnknownRegister(_) => ErrorKind::UnknownRegister,
            Error::ReadOnlyRegister(_) => ErrorKind::Unsupported,
            Error::BreakpointUnitsExceeded => ErrorKind::OutOfUnits,
            Error::Flash(e) => e.kind(),
            Error::FileDownload(e) => e.kind(),
            Error::Other(_) => ErrorKind::TransportError,
        }
    }

    /// The negative status code of this error, see [`ErrorKind::status_code`].
    pub fn status_code(&self) -> i32 {
        self.kind().status_code()
    }
}

/// The class of an [`Error`].
#[derive(docsplay::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// not found
    NotFound,
    /// invalid session
    InvalidSession,
    /// invalid core
    InvalidCore,
    /// unknown chip
    UnknownChip,
    /// unsupported protocol
    UnsupportedProtocol,
    /// timeout
    Timeout,
    /// invalid state
    InvalidState,
    /// access fault
    AccessFault,
    /// unknown register
    UnknownRegister,
    /// unsupported
    Unsupported,
    /// out of breakpoint units
    OutOfUnits,
    /// verify failed
    VerifyFailed,
    /// flash error
    FlashError,
    /// transport error
    TransportError,
}

impl ErrorKind {
    /// All error kinds, ordered by their status code.
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::NotFound,
        ErrorKind::InvalidSession,
        ErrorKind::InvalidCore,
        ErrorKind::UnknownChip,
        ErrorKind::UnsupportedProtocol,
        ErrorKind::Timeout,
        ErrorKind::InvalidState,
        ErrorKind::AccessFault,
        ErrorKind::UnknownRegister,
        ErrorKind::Unsupported,
        ErrorKind::OutOfUnits,
        ErrorKind::VerifyFailed,
        ErrorKind::FlashError,
        ErrorKind::TransportError,
    ];

    /// The status code reported for this kind of error. Always negative.
    pub fn status_code(self) -> i32 {
        match self {
            ErrorKind::NotFound => -1,
            ErrorKind::InvalidSession => -2,
            ErrorKind::InvalidCore => -3,
            ErrorKind::UnknownChip => -4,
            ErrorKind::UnsupportedProtocol => -5,
            ErrorKind::Timeout => -6,
            ErrorKind::InvalidState => -7,
            ErrorKind::AccessFault => -8,
            ErrorKind::UnknownRegister => -9,
            ErrorKind::Unsupported => -10,
            ErrorKind::OutOfUnits => -11,
            ErrorKind::VerifyFailed => -12,
            ErrorKind::FlashError => -13,
            ErrorKind::TransportError => -14,
        }
    }

    /// Maps a status code back to the error kind.
    pub fn from_status_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.status_code() == code)
    }
}

impl DebugProbeError {
    /// Classifies the probe error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DebugProbeError::Timeout => ErrorKind::Timeout,
            DebugProbeError::UnsupportedProtocol(_) => ErrorKind::UnsupportedProtocol,
            DebugProbeError::ProbeCouldNotBeCreated(ProbeCreationError::NotFound) => {
                ErrorKind::NotFound
            }
            DebugProbeError::TargetAccess { .. } => ErrorKind::AccessFault,
            DebugProbeError::NotImplemented(_)
            | DebugProbeError::CommandNotSupportedByProbe
            | DebugProbeError::InterfaceNotAvailable(_)
            | DebugProbeError::UnsupportedSpeed(_) => ErrorKind::Unsupported,
            _ => ErrorKind::TransportError,
        }
    }
}

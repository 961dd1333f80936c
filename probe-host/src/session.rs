use crate::config::Target;
use crate::core::{Core, CoreState};
use crate::error::Error;
use crate::probe::{DebugProbeError, Probe, WireProtocol};
use std::fmt;

/// Options for attaching to a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Debug protocol speed in kHz. `None` or zero keeps the default of the probe.
    pub speed_khz: Option<u32>,
    /// The wire protocol. `None` negotiates a protocol supported by both probe and chip.
    pub protocol: Option<WireProtocol>,
}

impl SessionConfig {
    /// Builds a configuration from the values of the handle interface,
    /// where a speed of zero means the probe default.
    pub fn new(speed_khz: u32, protocol: Option<WireProtocol>) -> Self {
        Self {
            speed_khz: (speed_khz != 0).then_some(speed_khz),
            protocol,
        }
    }
}

/// The `Session` struct represents an active debug session.
///
/// It owns the probe and the description of the attached target, and the
/// state of every core. The number of cores is fixed when the session is
/// created. Cores are accessed through short lived [`Core`] handles.
///
/// Dropping the session clears all hardware breakpoints and detaches the probe.
pub struct Session {
    target: Target,
    probe: Probe,
    cores: Vec<CoreState>,
    protocol: WireProtocol,
}

impl Session {
    /// Open a new session with a given debug target.
    #[tracing::instrument(skip_all, fields(target = %target.name))]
    pub(crate) fn new(mut probe: Probe, target: Target, config: SessionConfig) -> Result<Self, Error> {
        let architecture = target.architecture();

        if !probe.supports_architecture(architecture) {
            return Err(Error::ArchitectureNotSupported(architecture));
        }

        if let Some(speed) = config.speed_khz.filter(|speed| *speed != 0) {
            let actual = probe.set_speed(speed)?;
            tracing::debug!("Requested {speed} kHz, probe runs at {actual} kHz");
        }

        let allowed = WireProtocol::supported_by(architecture);
        let protocol = match config.protocol {
            Some(protocol) => {
                if !allowed.contains(&protocol) {
                    return Err(Error::UnsupportedProtocol(format!(
                        "{architecture} targets can not be debugged over {protocol}"
                    )));
                }
                match probe.select_protocol(protocol) {
                    Ok(()) => protocol,
                    Err(DebugProbeError::UnsupportedProtocol(_)) => {
                        return Err(Error::UnsupportedProtocol(format!(
                            "the probe does not support {protocol}"
                        )))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => allowed
                .iter()
                .copied()
                .find(|protocol| probe.select_protocol(*protocol).is_ok())
                .ok_or_else(|| {
                    Error::UnsupportedProtocol(format!(
                        "the probe shares no protocol with {architecture} targets"
                    ))
                })?,
        };

        tracing::info!("Attaching to {} over {protocol}", target.name);
        probe.attach_to_unspecified()?;

        let cores = (0..target.cores.len()).map(CoreState::new).collect();

        Ok(Session {
            target,
            probe,
            cores,
            protocol,
        })
    }

    /// Get the core with the given index.
    pub fn core(&mut self, core_index: usize) -> Result<Core<'_>, Error> {
        let state = self
            .cores
            .get_mut(core_index)
            .ok_or(Error::CoreNotFound(core_index))?;

        let inner = self.probe.core_interface(&self.target, core_index)?;

        Ok(Core::new(state, inner))
    }

    /// The number of cores of the target.
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// The state of the core with the given index, as last observed.
    pub fn core_state(&self, core_index: usize) -> Option<&CoreState> {
        self.cores.get(core_index)
    }

    /// The target of the session.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The negotiated wire protocol.
    pub fn protocol(&self) -> WireProtocol {
        self.protocol
    }

    /// The speed of the debug protocol in kHz.
    pub fn speed_khz(&self) -> u32 {
        self.probe.speed_khz()
    }

    /// The probe of the session.
    pub fn probe(&mut self) -> &mut Probe {
        &mut self.probe
    }

    /// Clears all hardware breakpoints on all cores.
    pub fn clear_all_hw_breakpoints(&mut self) -> Result<(), Error> {
        for core_index in 0..self.cores.len() {
            if self.cores[core_index].breakpoints().is_empty() {
                continue;
            }
            self.core(core_index)?.clear_all_hw_breakpoints()?;
        }

        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target.name)
            .field("probe", &self.probe.get_name())
            .field("cores", &self.cores)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl Drop for Session {
    #[tracing::instrument(name = "session_drop", skip(self))]
    fn drop(&mut self) {
        if let Err(err) = self.clear_all_hw_breakpoints() {
            tracing::warn!(
                "Could not clear all hardware breakpoints: {:?}",
                anyhow::anyhow!(err)
            );
        }

        if let Err(err) = self.probe.detach() {
            tracing::warn!("Failed to detach from the target: {err}");
        }
    }
}

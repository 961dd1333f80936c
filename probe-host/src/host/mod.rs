//! A handle based interface to the engine.
//!
//! [`Host`] keeps the open sessions in an arena and hands out opaque
//! [`SessionHandle`]s for them. Every failing operation stores a description
//! of the error in a last-error slot, which can be read right after the call.
//! Flash operations report their progress to an optional observer.
//!
//! String queries follow a two-call convention through the `*_into` methods:
//! called without a buffer they return the size needed for the string and its
//! terminator, called with a buffer they fill it. See [`fill_string_buffer`].
//!
//! ```no_run
//! use std::time::Duration;
//! use probe_host::host::{Host, IntoStatus};
//! use probe_host::SessionConfig;
//!
//! let host = Host::global();
//! let session = host.open_auto("nrf52840_xxaa", SessionConfig::default())?;
//!
//! let status = host.halt(session, 0, Duration::from_millis(100)).map(|_| ()).into_status();
//! if status < 0 {
//!     eprintln!("halt failed: {}", host.last_error());
//! }
//!
//! host.close(session)?;
//! # Ok::<(), probe_host::Error>(())
//! ```

mod arena;
mod buffer;
mod progress;
mod status;

pub use arena::SessionHandle;
pub use buffer::fill_string_buffer;
pub use progress::{ProgressObserver, ProgressReport, ProgressTracker};
pub use status::IntoStatus;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use arena::SessionArena;

use crate::config::{catalog, get_target_by_name, Target};
use crate::core::{Core, CoreInformation, CoreStatus};
use crate::error::Error;
use crate::flashing::{
    download_file_with_options, erase_all, BinOptions, DownloadOptions, FlashProgress, Format,
};
use crate::memory::MemoryInterface;
use crate::probe::{
    list::Lister, DebugProbeInfo, DebugProbeSelector, DebugProbeType, DriverFlags, FeatureFlags,
    WireProtocol,
};
use crate::session::{Session, SessionConfig};

static HOST: Lazy<Host> = Lazy::new(Host::new);

/// The flags of a flash job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashFlags {
    /// Read back and compare everything that was requested to be written.
    pub verify: bool,
    /// Skip the sectors which already hold the image.
    pub preverify: bool,
    /// Erase the whole flash before programming.
    pub chip_erase: bool,
}

/// An entry of the register file of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo {
    /// The id the register is accessed by.
    pub id: u16,
    /// The width of the register in bits.
    pub bit_width: u32,
    /// The display name of the register.
    pub name: &'static str,
}

/// The handle based engine: open sessions, the last error, the progress
/// observer and the programmer type filter.
///
/// Operations on one session are serialized by a per-session lock, operations
/// on different sessions may run in parallel. The last-error slot is shared by
/// all callers of a host.
pub struct Host {
    lister: Lister,
    sessions: SessionArena,
    last_error: Mutex<String>,
    observer: RwLock<Option<ProgressObserver>>,
    programmer_type: Mutex<Option<DebugProbeType>>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("lister", &self.lister)
            .field("sessions", &self.sessions.len())
            .field("last_error", &*self.last_error.lock())
            .field("observer", &self.observer.read().is_some())
            .field("programmer_type", &*self.programmer_type.lock())
            .finish()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

impl Host {
    /// A host which finds probes with the default [`Lister`].
    pub fn new() -> Self {
        Self::with_lister(Lister::new())
    }

    /// A host which finds probes with the given lister.
    pub fn with_lister(lister: Lister) -> Self {
        Self {
            lister,
            sessions: SessionArena::default(),
            last_error: Mutex::new(String::new()),
            observer: RwLock::new(None),
            programmer_type: Mutex::new(None),
        }
    }

    /// The process wide host.
    pub fn global() -> &'static Host {
        &HOST
    }

    fn record<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(error) = &result {
            self.set_last_error(error);
        }
        result
    }

    fn set_last_error(&self, error: &Error) {
        let message = describe(error);
        tracing::debug!("{message}");
        *self.last_error.lock() = message;
    }

    /// The version of the library.
    pub fn version(&self) -> &'static str {
        crate::version()
    }

    /// Two-call variant of [`Host::version`].
    pub fn version_into(&self, buffer: Option<&mut [u8]>) -> usize {
        fill_string_buffer(self.version(), buffer)
    }

    /// The description of the last failed operation. Empty if nothing failed yet.
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    /// Two-call variant of [`Host::last_error`].
    pub fn last_error_into(&self, buffer: Option<&mut [u8]>) -> usize {
        fill_string_buffer(&self.last_error.lock(), buffer)
    }

    /// Installs the progress observer, replacing the previous one.
    ///
    /// The observer is called synchronously by flash operations. It must not
    /// call back into the session which is being flashed.
    pub fn set_progress_observer(&self, observer: impl Fn(&ProgressReport) + Send + Sync + 'static) {
        *self.observer.write() = Some(Arc::new(observer));
    }

    /// Removes the progress observer.
    pub fn clear_progress_observer(&self) {
        *self.observer.write() = None;
    }

    fn flash_progress(&self) -> FlashProgress<'static> {
        let Some(observer) = self.observer.read().clone() else {
            return FlashProgress::empty();
        };

        let mut tracker = ProgressTracker::new();
        FlashProgress::new(move |event| {
            if let Some(report) = tracker.update(&event) {
                observer(&report);
            }
        })
    }

    // Probes

    /// The number of connected probes. Indices are only valid until the next call.
    pub fn probe_count(&self) -> usize {
        self.lister.list_all().len()
    }

    fn probe(&self, index: usize) -> Result<DebugProbeInfo, Error> {
        self.lister
            .list_all()
            .into_iter()
            .nth(index)
            .ok_or(Error::ProbeNotFound(index))
    }

    /// The description of the probe with the given index.
    pub fn probe_info(&self, index: usize) -> Result<DebugProbeInfo, Error> {
        self.record(self.probe(index))
    }

    /// Two-call variant for the identifier of a probe.
    pub fn probe_identifier_into(
        &self,
        index: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let info = self.probe_info(index)?;
        Ok(fill_string_buffer(&info.identifier, buffer))
    }

    /// Two-call variant for the serial number of a probe. A probe without
    /// serial number reports an empty string.
    pub fn probe_serial_into(
        &self,
        index: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let info = self.probe_info(index)?;
        Ok(fill_string_buffer(
            info.serial_number.as_deref().unwrap_or_default(),
            buffer,
        ))
    }

    /// The driver flags and the capabilities of a probe.
    ///
    /// The probe is opened to query its capabilities, but nothing is sent to the target.
    pub fn probe_features(&self, index: usize) -> Result<(DriverFlags, FeatureFlags), Error> {
        let result = self.probe(index).and_then(|info| {
            let mut probe = self.lister.open(&info)?;
            Ok((info.driver_flags(), probe.features()?))
        });
        self.record(result)
    }

    /// Checks whether the probe can attach to a target over SWD or JTAG.
    ///
    /// Returns `false` if it can not, with the reason in the last-error slot.
    pub fn probe_check_target(&self, index: usize) -> Result<bool, Error> {
        let result = self.probe(index).and_then(|info| {
            let mut probe = self.lister.open(&info)?;
            let mut attach_error = None;

            for protocol in [WireProtocol::Swd, WireProtocol::Jtag] {
                if probe.select_protocol(protocol).is_err() {
                    continue;
                }

                match probe.attach_to_unspecified() {
                    Ok(()) => {
                        if let Err(e) = probe.detach() {
                            tracing::warn!("Failed to detach after checking the target: {e}");
                        }
                        return Ok(true);
                    }
                    Err(e) => {
                        tracing::debug!("Attaching over {protocol} failed: {e}");
                        attach_error = Some(e);
                    }
                }
            }

            if let Some(error) = attach_error {
                self.set_last_error(&error);
            }
            Ok(false)
        });
        self.record(result)
    }

    // Programmer type filter

    /// Restricts automatic probe selection to one probe family, given by its code.
    pub fn set_programmer_type(&self, code: u32) -> Result<(), Error> {
        let result = DebugProbeType::from_code(code)
            .ok_or_else(|| Error::UnsupportedProbeType(format!("Probe type code {code} is unknown")))
            .map(|probe_type| *self.programmer_type.lock() = Some(probe_type));
        self.record(result)
    }

    /// Lifts the restriction of [`Host::set_programmer_type`].
    pub fn clear_programmer_type(&self) {
        *self.programmer_type.lock() = None;
    }

    /// The probe family automatic selection is restricted to.
    pub fn programmer_type(&self) -> Option<DebugProbeType> {
        *self.programmer_type.lock()
    }

    /// The code of [`Host::programmer_type`], 0 if there is no restriction.
    pub fn programmer_type_code(&self) -> u32 {
        self.programmer_type().map_or(0, DebugProbeType::code)
    }

    /// Returns `true` if `code` is the code of a probe family.
    pub fn programmer_type_is_supported(code: u32) -> bool {
        DebugProbeType::from_code(code).is_some()
    }

    /// Two-call variant for the name of the probe family with the given code.
    /// An unknown code has an empty name.
    pub fn programmer_type_name_into(code: u32, buffer: Option<&mut [u8]>) -> usize {
        let name = DebugProbeType::from_code(code).map_or("", DebugProbeType::name);
        fill_string_buffer(name, buffer)
    }

    /// The code of the probe family with the given name or alias.
    pub fn programmer_type_from_name(name: &str) -> Result<u32, Error> {
        name.parse::<DebugProbeType>()
            .map(DebugProbeType::code)
            .map_err(Error::UnsupportedProbeType)
    }

    // Sessions

    fn attach_auto(&self, target: Target, config: SessionConfig) -> Result<Session, Error> {
        let filter = self.programmer_type();
        let candidates: Vec<_> = self
            .lister
            .list_all()
            .into_iter()
            .filter(|info| filter.map_or(true, |probe_type| info.probe_type == probe_type))
            .collect();

        let mut last_error = None;
        for info in candidates {
            let session = self
                .lister
                .open(&info)
                .map_err(Error::from)
                .and_then(|probe| probe.attach(target.clone(), config));

            match session {
                Ok(session) => return Ok(session),
                Err(e) => {
                    tracing::debug!("Could not attach to {} with {info:?}: {e}", target.name);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(Error::NoProbeFound))
    }

    fn attach_selected(
        &self,
        selector: &str,
        target: Target,
        config: SessionConfig,
    ) -> Result<Session, Error> {
        let selector: DebugProbeSelector = selector.parse()?;

        if let Some(probe_type) = self.programmer_type() {
            let info = self
                .lister
                .list(Some(&selector))
                .into_iter()
                .next()
                .ok_or(Error::NoProbeFound)?;

            if info.probe_type != probe_type {
                return Err(Error::UnsupportedProbeType(format!(
                    "Probe {selector} is a {} probe, only {probe_type} probes are allowed",
                    info.probe_type
                )));
            }
        }

        let probe = self.lister.open(selector)?;
        probe.attach(target, config)
    }

    /// Attaches to `chip` with the first connected probe which can.
    ///
    /// The chip name is resolved before any probe is touched.
    #[tracing::instrument(skip(self))]
    pub fn open_auto(&self, chip: &str, config: SessionConfig) -> Result<SessionHandle, Error> {
        let result = get_target_by_name(chip)
            .map_err(Error::from)
            .and_then(|target| self.attach_auto(target, config))
            .map(|session| self.sessions.insert(session));
        self.record(result)
    }

    /// Attaches to `chip` with the probe given by a `VID:PID[:serial]` selector.
    #[tracing::instrument(skip(self))]
    pub fn open_with_probe(
        &self,
        selector: &str,
        chip: &str,
        config: SessionConfig,
    ) -> Result<SessionHandle, Error> {
        let result = get_target_by_name(chip)
            .map_err(Error::from)
            .and_then(|target| self.attach_selected(selector, target, config))
            .map(|session| self.sessions.insert(session));
        self.record(result)
    }

    /// Closes a session. The probe detaches once running operations on the session completed.
    pub fn close(&self, session: SessionHandle) -> Result<(), Error> {
        let result = self.sessions.remove(session).map(drop);
        self.record(result)
    }

    /// The number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn with_session<T>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut Session) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let result = self.sessions.get(handle).and_then(|session| {
            let mut session = session.lock();
            f(&mut session)
        });
        self.record(result)
    }

    fn with_core<T>(
        &self,
        handle: SessionHandle,
        core_index: usize,
        f: impl FnOnce(&mut Core<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.with_session(handle, |session| {
            let mut core = session.core(core_index)?;
            f(&mut core)
        })
    }

    /// The number of cores of the chip of a session.
    pub fn core_count(&self, session: SessionHandle) -> Result<usize, Error> {
        self.with_session(session, |session| Ok(session.core_count()))
    }

    // Core control

    /// Halts a core, waiting at most `timeout` for it to stop.
    pub fn halt(
        &self,
        session: SessionHandle,
        core: usize,
        timeout: Duration,
    ) -> Result<CoreInformation, Error> {
        self.with_core(session, core, |core| core.halt(timeout))
    }

    /// Resumes a halted core.
    pub fn run(&self, session: SessionHandle, core: usize) -> Result<(), Error> {
        self.with_core(session, core, |core| core.run())
    }

    /// Executes a single instruction on a halted core.
    pub fn step(&self, session: SessionHandle, core: usize) -> Result<CoreInformation, Error> {
        self.with_core(session, core, |core| core.step())
    }

    /// Resets a core and lets it run.
    pub fn reset(&self, session: SessionHandle, core: usize) -> Result<(), Error> {
        self.with_core(session, core, |core| core.reset())
    }

    /// Resets a core and halts it before the first instruction.
    pub fn reset_and_halt(
        &self,
        session: SessionHandle,
        core: usize,
        timeout: Duration,
    ) -> Result<CoreInformation, Error> {
        self.with_core(session, core, |core| core.reset_and_halt(timeout))
    }

    /// Polls the status of a core.
    pub fn core_status(&self, session: SessionHandle, core: usize) -> Result<CoreStatus, Error> {
        self.with_core(session, core, |core| core.status())
    }

    // Memory

    /// Reads bytes at `address`.
    pub fn read_8(
        &self,
        session: SessionHandle,
        core: usize,
        address: u64,
        data: &mut [u8],
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.read_8(address, data))
    }

    /// Writes bytes at `address`.
    pub fn write_8(
        &self,
        session: SessionHandle,
        core: usize,
        address: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.write_8(address, data))
    }

    /// Reads words at the word aligned `address`.
    pub fn read_32(
        &self,
        session: SessionHandle,
        core: usize,
        address: u64,
        data: &mut [u32],
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.read_32(address, data))
    }

    /// Writes words at the word aligned `address`.
    pub fn write_32(
        &self,
        session: SessionHandle,
        core: usize,
        address: u64,
        data: &[u32],
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.write_32(address, data))
    }

    // Registers

    /// The number of registers in the register file of a core.
    pub fn register_count(&self, session: SessionHandle, core: usize) -> Result<usize, Error> {
        self.with_core(session, core, |core| Ok(core.registers().len()))
    }

    /// The register at position `index` of the register file of a core.
    pub fn register_info(
        &self,
        session: SessionHandle,
        core: usize,
        index: usize,
    ) -> Result<RegisterInfo, Error> {
        self.with_core(session, core, |core| {
            let register = core
                .registers()
                .get(index)
                .ok_or(Error::RegisterNotFound(index))?;

            Ok(RegisterInfo {
                id: register.id().0,
                bit_width: register.size_in_bits() as u32,
                name: register.name(),
            })
        })
    }

    /// Two-call variant for the name of the register at position `index`.
    pub fn register_name_into(
        &self,
        session: SessionHandle,
        core: usize,
        index: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let info = self.register_info(session, core, index)?;
        Ok(fill_string_buffer(info.name, buffer))
    }

    /// Reads the register with the given id.
    pub fn read_register(&self, session: SessionHandle, core: usize, id: u16) -> Result<u64, Error> {
        self.with_core(session, core, |core| core.read_core_reg(id))
    }

    /// Writes the register with the given id. Bits above its width are dropped.
    pub fn write_register(
        &self,
        session: SessionHandle,
        core: usize,
        id: u16,
        value: u64,
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.write_core_reg(id, value))
    }

    // Breakpoints

    /// The number of hardware breakpoint units of a core.
    pub fn available_breakpoint_units(
        &self,
        session: SessionHandle,
        core: usize,
    ) -> Result<u32, Error> {
        self.with_core(session, core, |core| core.available_breakpoint_units())
    }

    /// Sets a hardware breakpoint. Setting it again is a no-op.
    pub fn set_breakpoint(&self, session: SessionHandle, core: usize, address: u64) -> Result<(), Error> {
        self.with_core(session, core, |core| core.set_hw_breakpoint(address))
    }

    /// Clears a hardware breakpoint. Clearing an address without one is a no-op.
    pub fn clear_breakpoint(
        &self,
        session: SessionHandle,
        core: usize,
        address: u64,
    ) -> Result<(), Error> {
        self.with_core(session, core, |core| core.clear_hw_breakpoint(address))
    }

    /// Clears the hardware breakpoints of all cores of a session.
    pub fn clear_all_breakpoints(&self, session: SessionHandle) -> Result<(), Error> {
        self.with_session(session, |session| session.clear_all_hw_breakpoints())
    }

    // Flashing

    fn download(
        &self,
        session: &mut Session,
        path: &Path,
        format: Format,
        flags: FlashFlags,
    ) -> Result<(), Error> {
        let options = DownloadOptions {
            progress: self.flash_progress(),
            verify: flags.verify,
            preverify: flags.preverify,
            do_chip_erase: flags.chip_erase,
            ..DownloadOptions::default()
        };

        download_file_with_options(session, path, format, options)?;
        Ok(())
    }

    fn open_session(&self, chip: &str, config: SessionConfig) -> Result<Session, Error> {
        let target = get_target_by_name(chip)?;
        self.attach_auto(target, config)
    }

    /// Flashes a file onto `chip` through a session of its own, which is
    /// closed again before returning.
    #[tracing::instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn flash(
        &self,
        chip: &str,
        path: impl AsRef<Path>,
        format: Format,
        flags: FlashFlags,
        config: SessionConfig,
    ) -> Result<(), Error> {
        let result = self
            .open_session(chip, config)
            .and_then(|mut session| self.download(&mut session, path.as_ref(), format, flags));
        self.record(result)
    }

    /// Flashes an ELF file.
    pub fn flash_elf(
        &self,
        chip: &str,
        path: impl AsRef<Path>,
        flags: FlashFlags,
        config: SessionConfig,
    ) -> Result<(), Error> {
        self.flash(chip, path, Format::Elf, flags, config)
    }

    /// Flashes an Intel HEX file.
    pub fn flash_hex(
        &self,
        chip: &str,
        path: impl AsRef<Path>,
        flags: FlashFlags,
        config: SessionConfig,
    ) -> Result<(), Error> {
        self.flash(chip, path, Format::Hex, flags, config)
    }

    /// Flashes a raw binary, skipping `skip` bytes of it and placing the rest at `base_address`.
    pub fn flash_bin(
        &self,
        chip: &str,
        path: impl AsRef<Path>,
        base_address: u64,
        skip: u32,
        flags: FlashFlags,
        config: SessionConfig,
    ) -> Result<(), Error> {
        let format = Format::Bin(BinOptions {
            base_address: Some(base_address),
            skip,
        });
        self.flash(chip, path, format, flags, config)
    }

    /// Flashes a file whose format is detected from its extension.
    /// `bin_options` apply if it is a raw binary, and must then hold a base address.
    pub fn flash_auto(
        &self,
        chip: &str,
        path: impl AsRef<Path>,
        bin_options: BinOptions,
        flags: FlashFlags,
        config: SessionConfig,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        match Format::from_path(path, bin_options) {
            Ok(format) => self.flash(chip, path, format, flags, config),
            Err(e) => self.record(Err(e.into())),
        }
    }

    /// Flashes a file through an open session.
    pub fn flash_session(
        &self,
        session: SessionHandle,
        path: impl AsRef<Path>,
        format: Format,
        flags: FlashFlags,
    ) -> Result<(), Error> {
        self.with_session(session, |session| {
            self.download(session, path.as_ref(), format, flags)
        })
    }

    /// Erases all flash of `chip` through a session of its own.
    #[tracing::instrument(skip(self))]
    pub fn chip_erase(&self, chip: &str, config: SessionConfig) -> Result<(), Error> {
        let result = self.open_session(chip, config).and_then(|mut session| {
            erase_all(&mut session, self.flash_progress())?;
            Ok(())
        });
        self.record(result)
    }

    // Chip catalog

    /// The number of manufacturers in the chip catalog.
    pub fn manufacturer_count(&self) -> usize {
        catalog().manufacturer_count()
    }

    /// The name of a manufacturer.
    pub fn manufacturer_name(&self, manufacturer: usize) -> Result<&'static str, Error> {
        self.record(catalog().manufacturer_name(manufacturer))
    }

    /// Two-call variant of [`Host::manufacturer_name`].
    pub fn manufacturer_name_into(
        &self,
        manufacturer: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let name = self.manufacturer_name(manufacturer)?;
        Ok(fill_string_buffer(name, buffer))
    }

    /// The number of models of a manufacturer.
    pub fn model_count(&self, manufacturer: usize) -> Result<usize, Error> {
        self.record(catalog().model_count(manufacturer))
    }

    /// The name of a model of a manufacturer.
    pub fn model_name(&self, manufacturer: usize, model: usize) -> Result<&'static str, Error> {
        self.record(catalog().model_name(manufacturer, model))
    }

    /// Two-call variant of [`Host::model_name`].
    pub fn model_name_into(
        &self,
        manufacturer: usize,
        model: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let name = self.model_name(manufacturer, model)?;
        Ok(fill_string_buffer(name, buffer))
    }

    /// The JSON specification of a model of a manufacturer.
    pub fn model_specs(&self, manufacturer: usize, model: usize) -> Result<String, Error> {
        let result = catalog()
            .model_specs(manufacturer, model)
            .and_then(|specs| specs.to_json());
        self.record(result)
    }

    /// Two-call variant of [`Host::model_specs`].
    pub fn model_specs_into(
        &self,
        manufacturer: usize,
        model: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let specs = self.model_specs(manufacturer, model)?;
        Ok(fill_string_buffer(&specs, buffer))
    }

    /// The JSON specification of the chip with the given exact name.
    pub fn specs_by_name(&self, chip: &str) -> Result<String, Error> {
        let result = catalog()
            .specs_by_name(chip)
            .and_then(|specs| specs.to_json());
        self.record(result)
    }

    /// Two-call variant of [`Host::specs_by_name`].
    pub fn specs_by_name_into(
        &self,
        chip: &str,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let specs = self.specs_by_name(chip)?;
        Ok(fill_string_buffer(&specs, buffer))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn failures_are_recorded() {
        let host = Host::new();
        assert_eq!(host.last_error(), "");

        let error = host.open_auto("not_a_chip", SessionConfig::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownChip);
        assert!(!host.last_error().is_empty());
        assert_eq!(host.session_count(), 0);

        let needed = host.last_error_into(None);
        let mut buffer = vec![0; needed];
        host.last_error_into(Some(&mut buffer));
        assert_eq!(&buffer[..needed - 1], host.last_error().as_bytes());
    }

    #[test]
    fn no_probes_connected() {
        let host = Host::new();

        assert_eq!(host.probe_count(), 0);
        assert_eq!(host.probe_info(0).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            host.open_auto("stm32f407vgtx", SessionConfig::default())
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn programmer_types() {
        let host = Host::new();
        assert_eq!(host.programmer_type_code(), 0);

        host.set_programmer_type(2).unwrap();
        assert_eq!(host.programmer_type(), Some(DebugProbeType::StLink));
        assert_eq!(host.programmer_type_code(), 2);

        assert_eq!(
            host.set_programmer_type(42).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(host.programmer_type_code(), 2);

        host.clear_programmer_type();
        assert_eq!(host.programmer_type(), None);

        assert!(Host::programmer_type_is_supported(9));
        assert!(!Host::programmer_type_is_supported(0));
        assert_eq!(Host::programmer_type_from_name("daplink").unwrap(), 1);
        assert_eq!(Host::programmer_type_from_name("J-Link").unwrap(), 3);
        assert!(Host::programmer_type_from_name("blackmagic").is_err());

        let mut buffer = [0; 16];
        assert_eq!(Host::programmer_type_name_into(6, Some(&mut buffer)), 9);
        assert_eq!(&buffer[..9], b"wch-link\0");
        assert_eq!(Host::programmer_type_name_into(0, None), 1);
    }

    #[test]
    fn catalog_queries() {
        let host = Host::new();
        assert!(host.manufacturer_count() > 0);

        let needed = host.model_name_into(0, 0, None).unwrap();
        let mut buffer = vec![0; needed];
        host.model_name_into(0, 0, Some(&mut buffer)).unwrap();
        assert_eq!(&buffer[..needed - 1], host.model_name(0, 0).unwrap().as_bytes());

        let specs: serde_json::Value =
            serde_json::from_str(&host.specs_by_name("stm32f407vgtx").unwrap()).unwrap();
        assert_eq!(specs["architecture"], "ARM");

        assert_eq!(
            host.specs_by_name("STM32F407VGTX").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(host.last_error().contains("STM32F407VGTX"));
        assert_eq!(
            host.model_count(usize::MAX).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn version_query() {
        let host = Host::new();
        let needed = host.version_into(None);

        assert_eq!(needed, host.version().len() + 1);
        assert_eq!(host.version(), env!("CARGO_PKG_VERSION"));
    }
}

//! Probe drivers
pub mod fake_probe;
pub mod list;
mod selector;

use crate::config::Target;
use crate::core::CoreInterface;
use crate::error::Error;
use crate::session::{Session, SessionConfig};
use probe_host_target::Architecture;
use std::fmt;
use std::str::FromStr;

pub use selector::{DebugProbeSelector, DebugProbeSelectorParseError};

/// The wire protocol between probe and target.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub enum WireProtocol {
    /// Serial Wire Debug is ARMs proprietary standard for communicating with ARM cores.
    /// You can find specifics in the [`ARM Debug Interface v5.2`](https://developer.arm.com/documentation/ihi0031/f/?lang=en) specification.
    Swd,
    /// JTAG is a standard which is supported by many chips independent of architecture.
    Jtag,
}

impl WireProtocol {
    /// Decodes the protocol code of the handle interface: 0 selects automatically,
    /// 1 is SWD and 2 is JTAG.
    pub fn from_code(code: i32) -> Result<Option<WireProtocol>, Error> {
        match code {
            0 => Ok(None),
            1 => Ok(Some(WireProtocol::Swd)),
            2 => Ok(Some(WireProtocol::Jtag)),
            other => Err(Error::UnsupportedProtocol(format!(
                "protocol code {other} is unknown"
            ))),
        }
    }

    /// The protocol code of the handle interface.
    pub fn code(protocol: Option<WireProtocol>) -> i32 {
        match protocol {
            None => 0,
            Some(WireProtocol::Swd) => 1,
            Some(WireProtocol::Jtag) => 2,
        }
    }

    /// The protocols over which cores of the given architecture can be debugged,
    /// in order of preference.
    pub fn supported_by(architecture: Architecture) -> &'static [WireProtocol] {
        match architecture {
            Architecture::Arm => &[WireProtocol::Swd, WireProtocol::Jtag],
            Architecture::Riscv | Architecture::Xtensa => &[WireProtocol::Jtag],
        }
    }
}

impl fmt::Display for WireProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireProtocol::Swd => f.write_str("SWD"),
            WireProtocol::Jtag => f.write_str("JTAG"),
        }
    }
}

impl FromStr for WireProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_ascii_lowercase()[..] {
            "swd" => Ok(WireProtocol::Swd),
            "jtag" => Ok(WireProtocol::Jtag),
            _ => Err(format!(
                "'{s}' is not a valid protocol. Choose from [swd, jtag]."
            )),
        }
    }
}

bitflags::bitflags! {
    /// One bit per probe family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverFlags: u32 {
        /// CMSIS-DAP
        const CMSIS_DAP = 0x1;
        /// SEGGER J-Link
        const JLINK = 0x2;
        /// ST-Link
        const STLINK = 0x4;
        /// FTDI MPSSE based probes
        const FTDI = 0x8;
        /// The USB JTAG bridge built into Espressif chips
        const ESP_USB_JTAG = 0x10;
        /// WCH-Link
        const WCH_LINK = 0x20;
        /// SiFli UART debug
        const SIFLI_UART = 0x40;
        /// Glasgow Interface Explorer
        const GLASGOW = 0x80;
        /// CH347 USB JTAG
        const CH347 = 0x100;
    }
}

bitflags::bitflags! {
    /// Capabilities of a probe.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FeatureFlags: u32 {
        /// The probe speaks SWD.
        const SWD = 0x1;
        /// The probe speaks JTAG.
        const JTAG = 0x2;
        /// The probe can debug ARM cores.
        const ARM = 0x4;
        /// The probe can debug RISC-V cores.
        const RISCV = 0x8;
        /// The probe can debug Xtensa cores.
        const XTENSA = 0x10;
        /// The probe can capture SWO trace output.
        const SWO = 0x20;
        /// The protocol speed of the probe is configurable.
        const SPEED_CONFIG = 0x40;
    }
}

impl FeatureFlags {
    /// The flag for the given protocol.
    pub fn protocol(protocol: WireProtocol) -> Self {
        match protocol {
            WireProtocol::Swd => FeatureFlags::SWD,
            WireProtocol::Jtag => FeatureFlags::JTAG,
        }
    }

    /// The flag for the given architecture.
    pub fn architecture(architecture: Architecture) -> Self {
        match architecture {
            Architecture::Arm => FeatureFlags::ARM,
            Architecture::Riscv => FeatureFlags::RISCV,
            Architecture::Xtensa => FeatureFlags::XTENSA,
        }
    }
}

/// The closed set of supported probe families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugProbeType {
    /// CMSIS-DAP
    CmsisDap,
    /// ST-Link
    StLink,
    /// SEGGER J-Link
    JLink,
    /// FTDI MPSSE based probes
    Ftdi,
    /// The USB JTAG bridge built into Espressif chips
    EspUsbJtag,
    /// WCH-Link
    WchLink,
    /// SiFli UART debug
    SifliUart,
    /// Glasgow Interface Explorer
    Glasgow,
    /// CH347 USB JTAG
    Ch347UsbJtag,
}

impl DebugProbeType {
    /// All probe families, ordered by their code.
    pub const ALL: [DebugProbeType; 9] = [
        DebugProbeType::CmsisDap,
        DebugProbeType::StLink,
        DebugProbeType::JLink,
        DebugProbeType::Ftdi,
        DebugProbeType::EspUsbJtag,
        DebugProbeType::WchLink,
        DebugProbeType::SifliUart,
        DebugProbeType::Glasgow,
        DebugProbeType::Ch347UsbJtag,
    ];

    /// The numeric code of the probe family. Codes start at 1, 0 means "no family".
    pub fn code(self) -> u32 {
        match self {
            DebugProbeType::CmsisDap => 1,
            DebugProbeType::StLink => 2,
            DebugProbeType::JLink => 3,
            DebugProbeType::Ftdi => 4,
            DebugProbeType::EspUsbJtag => 5,
            DebugProbeType::WchLink => 6,
            DebugProbeType::SifliUart => 7,
            DebugProbeType::Glasgow => 8,
            DebugProbeType::Ch347UsbJtag => 9,
        }
    }

    /// Looks up a probe family by its code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// The canonical name of the probe family.
    pub fn name(self) -> &'static str {
        match self {
            DebugProbeType::CmsisDap => "cmsis-dap",
            DebugProbeType::StLink => "stlink",
            DebugProbeType::JLink => "jlink",
            DebugProbeType::Ftdi => "ftdi",
            DebugProbeType::EspUsbJtag => "esp-usb-jtag",
            DebugProbeType::WchLink => "wch-link",
            DebugProbeType::SifliUart => "sifli-uart",
            DebugProbeType::Glasgow => "glasgow",
            DebugProbeType::Ch347UsbJtag => "ch347-usb-jtag",
        }
    }

    /// The driver flag of the probe family.
    pub fn driver_flag(self) -> DriverFlags {
        match self {
            DebugProbeType::CmsisDap => DriverFlags::CMSIS_DAP,
            DebugProbeType::StLink => DriverFlags::STLINK,
            DebugProbeType::JLink => DriverFlags::JLINK,
            DebugProbeType::Ftdi => DriverFlags::FTDI,
            DebugProbeType::EspUsbJtag => DriverFlags::ESP_USB_JTAG,
            DebugProbeType::WchLink => DriverFlags::WCH_LINK,
            DebugProbeType::SifliUart => DriverFlags::SIFLI_UART,
            DebugProbeType::Glasgow => DriverFlags::GLASGOW,
            DebugProbeType::Ch347UsbJtag => DriverFlags::CH347,
        }
    }
}

impl fmt::Display for DebugProbeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DebugProbeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.trim().to_ascii_lowercase()[..] {
            "cmsis-dap" | "cmsisdap" | "daplink" => Ok(DebugProbeType::CmsisDap),
            "stlink" | "st-link" => Ok(DebugProbeType::StLink),
            "jlink" | "j-link" => Ok(DebugProbeType::JLink),
            "ftdi" => Ok(DebugProbeType::Ftdi),
            "esp-usb-jtag" | "espjtag" => Ok(DebugProbeType::EspUsbJtag),
            "wch-link" | "wlink" => Ok(DebugProbeType::WchLink),
            "sifli-uart" => Ok(DebugProbeType::SifliUart),
            "glasgow" => Ok(DebugProbeType::Glasgow),
            "ch347-usb-jtag" | "ch347" => Ok(DebugProbeType::Ch347UsbJtag),
            _ => Err(format!("'{s}' is not a known probe type.")),
        }
    }
}

/// Errors reported by a probe driver.
#[derive(thiserror::Error, Debug)]
pub enum DebugProbeError {
    /// The USB connection to the probe failed. The probe has to be reopened.
    #[error("USB Communication Error")]
    Usb(#[source] Option<Box<dyn std::error::Error + Send + Sync>>),
    /// An error specific to a probe type occurred.
    #[error("An error specific to a probe type occurred")]
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The probe could not be created.
    #[error("Probe could not be created")]
    ProbeCouldNotBeCreated(#[from] ProbeCreationError),
    /// The probe does not support the protocol.
    #[error("Probe does not support protocol {0}")]
    UnsupportedProtocol(WireProtocol),
    /// The target did not answer in time.
    #[error("Operation timed out")]
    Timeout,
    /// The probe has no interface of the given kind.
    #[error("The connected probe does not support the interface '{0}'")]
    InterfaceNotAvailable(&'static str),
    /// The probe does not support the requested speed.
    #[error("The requested speed setting ({0} kHz) is not supported by the probe")]
    UnsupportedSpeed(u32),
    /// The operation needs an attached probe.
    #[error("You need to be attached to the target to perform this action")]
    NotAttached,
    /// The operation needs a detached probe.
    #[error("You need to be detached from the target to perform this action")]
    Attached,
    /// The functionality was not implemented by the driver.
    #[error("Some functionality was not implemented yet: {0}")]
    NotImplemented(&'static str),
    /// The probe rejected the command.
    #[error("Command not supported by probe")]
    CommandNotSupportedByProbe,
    /// The target reported a fault for the bus access.
    #[error("The target reported a fault when accessing {address:#010x}")]
    TargetAccess {
        /// The faulting address.
        address: u64,
    },
    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DebugProbeError {
    /// Returns `true` if the link to the probe or target is no longer usable.
    pub fn is_link_lost(&self) -> bool {
        matches!(self, DebugProbeError::Usb(_) | DebugProbeError::NotAttached)
    }
}

/// Errors while opening a probe.
#[derive(thiserror::Error, Debug)]
pub enum ProbeCreationError {
    /// No probe matched the selector.
    #[error("Probe was not found.")]
    NotFound,
    /// The device could not be opened.
    #[error("USB device could not be opened. Please check the permissions.")]
    CouldNotOpen,
    /// An error specific to a probe type occurred.
    #[error("An error specific to a probe type occurred: {0}")]
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Any other error.
    #[error("{0}")]
    Other(&'static str),
}

/// The transport interface every probe driver implements.
///
/// All transfers of one probe are serialized through `&mut self`.
pub trait DebugProbe: Send + fmt::Debug {
    /// Get human readable name for the probe.
    fn get_name(&self) -> &str;

    /// The family of the probe.
    fn probe_type(&self) -> DebugProbeType;

    /// Get the currently used maximum speed for the debug protocol in kHz.
    ///
    /// Not all probes report which speed is used, meaning this value is not
    /// always the actual speed used. However, the speed should not be any
    /// higher than this value.
    fn speed_khz(&self) -> u32;

    /// Set the speed in kHz used for communication with the target device.
    ///
    /// If the desired speed is not directly supported, a lower speed will be
    /// selected if possible. The actual speed is returned.
    fn set_speed(&mut self, speed_khz: u32) -> Result<u32, DebugProbeError>;

    /// Enters debug mode.
    fn attach(&mut self) -> Result<(), DebugProbeError>;

    /// Leave debug mode.
    fn detach(&mut self) -> Result<(), DebugProbeError>;

    /// Returns `true` if the probe speaks `protocol`.
    fn supports_protocol(&self, protocol: WireProtocol) -> bool;

    /// Selects the transport protocol to be used by the debug probe.
    fn select_protocol(&mut self, protocol: WireProtocol) -> Result<(), DebugProbeError>;

    /// The protocol which is currently selected, if any.
    fn active_protocol(&self) -> Option<WireProtocol>;

    /// Returns `true` if the probe can debug ARM cores.
    fn has_arm_interface(&self) -> bool {
        false
    }

    /// Returns `true` if the probe can debug RISC-V cores.
    fn has_riscv_interface(&self) -> bool {
        false
    }

    /// Returns `true` if the probe can debug Xtensa cores.
    fn has_xtensa_interface(&self) -> bool {
        false
    }

    /// Returns `true` if the probe can capture SWO output.
    fn has_swo(&self) -> bool {
        false
    }

    /// Returns `true` if the speed of the debug protocol can be changed.
    fn has_speed_config(&self) -> bool {
        false
    }

    /// Get the interface to the core with index `core_index` of the attached target.
    fn try_get_core_interface<'probe>(
        &'probe mut self,
        target: &'probe Target,
        core_index: usize,
    ) -> Result<Box<dyn CoreInterface + 'probe>, DebugProbeError>;
}

/// A driver for one probe family.
///
/// The driver lists connected probes of its family and opens them.
pub trait ProbeFactory: fmt::Debug + Send + Sync {
    /// Creates a new boxed [`DebugProbe`] from a given [`DebugProbeSelector`].
    /// This will be called for all available debug drivers when discovering probes.
    /// When opening, it will open the first probe which succeeds during this call.
    fn open(&self, selector: &DebugProbeSelector) -> Result<Box<dyn DebugProbe>, DebugProbeError>;

    /// Returns a list of all available debug probes of the current type.
    fn list_probes(&self) -> Vec<DebugProbeInfo>;

    /// Returns a list of probes that match the optional selector.
    fn list_probes_filtered(&self, selector: Option<&DebugProbeSelector>) -> Vec<DebugProbeInfo> {
        self.list_probes()
            .into_iter()
            .filter(|probe| selector.map_or(true, |s| s.matches_probe(probe)))
            .collect()
    }
}

/// The Probe struct is a generic wrapper over the different
/// probes supported.
#[derive(Debug)]
pub struct Probe {
    inner: Box<dyn DebugProbe>,
    attached: bool,
}

impl Probe {
    /// Create a new probe from a more specific probe driver.
    pub fn new(probe: impl DebugProbe + 'static) -> Self {
        Self::from_specific_probe(Box::new(probe))
    }

    /// Create a new probe from a boxed driver.
    pub fn from_specific_probe(probe: Box<dyn DebugProbe>) -> Self {
        Probe {
            inner: probe,
            attached: false,
        }
    }

    /// Get human readable name for the probe.
    pub fn get_name(&self) -> String {
        self.inner.get_name().to_string()
    }

    /// The family of the probe.
    pub fn probe_type(&self) -> DebugProbeType {
        self.inner.probe_type()
    }

    /// Attach to the chip described by `target`.
    ///
    /// This selects the protocol and speed given in `config`, enters debug mode
    /// and returns a [`Session`] owning the probe.
    pub fn attach(self, target: Target, config: SessionConfig) -> Result<Session, Error> {
        Session::new(self, target, config)
    }

    /// Enters debug mode without selecting a target.
    pub fn attach_to_unspecified(&mut self) -> Result<(), Error> {
        self.inner.attach()?;
        self.attached = true;
        Ok(())
    }

    /// Returns `true` if the probe is in debug mode.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Selects the transport protocol to be used by the debug probe.
    pub fn select_protocol(&mut self, protocol: WireProtocol) -> Result<(), DebugProbeError> {
        if !self.attached {
            self.inner.select_protocol(protocol)
        } else {
            Err(DebugProbeError::Attached)
        }
    }

    /// The protocol which is currently selected, if any.
    pub fn protocol(&self) -> Option<WireProtocol> {
        self.inner.active_protocol()
    }

    /// Leave debug mode.
    pub fn detach(&mut self) -> Result<(), DebugProbeError> {
        self.attached = false;
        self.inner.detach()
    }

    /// Configure protocol speed to use in kHz.
    pub fn set_speed(&mut self, speed_khz: u32) -> Result<u32, DebugProbeError> {
        if !self.attached {
            self.inner.set_speed(speed_khz)
        } else {
            Err(DebugProbeError::Attached)
        }
    }

    /// Configured protocol speed in kHz.
    pub fn speed_khz(&self) -> u32 {
        self.inner.speed_khz()
    }

    /// Returns `true` if the probe has an interface for cores of the given architecture.
    pub fn supports_architecture(&self, architecture: Architecture) -> bool {
        match architecture {
            Architecture::Arm => self.inner.has_arm_interface(),
            Architecture::Riscv => self.inner.has_riscv_interface(),
            Architecture::Xtensa => self.inner.has_xtensa_interface(),
        }
    }

    /// Determines the capabilities of the probe.
    ///
    /// Only available before attaching. The probe settings are left as they are.
    pub fn features(&mut self) -> Result<FeatureFlags, DebugProbeError> {
        if self.attached {
            return Err(DebugProbeError::Attached);
        }

        let mut features = FeatureFlags::empty();

        for protocol in [WireProtocol::Swd, WireProtocol::Jtag] {
            if self.inner.supports_protocol(protocol) {
                features |= FeatureFlags::protocol(protocol);
            }
        }

        for architecture in [Architecture::Arm, Architecture::Riscv, Architecture::Xtensa] {
            if self.supports_architecture(architecture) {
                features |= FeatureFlags::architecture(architecture);
            }
        }

        if self.inner.has_swo() {
            features |= FeatureFlags::SWO;
        }

        if self.inner.has_speed_config() {
            features |= FeatureFlags::SPEED_CONFIG;
        }

        tracing::debug!("Probe {} supports {:?}", self.inner.get_name(), features);

        Ok(features)
    }

    /// Get the interface of a core of the attached target.
    pub(crate) fn core_interface<'probe>(
        &'probe mut self,
        target: &'probe Target,
        core_index: usize,
    ) -> Result<Box<dyn CoreInterface + 'probe>, DebugProbeError> {
        if !self.attached {
            return Err(DebugProbeError::NotAttached);
        }
        self.inner.try_get_core_interface(target, core_index)
    }
}

/// Gathers some information about a debug probe which was found during a scan.
#[derive(Clone, PartialEq, Eq)]
pub struct DebugProbeInfo {
    /// The name of the debug probe.
    pub identifier: String,
    /// The USB vendor ID of the debug probe.
    pub vendor_id: u16,
    /// The USB product ID of the debug probe.
    pub product_id: u16,
    /// The serial number of the debug probe.
    pub serial_number: Option<String>,
    /// The family of the debug probe.
    pub probe_type: DebugProbeType,
}

impl fmt::Debug for DebugProbeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (VID: {:04x}, PID: {:04x}, {}{})",
            self.identifier,
            self.vendor_id,
            self.product_id,
            self.serial_number
                .as_ref()
                .map_or(String::new(), |v| format!("Serial: {v}, ")),
            self.probe_type
        )
    }
}

impl DebugProbeInfo {
    /// Creates a new info struct that uniquely identifies a probe.
    pub fn new<S: Into<String>>(
        identifier: S,
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
        probe_type: DebugProbeType,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            vendor_id,
            product_id,
            serial_number,
            probe_type,
        }
    }

    /// The driver flags of the probe.
    pub fn driver_flags(&self) -> DriverFlags {
        self.probe_type.driver_flag()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case("cmsis-dap", DebugProbeType::CmsisDap)]
    #[test_case("CMSISDAP", DebugProbeType::CmsisDap)]
    #[test_case("st-link", DebugProbeType::StLink)]
    #[test_case("jlink", DebugProbeType::JLink)]
    #[test_case("wlink", DebugProbeType::WchLink)]
    #[test_case("esp-usb-jtag", DebugProbeType::EspUsbJtag)]
    #[test_case("ch347", DebugProbeType::Ch347UsbJtag)]
    fn parse_probe_type(name: &str, expected: DebugProbeType) {
        assert_eq!(name.parse::<DebugProbeType>(), Ok(expected));
    }

    #[test]
    fn unknown_probe_type() {
        assert!("blackmagic".parse::<DebugProbeType>().is_err());
    }

    #[test]
    fn probe_type_codes() {
        for probe_type in DebugProbeType::ALL {
            assert_eq!(DebugProbeType::from_code(probe_type.code()), Some(probe_type));
            assert_eq!(probe_type.name().parse::<DebugProbeType>(), Ok(probe_type));
        }
        assert_eq!(DebugProbeType::from_code(0), None);
        assert_eq!(DebugProbeType::from_code(10), None);
    }

    #[test]
    fn driver_flag_bits() {
        assert_eq!(DebugProbeType::CmsisDap.driver_flag().bits(), 0x1);
        assert_eq!(DebugProbeType::JLink.driver_flag().bits(), 0x2);
        assert_eq!(DebugProbeType::StLink.driver_flag().bits(), 0x4);
        assert_eq!(DebugProbeType::Ch347UsbJtag.driver_flag().bits(), 0x100);
    }

    #[test]
    fn protocol_codes() {
        assert_eq!(WireProtocol::from_code(0).unwrap(), None);
        assert_eq!(WireProtocol::from_code(1).unwrap(), Some(WireProtocol::Swd));
        assert_eq!(WireProtocol::from_code(2).unwrap(), Some(WireProtocol::Jtag));
        assert!(WireProtocol::from_code(3).is_err());
        assert_eq!(WireProtocol::code(Some(WireProtocol::Jtag)), 2);
    }

    #[test]
    fn feature_query_keeps_probe_settings() {
        let mut probe = Probe::new(
            super::fake_probe::FakeProbe::new()
                .with_protocols(&[WireProtocol::Jtag])
                .with_architectures(&[Architecture::Riscv]),
        );
        probe.set_speed(4000).unwrap();

        let features = probe.features().unwrap();
        assert_eq!(
            features,
            FeatureFlags::JTAG | FeatureFlags::RISCV | FeatureFlags::SPEED_CONFIG
        );

        assert_eq!(probe.speed_khz(), 4000);
        assert_eq!(probe.protocol(), None);
    }

    #[test]
    fn parse_protocol() {
        assert_eq!("SWD".parse::<WireProtocol>(), Ok(WireProtocol::Swd));
        assert_eq!("jtag".parse::<WireProtocol>(), Ok(WireProtocol::Jtag));
        assert!("spi".parse::<WireProtocol>().is_err());
    }
}

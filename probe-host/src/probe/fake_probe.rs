//! A simulated probe attached to a simulated chip, for tests and dry runs.
//!
//! The simulated chip takes its memory map and cores from the [`Target`] it is
//! attached to. Its state lives in a [`SimulatedTarget`] which can be shared with
//! the test driving it, to inspect or tamper with the chip behind the back of the
//! session.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use probe_host_target::{Architecture, MemoryRegion};

use crate::architecture;
use crate::config::Target;
use crate::core::{
    CoreInformation, CoreInterface, CoreRegisters, CoreStatus, HaltReason, RegisterId,
};
use crate::flashing::{FlashAlgorithm, FlashRoutines};
use crate::probe::{
    DebugProbe, DebugProbeError, DebugProbeInfo, DebugProbeSelector, DebugProbeType,
    ProbeCreationError, ProbeFactory, WireProtocol,
};
use crate::CoreType;

const PAGE_SIZE: u64 = 0x1000;

/// Counters of the flash operations a [`SimulatedTarget`] executed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedStats {
    /// Bytes written by the page program routine.
    pub bytes_programmed: u64,
    /// Sectors erased by the sector erase routine.
    pub sectors_erased: u64,
    /// Calls of the mass erase routine.
    pub mass_erases: u64,
}

#[derive(Debug)]
struct SimulatedRegion {
    range: Range<u64>,
    /// The value of memory which was never written.
    initial: u8,
    /// Plain bus writes are rejected, only the flash routines can change the contents.
    flash: bool,
}

#[derive(Debug)]
struct SimulatedCore {
    core_type: CoreType,
    status: CoreStatus,
    polls_since_run: u32,
    registers: HashMap<u16, u64>,
    breakpoint_units: Vec<Option<u64>>,
    breakpoints_enabled: bool,
    reset_catch: bool,
    unresponsive: bool,
}

impl SimulatedCore {
    fn new(core_type: CoreType) -> Self {
        let units = architecture::default_breakpoint_units(core_type) as usize;

        Self {
            core_type,
            status: CoreStatus::Halted(HaltReason::Unknown),
            polls_since_run: 0,
            registers: HashMap::new(),
            breakpoint_units: vec![None; units],
            breakpoints_enabled: false,
            reset_catch: false,
            unresponsive: false,
        }
    }

    fn pc_id(&self) -> Option<u16> {
        architecture::registers(self.core_type)
            .pc()
            .map(|pc| pc.id.0)
    }

    fn pc(&self) -> u64 {
        self.pc_id()
            .and_then(|id| self.registers.get(&id).copied())
            .unwrap_or(0)
    }

    fn set_pc(&mut self, pc: u64) {
        if let Some(id) = self.pc_id() {
            self.registers.insert(id, pc);
        }
    }

    fn poll(&mut self) -> CoreStatus {
        if self.status.is_running() {
            // The first poll after resuming sees the core running.
            if self.polls_since_run > 0 && self.breakpoints_enabled {
                if let Some(address) = self.breakpoint_units.iter().flatten().next().copied() {
                    self.set_pc(address);
                    self.status = CoreStatus::Halted(HaltReason::Breakpoint);
                }
            }
            self.polls_since_run += 1;
        }

        self.status
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    chip: Option<String>,
    regions: Vec<SimulatedRegion>,
    memory: BTreeMap<u64, Vec<u8>>,
    cores: Vec<SimulatedCore>,
    stats: SimulatedStats,
    disconnected: bool,
}

impl SimulatedState {
    fn configure(&mut self, target: &Target) {
        tracing::debug!("Simulating {}", target.name);

        self.chip = Some(target.name.clone());
        self.memory.clear();
        self.stats = SimulatedStats::default();
        self.cores = target
            .cores
            .iter()
            .map(|core| SimulatedCore::new(core.core_type))
            .collect();
        self.regions = target
            .memory_map
            .iter()
            .filter(|region| !matches!(region, MemoryRegion::Nvm(nvm) if nvm.is_alias))
            .map(|region| {
                let erased = target
                    .flash_algorithms
                    .iter()
                    .find(|algorithm| {
                        algorithm
                            .flash_properties
                            .address_range
                            .contains(&region.address_range().start)
                    })
                    .map(|algorithm| algorithm.flash_properties.erased_byte_value);

                SimulatedRegion {
                    range: region.address_range(),
                    initial: if region.is_nvm() { erased.unwrap_or(0xff) } else { 0 },
                    flash: region.is_nvm(),
                }
            })
            .collect();
    }

    fn check_link(&self) -> Result<(), DebugProbeError> {
        if self.disconnected {
            Err(DebugProbeError::Usb(None))
        } else {
            Ok(())
        }
    }

    fn region(&self, address: u64) -> Result<&SimulatedRegion, DebugProbeError> {
        self.regions
            .iter()
            .find(|region| region.range.contains(&address))
            .ok_or(DebugProbeError::TargetAccess { address })
    }

    fn load(&self, address: u64) -> Result<u8, DebugProbeError> {
        let region = self.region(address)?;
        let page = address - address % PAGE_SIZE;

        Ok(self
            .memory
            .get(&page)
            .map_or(region.initial, |data| data[(address - page) as usize]))
    }

    fn store(&mut self, address: u64, value: u8) -> Result<(), DebugProbeError> {
        let initial = self.region(address)?.initial;
        let page = address - address % PAGE_SIZE;

        self.memory
            .entry(page)
            .or_insert_with(|| vec![initial; PAGE_SIZE as usize])[(address - page) as usize] =
            value;

        Ok(())
    }

    fn read(&self, address: u64, data: &mut [u8]) -> Result<(), DebugProbeError> {
        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = self.load(address + offset as u64)?;
        }
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), DebugProbeError> {
        for (offset, byte) in data.iter().enumerate() {
            let address = address + offset as u64;
            if self.region(address)?.flash {
                return Err(DebugProbeError::TargetAccess { address });
            }
            self.store(address, *byte)?;
        }
        Ok(())
    }

    fn erase(&mut self, range: Range<u64>, value: u8) -> Result<(), DebugProbeError> {
        let mut address = range.start;

        while address < range.end {
            let page = address - address % PAGE_SIZE;

            let whole_page = page == address && address + PAGE_SIZE <= range.end;
            if whole_page && self.region(address)?.initial == value {
                self.memory.remove(&page);
                address += PAGE_SIZE;
            } else {
                self.store(address, value)?;
                address += 1;
            }
        }

        Ok(())
    }

    fn core(&mut self, index: usize) -> Result<&mut SimulatedCore, DebugProbeError> {
        self.check_link()?;
        self.cores
            .get_mut(index)
            .ok_or(DebugProbeError::InterfaceNotAvailable("core"))
    }
}

/// The shared state of a simulated chip.
///
/// Clones refer to the same chip.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTarget {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedTarget {
    /// A chip which is set up from the target of the first session attaching to it.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chip simulating `target` right away, so its memory can be prepared before attaching.
    pub fn for_target(target: &Target) -> Self {
        let simulated = Self::default();
        simulated.state.lock().configure(target);
        simulated
    }

    fn attach(&self, target: &Target) {
        let mut state = self.state.lock();
        if state.chip.as_deref() != Some(target.name.as_str()) {
            state.configure(target);
        }
    }

    /// Reads memory without going through a probe. Flash can be read as well.
    pub fn peek(&self, address: u64, data: &mut [u8]) -> Result<(), DebugProbeError> {
        self.state.lock().read(address, data)
    }

    /// Writes memory without going through a probe. Flash can be written as well.
    pub fn poke(&self, address: u64, data: &[u8]) -> Result<(), DebugProbeError> {
        let mut state = self.state.lock();
        for (offset, byte) in data.iter().enumerate() {
            state.store(address + offset as u64, *byte)?;
        }
        Ok(())
    }

    /// The flash operations executed so far.
    pub fn stats(&self) -> SimulatedStats {
        self.state.lock().stats
    }

    /// Cuts the link to the chip, every following access fails.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// Restores the link to the chip.
    pub fn reconnect(&self) {
        self.state.lock().disconnected = false;
    }

    /// Makes a core ignore halt requests.
    pub fn set_unresponsive(&self, core_index: usize, unresponsive: bool) {
        if let Some(core) = self.state.lock().cores.get_mut(core_index) {
            core.unresponsive = unresponsive;
        }
    }

    /// Changes the number of breakpoint comparators of a core.
    pub fn set_breakpoint_units(&self, core_index: usize, units: usize) {
        if let Some(core) = self.state.lock().cores.get_mut(core_index) {
            core.breakpoint_units.resize(units, None);
        }
    }

    /// The actual status of a core, without polling it through a session.
    pub fn core_status(&self, core_index: usize) -> Option<CoreStatus> {
        self.state
            .lock()
            .cores
            .get(core_index)
            .map(|core| core.status)
    }

    /// The addresses the comparators of a core are armed with.
    pub fn armed_breakpoints(&self, core_index: usize) -> Vec<u64> {
        self.state
            .lock()
            .cores
            .get(core_index)
            .map(|core| core.breakpoint_units.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

/// The interface to one core of a [`SimulatedTarget`].
#[derive(Debug)]
struct SimulatedCoreInterface {
    target: SimulatedTarget,
    index: usize,
    core_type: CoreType,
}

impl SimulatedCoreInterface {
    fn with_core<T>(
        &self,
        f: impl FnOnce(&mut SimulatedCore) -> T,
    ) -> Result<T, DebugProbeError> {
        let mut state = self.target.state.lock();
        state.core(self.index).map(f)
    }

    fn with_memory<T>(
        &self,
        f: impl FnOnce(&mut SimulatedState) -> Result<T, DebugProbeError>,
    ) -> Result<T, DebugProbeError> {
        let mut state = self.target.state.lock();
        state.check_link()?;
        f(&mut state)
    }
}

impl CoreInterface for SimulatedCoreInterface {
    fn core_type(&self) -> CoreType {
        self.core_type
    }

    fn status(&mut self) -> Result<CoreStatus, DebugProbeError> {
        self.with_core(SimulatedCore::poll)
    }

    fn halt(&mut self) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            if !core.unresponsive && !core.status.is_halted() {
                core.status = CoreStatus::Halted(HaltReason::Request);
            }
        })
    }

    fn run(&mut self) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            core.status = CoreStatus::Running;
            core.polls_since_run = 0;
        })
    }

    fn step(&mut self) -> Result<CoreInformation, DebugProbeError> {
        self.with_core(|core| {
            let width = core.core_type.instruction_set().get_minimum_instruction_size();
            let pc = core.pc() + width as u64;
            core.set_pc(pc);
            core.status = CoreStatus::Halted(HaltReason::Step);
            CoreInformation { pc }
        })
    }

    fn reset(&mut self) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            core.registers.clear();
            core.status = if core.reset_catch {
                CoreStatus::Halted(HaltReason::Reset)
            } else {
                core.polls_since_run = 0;
                CoreStatus::Running
            };
        })
    }

    fn reset_catch_set(&mut self) -> Result<(), DebugProbeError> {
        self.with_core(|core| core.reset_catch = true)
    }

    fn reset_catch_clear(&mut self) -> Result<(), DebugProbeError> {
        self.with_core(|core| core.reset_catch = false)
    }

    fn registers(&self) -> &'static CoreRegisters {
        architecture::registers(self.core_type)
    }

    fn read_core_reg(&mut self, id: RegisterId) -> Result<u64, DebugProbeError> {
        self.with_core(|core| core.registers.get(&id.0).copied().unwrap_or(0))
    }

    fn write_core_reg(&mut self, id: RegisterId, value: u64) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            core.registers.insert(id.0, value);
        })
    }

    fn read_8(&mut self, address: u64, data: &mut [u8]) -> Result<(), DebugProbeError> {
        self.with_memory(|state| state.read(address, data))
    }

    fn write_8(&mut self, address: u64, data: &[u8]) -> Result<(), DebugProbeError> {
        self.with_memory(|state| state.write(address, data))
    }

    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), DebugProbeError> {
        let mut bytes = vec![0; data.len() * 4];
        self.read_8(address, &mut bytes)?;

        for (word, bytes) in data.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Ok(())
    }

    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), DebugProbeError> {
        let bytes: Vec<u8> = data.iter().flat_map(|word| word.to_le_bytes()).collect();
        self.write_8(address, &bytes)
    }

    fn available_breakpoint_units(&mut self) -> Result<u32, DebugProbeError> {
        self.with_core(|core| core.breakpoint_units.len() as u32)
    }

    fn hw_breakpoints_enabled(&self) -> bool {
        self.with_core(|core| core.breakpoints_enabled)
            .unwrap_or(false)
    }

    fn enable_breakpoints(&mut self, state: bool) -> Result<(), DebugProbeError> {
        self.with_core(|core| core.breakpoints_enabled = state)
    }

    fn set_hw_breakpoint(&mut self, unit_index: usize, address: u64) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            core.breakpoint_units
                .get_mut(unit_index)
                .map(|unit| *unit = Some(address))
                .ok_or(DebugProbeError::CommandNotSupportedByProbe)
        })?
    }

    fn clear_hw_breakpoint(&mut self, unit_index: usize) -> Result<(), DebugProbeError> {
        self.with_core(|core| {
            if let Some(unit) = core.breakpoint_units.get_mut(unit_index) {
                *unit = None;
            }
        })
    }

    fn flash_routines(&mut self) -> Option<&mut dyn FlashRoutines> {
        Some(self)
    }
}

impl FlashRoutines for SimulatedCoreInterface {
    fn erase_sector(
        &mut self,
        algorithm: &FlashAlgorithm,
        address: u64,
    ) -> Result<(), DebugProbeError> {
        let sector = algorithm
            .sector_info(address)
            .ok_or(DebugProbeError::TargetAccess { address })?;

        self.with_memory(|state| {
            state.erase(sector.address_range(), algorithm.erased_byte_value())?;
            state.stats.sectors_erased += 1;
            Ok(())
        })
    }

    fn erase_all(&mut self, algorithm: &FlashAlgorithm) -> Result<(), DebugProbeError> {
        if !algorithm.erase_all_supported {
            return Err(DebugProbeError::NotImplemented("erase_all"));
        }

        self.with_memory(|state| {
            state.erase(
                algorithm.flash_properties.address_range.clone(),
                algorithm.erased_byte_value(),
            )?;
            state.stats.mass_erases += 1;
            Ok(())
        })
    }

    fn program_page(
        &mut self,
        _algorithm: &FlashAlgorithm,
        address: u64,
        data: &[u8],
    ) -> Result<(), DebugProbeError> {
        self.with_memory(|state| {
            for (offset, byte) in data.iter().enumerate() {
                let address = address + offset as u64;
                // Programming can only clear bits.
                let value = state.load(address)? & byte;
                state.store(address, value)?;
            }
            state.stats.bytes_programmed += data.len() as u64;
            Ok(())
        })
    }
}

/// A probe which is connected to a [`SimulatedTarget`].
#[derive(Debug, Clone)]
pub struct FakeProbe {
    name: String,
    probe_type: DebugProbeType,
    vendor_id: u16,
    product_id: u16,
    serial_number: Option<String>,
    protocols: Vec<WireProtocol>,
    architectures: Vec<Architecture>,
    protocol: Option<WireProtocol>,
    speed_khz: u32,
    target: SimulatedTarget,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProbe {
    /// A CMSIS-DAP probe which speaks SWD and JTAG to cores of every architecture.
    pub fn new() -> Self {
        Self {
            name: "Simulated probe".to_string(),
            probe_type: DebugProbeType::CmsisDap,
            vendor_id: 0x0d28,
            product_id: 0x0204,
            serial_number: Some("SIM0001".to_string()),
            protocols: vec![WireProtocol::Swd, WireProtocol::Jtag],
            architectures: vec![Architecture::Arm, Architecture::Riscv, Architecture::Xtensa],
            protocol: None,
            speed_khz: 1000,
            target: SimulatedTarget::new(),
        }
    }

    /// Changes the family the probe reports.
    pub fn with_probe_type(mut self, probe_type: DebugProbeType) -> Self {
        self.probe_type = probe_type;
        self
    }

    /// Changes the USB identity of the probe.
    pub fn with_identity(mut self, vendor_id: u16, product_id: u16, serial_number: &str) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self.serial_number = (!serial_number.is_empty()).then(|| serial_number.to_string());
        self
    }

    /// Connects the probe to the given chip.
    pub fn with_target(mut self, target: SimulatedTarget) -> Self {
        self.target = target;
        self
    }

    /// Restricts the wire protocols the probe speaks.
    pub fn with_protocols(mut self, protocols: &[WireProtocol]) -> Self {
        self.protocols = protocols.to_vec();
        self
    }

    /// Restricts the architectures the probe can debug.
    pub fn with_architectures(mut self, architectures: &[Architecture]) -> Self {
        self.architectures = architectures.to_vec();
        self
    }

    /// The chip the probe is connected to.
    pub fn target(&self) -> &SimulatedTarget {
        &self.target
    }

    fn info(&self) -> DebugProbeInfo {
        DebugProbeInfo::new(
            self.name.clone(),
            self.vendor_id,
            self.product_id,
            self.serial_number.clone(),
            self.probe_type,
        )
    }
}

impl DebugProbe for FakeProbe {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn probe_type(&self) -> DebugProbeType {
        self.probe_type
    }

    fn speed_khz(&self) -> u32 {
        self.speed_khz
    }

    fn set_speed(&mut self, speed_khz: u32) -> Result<u32, DebugProbeError> {
        if speed_khz == 0 {
            return Err(DebugProbeError::UnsupportedSpeed(speed_khz));
        }
        self.speed_khz = speed_khz;
        Ok(speed_khz)
    }

    fn attach(&mut self) -> Result<(), DebugProbeError> {
        self.target.state.lock().check_link()?;

        if self.protocol.is_none() {
            return Err(DebugProbeError::NotAttached);
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<(), DebugProbeError> {
        Ok(())
    }

    fn supports_protocol(&self, protocol: WireProtocol) -> bool {
        self.protocols.contains(&protocol)
    }

    fn select_protocol(&mut self, protocol: WireProtocol) -> Result<(), DebugProbeError> {
        if !self.supports_protocol(protocol) {
            return Err(DebugProbeError::UnsupportedProtocol(protocol));
        }
        self.protocol = Some(protocol);
        Ok(())
    }

    fn active_protocol(&self) -> Option<WireProtocol> {
        self.protocol
    }

    fn has_arm_interface(&self) -> bool {
        self.architectures.contains(&Architecture::Arm)
    }

    fn has_riscv_interface(&self) -> bool {
        self.architectures.contains(&Architecture::Riscv)
    }

    fn has_xtensa_interface(&self) -> bool {
        self.architectures.contains(&Architecture::Xtensa)
    }

    fn has_speed_config(&self) -> bool {
        true
    }

    fn try_get_core_interface<'probe>(
        &'probe mut self,
        target: &'probe Target,
        core_index: usize,
    ) -> Result<Box<dyn CoreInterface + 'probe>, DebugProbeError> {
        let core_type = target
            .core_type(core_index)
            .ok_or(DebugProbeError::InterfaceNotAvailable("core"))?;

        self.target.attach(target);

        Ok(Box::new(SimulatedCoreInterface {
            target: self.target.clone(),
            index: core_index,
            core_type,
        }))
    }
}

/// A driver which finds a fixed set of [`FakeProbe`]s.
#[derive(Debug, Clone, Default)]
pub struct FakeProbeFactory {
    probes: Vec<FakeProbe>,
}

impl FakeProbeFactory {
    /// A driver which lists the given probes.
    pub fn new(probes: Vec<FakeProbe>) -> Self {
        Self { probes }
    }
}

impl ProbeFactory for FakeProbeFactory {
    fn open(&self, selector: &DebugProbeSelector) -> Result<Box<dyn DebugProbe>, DebugProbeError> {
        self.probes
            .iter()
            .find(|probe| selector.matches_probe(&probe.info()))
            .map(|probe| Box::new(probe.clone()) as Box<dyn DebugProbe>)
            .ok_or(DebugProbeError::ProbeCouldNotBeCreated(
                ProbeCreationError::NotFound,
            ))
    }

    fn list_probes(&self) -> Vec<DebugProbeInfo> {
        self.probes.iter().map(FakeProbe::info).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::get_target_by_name;

    fn stm32f407() -> (Target, SimulatedTarget) {
        let target = get_target_by_name("stm32f407vgtx").unwrap();
        let simulated = SimulatedTarget::for_target(&target);
        (target, simulated)
    }

    #[test]
    fn unwritten_memory() {
        let (_, simulated) = stm32f407();
        let mut data = [0x55; 2];

        simulated.peek(0x0800_0000, &mut data).unwrap();
        assert_eq!(data, [0xff; 2]);

        simulated.peek(0x2000_0000, &mut data).unwrap();
        assert_eq!(data, [0; 2]);

        assert!(matches!(
            simulated.peek(0x0000_0000, &mut data),
            Err(DebugProbeError::TargetAccess { address: 0 })
        ));
    }

    #[test]
    fn bus_writes_to_flash_fault() {
        let (target, simulated) = stm32f407();
        let mut probe = FakeProbe::new().with_target(simulated);
        let mut core = probe.try_get_core_interface(&target, 0).unwrap();

        assert!(core.write_8(0x2000_0000, &[1, 2]).is_ok());
        assert!(matches!(
            core.write_8(0x0800_0000, &[1]),
            Err(DebugProbeError::TargetAccess {
                address: 0x0800_0000
            })
        ));
    }

    #[test]
    fn programming_only_clears_bits() {
        let (target, simulated) = stm32f407();
        let algorithm = FlashAlgorithm::assemble(&target.flash_algorithms[0]);
        let mut probe = FakeProbe::new().with_target(simulated.clone());
        let mut core = probe.try_get_core_interface(&target, 0).unwrap();
        let routines = core.flash_routines().unwrap();

        routines
            .program_page(&algorithm, 0x0800_0000, &[0xf0, 0x0f])
            .unwrap();
        routines
            .program_page(&algorithm, 0x0800_0000, &[0x3c, 0xff])
            .unwrap();

        let mut data = [0; 2];
        simulated.peek(0x0800_0000, &mut data).unwrap();
        assert_eq!(data, [0x30, 0x0f]);

        routines.erase_sector(&algorithm, 0x0800_0001).unwrap();
        simulated.peek(0x0800_0000, &mut data).unwrap();
        assert_eq!(data, [0xff, 0xff]);

        assert_eq!(
            simulated.stats(),
            SimulatedStats {
                bytes_programmed: 4,
                sectors_erased: 1,
                mass_erases: 0
            }
        );
    }

    #[test]
    fn running_core_stops_at_breakpoint() {
        let (target, simulated) = stm32f407();
        let mut probe = FakeProbe::new().with_target(simulated);
        let mut core = probe.try_get_core_interface(&target, 0).unwrap();

        core.enable_breakpoints(true).unwrap();
        core.set_hw_breakpoint(0, 0x0800_0100).unwrap();
        core.run().unwrap();

        assert_eq!(core.status().unwrap(), CoreStatus::Running);
        assert_eq!(
            core.status().unwrap(),
            CoreStatus::Halted(HaltReason::Breakpoint)
        );
        let pc = core.registers().pc().unwrap().id;
        assert_eq!(core.read_core_reg(pc).unwrap(), 0x0800_0100);
    }

    #[test]
    fn disconnected_target() {
        let (target, simulated) = stm32f407();
        let mut probe = FakeProbe::new().with_target(simulated.clone());
        let mut core = probe.try_get_core_interface(&target, 0).unwrap();

        simulated.disconnect();
        assert!(core.status().unwrap_err().is_link_lost());
        assert!(core.read_8(0x2000_0000, &mut [0]).is_err());

        simulated.reconnect();
        assert!(core.status().is_ok());
    }

    #[test]
    fn factory_opens_matching_probe() {
        let factory = FakeProbeFactory::new(vec![
            FakeProbe::new(),
            FakeProbe::new()
                .with_probe_type(DebugProbeType::StLink)
                .with_identity(0x0483, 0x374b, "STLINK01"),
        ]);

        let selector = "0483:374b".parse().unwrap();
        let probe = factory.open(&selector).unwrap();
        assert_eq!(probe.probe_type(), DebugProbeType::StLink);

        let selector = "1234:5678".parse().unwrap();
        assert!(matches!(
            factory.open(&selector),
            Err(DebugProbeError::ProbeCouldNotBeCreated(
                ProbeCreationError::NotFound
            ))
        ));
    }
}

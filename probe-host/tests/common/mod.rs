#![allow(dead_code)]

use probe_host::config::get_target_by_name;
use probe_host::host::Host;
use probe_host::probe::fake_probe::{FakeProbe, FakeProbeFactory, SimulatedTarget};
use probe_host::probe::list::AllProbesLister;
use probe_host::Lister;

pub const CHIP: &str = "stm32f407vgtx";
pub const FLASH_START: u64 = 0x0800_0000;
pub const RAM_START: u64 = 0x2000_0000;

/// A host which sees the given probes and nothing else.
pub fn host_with(probes: Vec<FakeProbe>) -> Host {
    let lister = AllProbesLister::new().with_driver(FakeProbeFactory::new(probes));
    Host::with_lister(Lister::with_lister(Box::new(lister)))
}

/// A host with a single probe connected to a simulation of `chip`.
pub fn simulated_host(chip: &str) -> (Host, SimulatedTarget) {
    let target = get_target_by_name(chip).unwrap();
    let simulated = SimulatedTarget::for_target(&target);
    let host = host_with(vec![FakeProbe::new().with_target(simulated.clone())]);

    (host, simulated)
}

/// A host with a single probe connected to a simulated STM32F407.
pub fn stm32f407_host() -> (Host, SimulatedTarget) {
    simulated_host(CHIP)
}

pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use probe_host::host::{IntoStatus, SessionHandle};
use probe_host::probe::fake_probe::FakeProbe;
use probe_host::{CoreStatus, DebugProbeType, ErrorKind, HaltReason, SessionConfig, WireProtocol};
use test_case::test_case;

use common::{host_with, simulated_host, stm32f407_host, CHIP, FLASH_START, RAM_START};

const TIMEOUT: Duration = Duration::from_millis(100);

#[test]
fn lists_probes() {
    let host = host_with(vec![
        FakeProbe::new(),
        FakeProbe::new()
            .with_probe_type(DebugProbeType::StLink)
            .with_identity(0x0483, 0x374b, "")
            .with_protocols(&[WireProtocol::Swd]),
    ]);

    assert_eq!(host.probe_count(), 2);

    let info = host.probe_info(1).unwrap();
    assert_eq!(info.probe_type, DebugProbeType::StLink);
    assert_eq!((info.vendor_id, info.product_id), (0x0483, 0x374b));
    assert_eq!(host.probe_serial_into(1, None).unwrap(), 1);

    let mut serial = [0; 8];
    host.probe_serial_into(0, Some(&mut serial)).unwrap();
    assert_eq!(&serial, b"SIM0001\0");

    let (drivers, features) = host.probe_features(1).unwrap();
    assert_eq!(drivers, DebugProbeType::StLink.driver_flag());
    assert!(features.contains(probe_host::FeatureFlags::SWD));
    assert!(!features.contains(probe_host::FeatureFlags::JTAG));

    let error = host.probe_info(2).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(host.last_error(), "Probe 2 does not exist");
}

#[test]
fn checks_for_a_target() {
    let (host, simulated) = stm32f407_host();

    assert!(host.probe_check_target(0).unwrap());

    simulated.disconnect();
    assert!(!host.probe_check_target(0).unwrap());
    assert!(!host.last_error().is_empty());
}

#[test]
fn unknown_chip_opens_nothing() {
    let (host, _) = stm32f407_host();

    let error = host
        .open_auto("not_a_chip", SessionConfig::default())
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::UnknownChip);
    assert_eq!(Err::<(), _>(error).into_status(), -4);
    assert_eq!(host.session_count(), 0);
}

#[test]
fn stale_handles_are_rejected() {
    let (host, _) = stm32f407_host();

    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();
    assert_eq!(host.core_count(session).unwrap(), 1);
    host.close(session).unwrap();

    assert_eq!(
        host.core_count(session).unwrap_err().kind(),
        ErrorKind::InvalidSession
    );
    assert_eq!(host.close(session).unwrap_err().kind(), ErrorKind::InvalidSession);

    // The slot is reused with a new generation.
    let reopened = host.open_auto(CHIP, SessionConfig::default()).unwrap();
    assert_ne!(reopened, session);
    assert_eq!(
        host.core_count(session).unwrap_err().kind(),
        ErrorKind::InvalidSession
    );

    assert_eq!(
        SessionHandle::try_from(0).unwrap_err().kind(),
        ErrorKind::InvalidSession
    );
}

#[test]
fn protocol_selection() {
    let jtag_only = FakeProbe::new().with_protocols(&[WireProtocol::Jtag]);
    let host = host_with(vec![jtag_only]);

    let error = host
        .open_auto(CHIP, SessionConfig::new(0, Some(WireProtocol::Swd)))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedProtocol);

    host.open_auto(CHIP, SessionConfig::default()).unwrap();
}

#[test]
fn programmer_type_filter() {
    let host = host_with(vec![FakeProbe::new().with_probe_type(DebugProbeType::JLink)]);

    host.set_programmer_type(DebugProbeType::StLink.code()).unwrap();
    assert_eq!(
        host.open_auto(CHIP, SessionConfig::default())
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        host.open_with_probe("0d28:0204", CHIP, SessionConfig::default())
            .unwrap_err()
            .kind(),
        ErrorKind::Unsupported
    );

    host.clear_programmer_type();
    host.open_with_probe("0d28:0204:SIM0001", CHIP, SessionConfig::default())
        .unwrap();

    assert_eq!(
        host.open_with_probe("not a selector", CHIP, SessionConfig::default())
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn core_state_machine() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    host.run(session, 0).unwrap();
    assert_eq!(host.core_status(session, 0).unwrap(), CoreStatus::Running);
    assert_eq!(
        host.run(session, 0).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        host.step(session, 0).unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    let halted = host.halt(session, 0, TIMEOUT).unwrap();
    assert_eq!(
        host.core_status(session, 0).unwrap(),
        CoreStatus::Halted(HaltReason::Request)
    );

    // Halting a halted core does nothing.
    assert_eq!(host.halt(session, 0, TIMEOUT).unwrap(), halted);

    let stepped = host.step(session, 0).unwrap();
    assert_eq!(stepped.pc, halted.pc + 2);
    assert_eq!(host.core_status(session, 0).into_status(), 1);

    host.reset(session, 0).unwrap();
    assert_eq!(simulated.core_status(0), Some(CoreStatus::Running));

    let info = host.reset_and_halt(session, 0, TIMEOUT).unwrap();
    assert_eq!(info.pc, 0);
    assert_eq!(
        host.core_status(session, 0).unwrap(),
        CoreStatus::Halted(HaltReason::Reset)
    );

    assert_eq!(
        host.halt(session, 1, TIMEOUT).unwrap_err().kind(),
        ErrorKind::InvalidCore
    );
}

#[test]
fn halt_times_out() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    host.run(session, 0).unwrap();
    simulated.set_unresponsive(0, true);

    assert_eq!(
        host.halt(session, 0, Duration::from_millis(10))
            .unwrap_err()
            .kind(),
        ErrorKind::Timeout
    );
}

#[test_case(RAM_START, 1)]
#[test_case(RAM_START + 1, 4)]
#[test_case(RAM_START + 3, 256)]
fn memory_round_trip(address: u64, len: usize) {
    let (host, _) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    let data = common::image(len);
    host.write_8(session, 0, address, &data).unwrap();

    let mut read = vec![0; len];
    host.read_8(session, 0, address, &mut read).unwrap();
    assert_eq!(read, data);
}

#[test]
fn word_access() {
    let (host, _) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    host.write_32(session, 0, RAM_START + 8, &[0xdead_beef, 0x0102_0304])
        .unwrap();

    let mut words = [0; 2];
    host.read_32(session, 0, RAM_START + 8, &mut words).unwrap();
    assert_eq!(words, [0xdead_beef, 0x0102_0304]);

    let mut bytes = [0; 4];
    host.read_8(session, 0, RAM_START + 12, &mut bytes).unwrap();
    assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01]);

    assert_eq!(
        host.read_32(session, 0, RAM_START + 2, &mut words)
            .unwrap_err()
            .kind(),
        ErrorKind::AccessFault
    );
    // Empty transfers always succeed.
    host.read_32(session, 0, RAM_START + 2, &mut []).unwrap();
}

#[test]
fn memory_faults() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    assert_eq!(
        host.write_8(session, 0, FLASH_START, &[0]).unwrap_err().kind(),
        ErrorKind::AccessFault
    );

    simulated.disconnect();
    assert_eq!(
        host.read_8(session, 0, RAM_START, &mut [0]).unwrap_err().kind(),
        ErrorKind::TransportError
    );
}

#[test_case(CHIP; "arm")]
#[test_case("esp32c3"; "riscv")]
#[test_case("esp32s3"; "xtensa")]
fn every_register_round_trips(chip: &str) {
    let (host, _) = simulated_host(chip);
    let session = host.open_auto(chip, SessionConfig::default()).unwrap();
    host.halt(session, 0, TIMEOUT).unwrap();

    let count = host.register_count(session, 0).unwrap();
    assert!(count > 16);

    let mut written = 0;
    for index in 0..count {
        let info = host.register_info(session, 0, index).unwrap();
        let mask = if info.bit_width >= 64 {
            u64::MAX
        } else {
            (1 << info.bit_width) - 1
        };
        let value = 0xa5a5_5a5a_0f0f_f0f0 ^ u64::from(info.id);

        match host.write_register(session, 0, info.id, value) {
            Ok(()) => {
                assert_eq!(
                    host.read_register(session, 0, info.id).unwrap(),
                    value & mask,
                    "{}",
                    info.name
                );
                written += 1;
            }
            Err(error) => assert_eq!(error.kind(), ErrorKind::Unsupported, "{}", info.name),
        }
    }
    assert!(written > 16);
}

#[test]
fn registers() {
    let (host, _) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();
    host.halt(session, 0, TIMEOUT).unwrap();

    let count = host.register_count(session, 0).unwrap();

    let r0 = host.register_info(session, 0, 0).unwrap();
    assert_eq!((r0.name, r0.bit_width), ("R0", 32));

    host.write_register(session, 0, r0.id, 0x1_2345_6789).unwrap();
    assert_eq!(host.read_register(session, 0, r0.id).unwrap(), 0x2345_6789);

    let needed = host.register_name_into(session, 0, 0, None).unwrap();
    assert_eq!(needed, 3);

    assert_eq!(
        host.register_info(session, 0, count).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        host.read_register(session, 0, 0x7fff).unwrap_err().kind(),
        ErrorKind::UnknownRegister
    );
}

#[test]
fn read_only_registers() {
    let (host, _) = simulated_host("esp32c3");
    let session = host.open_auto("esp32c3", SessionConfig::default()).unwrap();
    host.halt(session, 0, TIMEOUT).unwrap();

    let count = host.register_count(session, 0).unwrap();
    let read_only: Vec<_> = (0..count)
        .map(|index| host.register_info(session, 0, index).unwrap())
        .filter(|info| ["x0", "mhartid"].contains(&info.name))
        .collect();
    assert_eq!(read_only.len(), 2);

    for info in read_only {
        let before = host.read_register(session, 0, info.id).unwrap();

        let result = host.write_register(session, 0, info.id, 0x1234);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unsupported);
        assert!(host.last_error().contains(info.name));
        assert_eq!(host.write_register(session, 0, info.id, 0).into_status(), -10);

        assert_eq!(host.read_register(session, 0, info.id).unwrap(), before);
    }
}

#[test]
fn breakpoints() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    let units = host.available_breakpoint_units(session, 0).unwrap();
    assert_eq!(units, 6);

    host.set_breakpoint(session, 0, 0x0800_0100).unwrap();
    host.set_breakpoint(session, 0, 0x0800_0100).unwrap();
    assert_eq!(simulated.armed_breakpoints(0), vec![0x0800_0100]);

    host.clear_breakpoint(session, 0, 0x0800_0200).unwrap();

    for i in 1..units {
        host.set_breakpoint(session, 0, 0x0800_0100 + u64::from(i) * 4)
            .unwrap();
    }
    assert_eq!(
        host.set_breakpoint(session, 0, 0x0800_0400).unwrap_err().kind(),
        ErrorKind::OutOfUnits
    );

    host.clear_all_breakpoints(session).unwrap();
    assert!(simulated.armed_breakpoints(0).is_empty());
}

#[test]
fn running_into_a_breakpoint() {
    let (host, _) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    host.set_breakpoint(session, 0, 0x0800_0100).unwrap();
    host.run(session, 0).unwrap();

    assert_eq!(
        host.core_status(session, 0).unwrap(),
        CoreStatus::Halted(HaltReason::Breakpoint)
    );
}

#[test]
fn closing_clears_breakpoints() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    host.set_breakpoint(session, 0, 0x0800_0100).unwrap();
    host.close(session).unwrap();

    assert!(simulated.armed_breakpoints(0).is_empty());
}

#[test]
fn dual_core_chip() {
    let (host, simulated) = simulated_host("rp2040");
    let session = host.open_auto("rp2040", SessionConfig::default()).unwrap();

    assert_eq!(host.core_count(session).unwrap(), 2);

    for core in 0..2 {
        let units = host.available_breakpoint_units(session, core).unwrap();
        assert!(units > 0);
        host.set_breakpoint(session, core, 0x1000_0100 + core as u64 * 0x10)
            .unwrap();
    }
    assert_eq!(simulated.armed_breakpoints(0), vec![0x1000_0100]);
    assert_eq!(simulated.armed_breakpoints(1), vec![0x1000_0110]);

    host.clear_all_breakpoints(session).unwrap();
    assert!(simulated.armed_breakpoints(0).is_empty());
    assert!(simulated.armed_breakpoints(1).is_empty());

    // Each core is controlled on its own.
    host.run(session, 1).unwrap();
    assert_eq!(host.core_status(session, 1).unwrap(), CoreStatus::Running);
    assert_ne!(host.core_status(session, 0).unwrap(), CoreStatus::Running);

    assert_eq!(
        host.halt(session, 2, TIMEOUT).unwrap_err().kind(),
        ErrorKind::InvalidCore
    );
    assert_eq!(
        host.set_breakpoint(session, 2, 0x1000_0100).unwrap_err().kind(),
        ErrorKind::InvalidCore
    );
}

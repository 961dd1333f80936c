mod common;

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use probe_host::config::get_target_by_name;
use probe_host::flashing::{
    download_file_with_options, BinOptions, DownloadOptions, FlashProgress, Format,
    ProgressEvent, ProgressOperation,
};
use probe_host::host::{FlashFlags, IntoStatus, ProgressReport};
use probe_host::probe::fake_probe::{FakeProbe, SimulatedTarget};
use probe_host::{ErrorKind, Probe, Session, SessionConfig};
use tempfile::NamedTempFile;
use test_case::test_case;

use common::{image, init_logging, stm32f407_host, CHIP, FLASH_START, RAM_START};

fn bin_file(data: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
    file.write_all(data).unwrap();
    file
}

fn hex_file(address: u64, data: &[u8]) -> NamedTempFile {
    let mut records = vec![ihex::Record::ExtendedLinearAddress((address >> 16) as u16)];
    for (index, chunk) in data.chunks(16).enumerate() {
        records.push(ihex::Record::Data {
            offset: (address as u16).wrapping_add((index * 16) as u16),
            value: chunk.to_vec(),
        });
    }
    records.push(ihex::Record::EndOfFile);

    let mut file = tempfile::Builder::new().suffix(".hex").tempfile().unwrap();
    file.write_all(ihex::create_object_file_representation(&records).unwrap().as_bytes())
        .unwrap();
    file
}

fn peek(simulated: &SimulatedTarget, address: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    simulated.peek(address, &mut data).unwrap();
    data
}

fn flash_start() -> BinOptions {
    BinOptions {
        base_address: Some(FLASH_START),
        skip: 0,
    }
}

/// A session opened without a host, to watch the raw progress events.
fn stm32f407_session() -> (Session, SimulatedTarget) {
    let target = get_target_by_name(CHIP).unwrap();
    let simulated = SimulatedTarget::for_target(&target);

    let probe = FakeProbe::new().with_target(simulated.clone());
    let session = Probe::new(probe)
        .attach(target, SessionConfig::default())
        .unwrap();

    (session, simulated)
}

#[test]
fn chip_erase_and_program() {
    init_logging();
    let (host, simulated) = stm32f407_host();

    // Left over from an earlier image, in a sector the new image does not touch.
    simulated.poke(FLASH_START + 0x8000, &[0x12, 0x34]).unwrap();

    let data = image(4096);
    let file = bin_file(&data);
    let flags = FlashFlags {
        verify: true,
        chip_erase: true,
        ..FlashFlags::default()
    };

    host.flash_bin(CHIP, file.path(), FLASH_START, 0, flags, SessionConfig::default())
        .unwrap();

    assert_eq!(peek(&simulated, FLASH_START, data.len()), data);
    assert_eq!(peek(&simulated, FLASH_START + 0x8000, 2), [0xff, 0xff]);

    let stats = simulated.stats();
    assert_eq!(stats.mass_erases, 1);
    assert_eq!(stats.sectors_erased, 0);
    assert_eq!(stats.bytes_programmed, 4096);
}

#[test]
fn sector_erase_keeps_other_sectors() {
    let (host, simulated) = stm32f407_host();
    simulated.poke(FLASH_START + 0x7000, &[0x56]).unwrap();
    simulated.poke(FLASH_START + 0x8000, &[0x12, 0x34]).unwrap();

    let data = image(1000);
    let file = bin_file(&data);

    host.flash_auto(
        CHIP,
        file.path(),
        BinOptions {
            base_address: Some(FLASH_START + 0x4000),
            skip: 0,
        },
        FlashFlags {
            verify: true,
            ..FlashFlags::default()
        },
        SessionConfig::default(),
    )
    .unwrap();

    assert_eq!(peek(&simulated, FLASH_START + 0x4000, data.len()), data);
    // The second sector spans 0x4000..0x8000 and was erased as a whole.
    assert_eq!(peek(&simulated, FLASH_START + 0x7000, 1), [0xff]);
    assert_eq!(peek(&simulated, FLASH_START + 0x8000, 2), [0x12, 0x34]);
    assert_eq!(simulated.stats().sectors_erased, 1);
}

#[test]
fn hex_and_bin_with_header() {
    let (host, simulated) = stm32f407_host();

    let data = image(300);
    let file = hex_file(FLASH_START + 0x100, &data);

    host.flash_hex(CHIP, file.path(), FlashFlags::default(), SessionConfig::default())
        .unwrap();
    assert_eq!(peek(&simulated, FLASH_START + 0x100, data.len()), data);

    let file = bin_file(&data);
    let format = Format::Bin(BinOptions {
        base_address: Some(FLASH_START + 0x4000),
        skip: 44,
    });
    host.flash(CHIP, file.path(), format, FlashFlags::default(), SessionConfig::default())
        .unwrap();
    assert_eq!(peek(&simulated, FLASH_START + 0x4000, data.len() - 44), data[44..]);
}

#[test]
fn bin_needs_a_base_address() {
    let (host, simulated) = stm32f407_host();
    let file = bin_file(&[0x11; 64]);

    let error = host
        .flash_auto(CHIP, file.path(), BinOptions::default(), FlashFlags::default(), SessionConfig::default())
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);
    assert!(host.last_error().contains("base address"));

    let format = Format::Bin(BinOptions {
        base_address: None,
        skip: 4,
    });
    let error = host
        .flash(CHIP, file.path(), format, FlashFlags::default(), SessionConfig::default())
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);

    assert_eq!(peek(&simulated, FLASH_START, 4), [0xff; 4]);
    assert_eq!(simulated.stats(), Default::default());

    let base = BinOptions {
        base_address: Some(FLASH_START),
        skip: 0,
    };
    host.flash_auto(CHIP, file.path(), base, FlashFlags::default(), SessionConfig::default())
        .unwrap();
    assert_eq!(peek(&simulated, FLASH_START, 4), [0x11; 4]);
}

#[test]
fn ram_image_is_written_and_verified() {
    let (host, simulated) = stm32f407_host();

    let data = image(64);
    let file = bin_file(&data);
    host.flash_bin(
        CHIP,
        file.path(),
        RAM_START + 0x100,
        0,
        FlashFlags {
            verify: true,
            ..FlashFlags::default()
        },
        SessionConfig::default(),
    )
    .unwrap();

    assert_eq!(peek(&simulated, RAM_START + 0x100, data.len()), data);
    assert_eq!(simulated.stats().bytes_programmed, 0);
}

#[test]
fn image_outside_of_memory() {
    let (host, simulated) = stm32f407_host();
    let file = bin_file(&image(16));

    let error = host
        .flash_bin(CHIP, file.path(), 0x4000_0000, 0, FlashFlags::default(), SessionConfig::default())
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::FlashError);
    assert_eq!(simulated.stats(), Default::default());
}

#[test]
fn progress_is_reported() {
    let (host, _) = stm32f407_host();
    let reports = Arc::new(Mutex::new(Vec::<ProgressReport>::new()));

    let sink = reports.clone();
    host.set_progress_observer(move |report| sink.lock().push(*report));

    let file = bin_file(&image(4096));
    host.flash_bin(
        CHIP,
        file.path(),
        FLASH_START,
        0,
        FlashFlags {
            verify: true,
            ..FlashFlags::default()
        },
        SessionConfig::default(),
    )
    .unwrap();

    let reports = reports.lock();
    for operation in [
        ProgressOperation::Erase,
        ProgressOperation::Program,
        ProgressOperation::Verify,
    ] {
        let phase: Vec<_> = reports
            .iter()
            .filter(|report| report.operation == operation)
            .collect();

        assert_eq!(phase.first().map(|r| r.percent), Some(0.0));
        assert_eq!(phase.last().map(|r| r.percent), Some(100.0));
        assert!(phase.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert!(phase.iter().all(|r| r.status == operation.status_text()));
    }
    assert!(reports
        .iter()
        .all(|report| report.operation != ProgressOperation::Fill));
}

#[test_case(false; "sector erase")]
#[test_case(true; "chip erase")]
fn verify_failure(chip_erase: bool) {
    let (host, simulated) = stm32f407_host();
    let data = image(4096);

    // Corrupt the flash once programming is complete.
    let corrupt = simulated.clone();
    let flipped = data[0x10] ^ 0xff;
    host.set_progress_observer(move |report| {
        if report.operation == ProgressOperation::Program && report.percent >= 100.0 {
            corrupt.poke(FLASH_START + 0x10, &[flipped]).unwrap();
        }
    });

    let file = bin_file(&data);
    let result = host.flash_bin(
        CHIP,
        file.path(),
        FLASH_START,
        0,
        FlashFlags {
            verify: true,
            chip_erase,
            ..FlashFlags::default()
        },
        SessionConfig::default(),
    );

    assert_eq!(result.into_status(), -12);
    assert!(host.last_error().contains("0x08000010"));

    // Without verification the corruption goes unnoticed.
    let flags = FlashFlags {
        chip_erase,
        ..FlashFlags::default()
    };
    host.flash_bin(CHIP, file.path(), FLASH_START, 0, flags, SessionConfig::default())
        .unwrap();
}

#[test]
fn preverify_skips_unchanged_sectors() {
    let (host, simulated) = stm32f407_host();
    let data = image(4096);
    let file = bin_file(&data);

    host.flash_bin(CHIP, file.path(), FLASH_START, 0, FlashFlags::default(), SessionConfig::default())
        .unwrap();
    let before = simulated.stats();

    let flags = FlashFlags {
        verify: true,
        preverify: true,
        ..FlashFlags::default()
    };
    host.flash_bin(CHIP, file.path(), FLASH_START, 0, flags, SessionConfig::default())
        .unwrap();

    assert_eq!(simulated.stats(), before);
    assert_eq!(peek(&simulated, FLASH_START, data.len()), data);
}

#[test]
fn preverify_reports_an_empty_program_phase() {
    let (mut session, simulated) = stm32f407_session();
    let data = image(2048);
    simulated.poke(FLASH_START, &data).unwrap();

    let mut events = vec![];
    let options = DownloadOptions {
        progress: FlashProgress::new(|event| events.push(event)),
        preverify: true,
        ..DownloadOptions::default()
    };
    let file = bin_file(&data);
    download_file_with_options(&mut session, file.path(), Format::Bin(flash_start()), options)
        .unwrap();

    assert!(events.iter().any(|event| matches!(
        event,
        ProgressEvent::AddProgressBar {
            operation: ProgressOperation::Fill,
            total: Some(2048)
        }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        ProgressEvent::AddProgressBar {
            operation: ProgressOperation::Program,
            total: Some(0)
        }
    )));
    assert_eq!(simulated.stats().bytes_programmed, 0);
}

#[test]
fn dry_run_leaves_the_target_untouched() {
    let (mut session, simulated) = stm32f407_session();

    let mut layouts = 0;
    let options = DownloadOptions {
        progress: FlashProgress::new(|event| {
            if let ProgressEvent::FlashLayoutReady { .. } = event {
                layouts += 1;
            }
        }),
        dry_run: true,
        do_chip_erase: true,
        ..DownloadOptions::default()
    };
    let file = bin_file(&image(4096));
    download_file_with_options(&mut session, file.path(), Format::Bin(flash_start()), options)
        .unwrap();

    assert_eq!(layouts, 1);
    assert_eq!(simulated.stats(), Default::default());
    assert_eq!(peek(&simulated, FLASH_START, 4), [0xff; 4]);
}

#[test]
fn chip_erase_without_image() {
    let (host, simulated) = stm32f407_host();
    simulated.poke(FLASH_START + 0x2_0000, &[0]).unwrap();

    let erased = Arc::new(Mutex::new(None));
    let sink = erased.clone();
    host.set_progress_observer(move |report| {
        if report.operation == ProgressOperation::Erase {
            *sink.lock() = Some(report.percent);
        }
    });

    host.chip_erase(CHIP, SessionConfig::default()).unwrap();

    assert_eq!(*erased.lock(), Some(100.0));
    assert_eq!(peek(&simulated, FLASH_START + 0x2_0000, 1), [0xff]);
    assert_eq!(simulated.stats().mass_erases, 1);
}

#[test]
fn open_session_flashing() {
    let (host, simulated) = stm32f407_host();
    let session = host.open_auto(CHIP, SessionConfig::default()).unwrap();

    let data = image(256);
    let file = bin_file(&data);
    host.flash_session(
        session,
        file.path(),
        Format::Bin(BinOptions {
            base_address: Some(FLASH_START),
            skip: 0,
        }),
        FlashFlags {
            verify: true,
            ..FlashFlags::default()
        },
    )
    .unwrap();

    assert_eq!(peek(&simulated, FLASH_START, data.len()), data);

    // The session stays usable.
    let mut read = vec![0; data.len()];
    host.read_8(session, 0, FLASH_START, &mut read).unwrap();
    assert_eq!(read, data);
    host.close(session).unwrap();
}

#[test]
fn unknown_file_format() {
    let (host, _) = stm32f407_host();
    let file = tempfile::Builder::new().suffix(".srec").tempfile().unwrap();

    let error = host
        .flash_auto(CHIP, file.path(), BinOptions::default(), FlashFlags::default(), SessionConfig::default())
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unsupported);
    assert!(!host.last_error().is_empty());
}

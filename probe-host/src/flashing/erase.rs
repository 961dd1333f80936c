use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use super::flasher::Flasher;
use super::loader::{run_phase, RESET_HALT_TIMEOUT};
use super::{FlashError, FlashProgress, ProgressOperation};
use crate::Session;

/// Mass-erase all nonvolatile memory.
///
/// Every region with a flash algorithm is erased, with the mass erase routine of the
/// algorithm where there is one, and sector by sector otherwise.
#[tracing::instrument(skip_all)]
pub fn erase_all(session: &mut Session, mut progress: FlashProgress<'_>) -> Result<(), FlashError> {
    tracing::debug!("Erasing all...");

    let flashers = session
        .target()
        .flash_loader()
        .flashers(session.target(), true)?;

    if flashers.is_empty() {
        tracing::warn!("{} has no flash algorithms, nothing to erase", session.target().name);
    }

    let cores: BTreeSet<usize> = flashers.iter().map(Flasher::core_index).collect();
    for core_index in cores {
        session.core(core_index)?.reset_and_halt(RESET_HALT_TIMEOUT)?;
    }

    erase_regions(session, &flashers, &mut progress)
}

/// Erases the whole region of every flasher as one erase phase.
///
/// An algorithm that covers several regions is only asked once to mass erase.
pub(super) fn erase_regions(
    session: &mut Session,
    flashers: &[Flasher],
    progress: &mut FlashProgress<'_>,
) -> Result<(), FlashError> {
    let total = flashers
        .iter()
        .map(|f| f.region().end - f.region().start)
        .sum();

    run_phase(progress, ProgressOperation::Erase, total, |progress| {
        let mut mass_erased = HashSet::new();

        for flasher in flashers {
            let algorithm = flasher.algorithm();

            if mass_erased.contains(&algorithm.name) {
                let size = flasher.region().end - flasher.region().start;
                progress.progressed(ProgressOperation::Erase, size, Duration::ZERO);
                continue;
            }

            let mut core = session.core(flasher.core_index())?;
            flasher.erase_region(&mut core, algorithm.erase_all_supported, progress)?;

            if algorithm.erase_all_supported {
                mass_erased.insert(algorithm.name.clone());
            }
        }

        Ok(())
    })
}

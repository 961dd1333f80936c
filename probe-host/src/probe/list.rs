//! Listing probes of various types.

use std::sync::Arc;

use crate::probe::{
    DebugProbeError, DebugProbeInfo, DebugProbeSelector, DebugProbeType, Probe,
    ProbeCreationError, ProbeFactory,
};

/// Struct to list all attached debug probes
#[derive(Debug)]
pub struct Lister {
    lister: Box<dyn ProbeLister>,
}

impl Lister {
    /// Create a new lister with the default lister implementation.
    pub fn new() -> Self {
        Self {
            lister: Box::new(AllProbesLister::new()),
        }
    }

    /// Create a new lister with a custom lister implementation.
    pub fn with_lister(lister: Box<dyn ProbeLister>) -> Self {
        Self { lister }
    }

    /// Try to open a probe using the given selector
    pub fn open(&self, selector: impl Into<DebugProbeSelector>) -> Result<Probe, DebugProbeError> {
        self.lister.open(&selector.into())
    }

    /// List all available debug probes
    pub fn list_all(&self) -> Vec<DebugProbeInfo> {
        self.lister.list_all()
    }

    /// List all available debug probes matching the selector
    pub fn list(&self, selector: Option<&DebugProbeSelector>) -> Vec<DebugProbeInfo> {
        self.lister.list(selector)
    }

    /// List the available debug probes of one family
    pub fn list_of_type(&self, probe_type: DebugProbeType) -> Vec<DebugProbeInfo> {
        self.list_all()
            .into_iter()
            .filter(|info| info.probe_type == probe_type)
            .collect()
    }
}

impl Default for Lister {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for a probe lister implementation.
///
/// This trait can be used to implement custom probe listers.
pub trait ProbeLister: std::fmt::Debug + Send + Sync {
    /// Try to open a probe using the given selector
    fn open(&self, selector: &DebugProbeSelector) -> Result<Probe, DebugProbeError>;

    /// List all probes found by the lister.
    fn list_all(&self) -> Vec<DebugProbeInfo> {
        self.list(None)
    }

    /// List probes found by the lister, with optional filtering.
    fn list(&self, selector: Option<&DebugProbeSelector>) -> Vec<DebugProbeInfo>;
}

/// Lister over a set of registered probe drivers.
///
/// Drivers are asked in registration order; the first driver which can open
/// the selected probe wins.
#[derive(Debug, Default, Clone)]
pub struct AllProbesLister {
    drivers: Vec<Arc<dyn ProbeFactory>>,
}

impl ProbeLister for AllProbesLister {
    fn open(&self, selector: &DebugProbeSelector) -> Result<Probe, DebugProbeError> {
        let mut open_error = None;

        for driver in &self.drivers {
            match driver.open(selector) {
                Ok(link) => return Ok(Probe::from_specific_probe(link)),
                Err(DebugProbeError::ProbeCouldNotBeCreated(ProbeCreationError::NotFound)) => {}
                Err(e) => {
                    tracing::debug!("{driver:?} failed to open {selector}: {e}");
                    open_error = Some(e)
                }
            };
        }

        Err(open_error.unwrap_or(DebugProbeError::ProbeCouldNotBeCreated(
            ProbeCreationError::NotFound,
        )))
    }

    fn list(&self, selector: Option<&DebugProbeSelector>) -> Vec<DebugProbeInfo> {
        let mut list = vec![];

        for driver in &self.drivers {
            list.extend(driver.list_probes_filtered(selector));
        }

        list
    }
}

impl AllProbesLister {
    /// Create a new lister without any drivers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a driver to the lister.
    pub fn with_driver(mut self, driver: impl ProbeFactory + 'static) -> Self {
        self.register(Arc::new(driver));
        self
    }

    /// Adds a shared driver to the lister.
    pub fn register(&mut self, driver: Arc<dyn ProbeFactory>) {
        self.drivers.push(driver);
    }

    /// The number of registered drivers.
    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::probe::fake_probe::{FakeProbe, FakeProbeFactory};

    #[test]
    fn empty_lister_finds_nothing() {
        let lister = Lister::new();

        assert!(lister.list_all().is_empty());
        assert!(matches!(
            lister.open("0d28:0204".parse::<DebugProbeSelector>().unwrap()),
            Err(DebugProbeError::ProbeCouldNotBeCreated(
                ProbeCreationError::NotFound
            ))
        ));
    }

    #[test]
    fn drivers_are_listed_in_order() {
        let lister = AllProbesLister::new()
            .with_driver(FakeProbeFactory::new(vec![FakeProbe::new()]))
            .with_driver(FakeProbeFactory::new(vec![
                FakeProbe::new()
                    .with_probe_type(DebugProbeType::StLink)
                    .with_identity(0x0483, 0x374b, "STLINK01"),
            ]));
        let lister = Lister::with_lister(Box::new(lister));

        let probes = lister.list_all();
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].probe_type, DebugProbeType::CmsisDap);
        assert_eq!(probes[1].probe_type, DebugProbeType::StLink);
        assert_eq!(lister.list_of_type(DebugProbeType::StLink).len(), 1);

        let probe = lister.open(&probes[1]).unwrap();
        assert_eq!(probe.probe_type(), DebugProbeType::StLink);
    }
}

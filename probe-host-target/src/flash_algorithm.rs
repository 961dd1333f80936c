use super::flash_properties::FlashProperties;
use serde::{Deserialize, Serialize};

/// The description of a flash algorithm, as read from a target description file.
///
/// The routines of the algorithm itself run on the target and are provided by the
/// probe driver; this only describes the flash they operate on.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFlashAlgorithm {
    /// The name of the flash algorithm.
    pub name: String,
    /// The description of the algorithm.
    #[serde(default)]
    pub description: String,
    /// Whether this flash algorithm is the default one or not.
    #[serde(default)]
    pub default: bool,
    /// Whether the algorithm has a routine which erases the whole flash at once.
    #[serde(default)]
    pub erase_all: bool,
    /// The properties of the flash on the device.
    pub flash_properties: FlashProperties,
    /// List of cores that can use this algorithm. Empty means all cores.
    #[serde(default)]
    pub cores: Vec<String>,
}

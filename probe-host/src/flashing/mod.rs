//! Flash programming operations.
//!
//! This modules provides a means to do flash erasing, programming and verifying.
//!
//! It provides a convenient high level interface that can flash an ELF, IHEX or BIN file
//! as well as a lower level block based interface.
//!
//! ## Examples
//!
//! ### Flashing a binary
//!
//! The easiest way to flash a binary is using the [`download_file`] function,
//! and looks like this:
//!
//! ```no_run
//! use probe_host::{DebugProbeSelector, Lister, SessionConfig, flashing};
//!
//! let lister = Lister::new();
//! let selector: DebugProbeSelector = "0d28:0204".parse()?;
//! let probe = lister.open(selector)?;
//! let target = probe_host::config::get_target_by_name("nrf52840_xxaa")?;
//! let mut session = probe.attach(target, SessionConfig::default())?;
//!
//! flashing::download_file(&mut session, "binary.hex", flashing::Format::Hex)?;
//!
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ### Adding data manually
//!
//! ```no_run
//! use probe_host::{DebugProbeSelector, Lister, SessionConfig, flashing::DownloadOptions};
//!
//! let lister = Lister::new();
//! let selector: DebugProbeSelector = "0d28:0204".parse()?;
//! let probe = lister.open(selector)?;
//! let target = probe_host::config::get_target_by_name("nrf52840_xxaa")?;
//! let mut session = probe.attach(target, SessionConfig::default())?;
//!
//! let mut loader = session.target().flash_loader();
//!
//! loader.add_data(0x0000_1000, &[0x1, 0x2, 0x3])?;
//!
//! // Finally, the data can be programmed:
//! loader.commit(&mut session, DownloadOptions::default())?;
//!
//! # Ok::<(), anyhow::Error>(())
//! ```

mod builder;
mod download;
mod erase;
mod error;
mod flash_algorithm;
mod flasher;
mod loader;
mod progress;

pub use builder::{FlashFill, FlashLayout, FlashPage, FlashSector};
pub use download::*;
pub use erase::*;
pub use error::*;
pub use flash_algorithm::*;
pub use loader::*;
pub use progress::*;

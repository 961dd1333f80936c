use std::time::Duration;

use super::FlashLayout;

/// A structure to manage the flashing procedure progress reporting.
///
/// This struct stores a handler closure which will be called every time an event happens during the flashing process.
/// Such an event can be start or finish of the flashing procedure or a progress report, as well as some more events.
///
/// # Example
///
/// ```
/// use probe_host::flashing::FlashProgress;
///
/// // Print events
/// let progress = FlashProgress::new(|event| println!("Event: {:#?}", event));
/// ```
pub struct FlashProgress<'a> {
    handler: Box<dyn FnMut(ProgressEvent) + 'a>,
}

impl Default for FlashProgress<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for FlashProgress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashProgress").finish_non_exhaustive()
    }
}

impl<'a> FlashProgress<'a> {
    /// Create a new `FlashProgress` structure with a given `handler` to be called on events.
    pub fn new(handler: impl FnMut(ProgressEvent) + 'a) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Create a new `FlashProgress` structure with an empty handler.
    pub fn empty() -> Self {
        Self {
            handler: Box::new(|_| {}),
        }
    }

    /// Emit a flashing progress event.
    pub fn emit(&mut self, event: ProgressEvent) {
        (self.handler)(event);
    }

    pub(super) fn initialized(&mut self, flash_layout: Vec<FlashLayout>) {
        self.emit(ProgressEvent::FlashLayoutReady { flash_layout });
    }

    pub(super) fn add_progress_bar(&mut self, operation: ProgressOperation, total: Option<u64>) {
        self.emit(ProgressEvent::AddProgressBar { operation, total });
    }

    pub(super) fn started(&mut self, operation: ProgressOperation) {
        self.emit(ProgressEvent::Started(operation));
    }

    pub(super) fn progressed(&mut self, operation: ProgressOperation, size: u64, time: Duration) {
        self.emit(ProgressEvent::Progress {
            operation,
            size,
            time,
        });
    }

    pub(super) fn failed(&mut self, operation: ProgressOperation) {
        self.emit(ProgressEvent::Failed(operation));
    }

    pub(super) fn finished(&mut self, operation: ProgressOperation) {
        self.emit(ProgressEvent::Finished(operation));
    }

    pub(super) fn message(&mut self, message: String) {
        self.emit(ProgressEvent::DiagnosticMessage { message });
    }
}

/// The phase of the flashing procedure a [`ProgressEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressOperation {
    /// Reading back target contents, either to compare them with the image
    /// or to preserve bytes the image does not cover.
    Fill,
    /// Erasing sectors or the whole flash.
    Erase,
    /// Writing pages.
    Program,
    /// Reading back and comparing the written data.
    Verify,
}

impl ProgressOperation {
    /// The phase code reported at the handle interface.
    pub fn code(self) -> i32 {
        match self {
            ProgressOperation::Fill => 0,
            ProgressOperation::Erase => 1,
            ProgressOperation::Program => 2,
            ProgressOperation::Verify => 3,
        }
    }

    /// A short description of what the phase is doing.
    pub fn status_text(self) -> &'static str {
        match self {
            ProgressOperation::Fill => "filling",
            ProgressOperation::Erase => "erasing",
            ProgressOperation::Program => "programming",
            ProgressOperation::Verify => "verifying",
        }
    }
}

/// Possible events during the flashing process.
///
/// Every phase starts with [`ProgressEvent::AddProgressBar`] and [`ProgressEvent::Started`],
/// and ends with either [`ProgressEvent::Finished`] or [`ProgressEvent::Failed`].
#[derive(Debug)]
pub enum ProgressEvent {
    /// The flash layout has been built and the flashing procedure was initialized.
    FlashLayoutReady {
        /// The layout of each flash region that will be written.
        flash_layout: Vec<FlashLayout>,
    },

    /// A phase is about to start.
    AddProgressBar {
        /// The phase.
        operation: ProgressOperation,
        /// The number of bytes the phase will process, if known.
        total: Option<u64>,
    },

    /// A phase has started.
    Started(ProgressOperation),

    /// A part of a phase has been completed.
    Progress {
        /// The phase.
        operation: ProgressOperation,
        /// The number of bytes that have been processed.
        size: u64,
        /// The time it took to process them.
        time: Duration,
    },

    /// A phase has failed.
    Failed(ProgressOperation),

    /// A phase has finished successfully.
    Finished(ProgressOperation),

    /// A message was generated by the flashing procedure.
    DiagnosticMessage {
        /// The message.
        message: String,
    },
}

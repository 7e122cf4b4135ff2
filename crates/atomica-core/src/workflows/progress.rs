/// Progress events emitted by long-running workflows.
///
/// A run is one or more phases; each phase may carry a counted task whose steps
/// are reported with [`Progress::TaskIncrement`].
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards events to an optional callback; without one every report is a no-op.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Opens a phase with a counted task of `total_steps` steps.
    pub fn start_counted_phase(&self, name: &'static str, total_steps: u64) {
        self.report(Progress::PhaseStart { name });
        self.report(Progress::TaskStart { total_steps });
    }

    /// Closes the task opened by [`Self::start_counted_phase`] and then its phase.
    pub fn finish_counted_phase(&self, summary: Option<String>) {
        self.report(Progress::TaskFinish);
        if let Some(summary) = summary {
            self.report(Progress::Message(summary));
        }
        self.report(Progress::PhaseFinish);
    }
}

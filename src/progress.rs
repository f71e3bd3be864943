use gix::progress::{
    Count, Id, MessageLevel, NestedProgress, Progress, Step, StepShared, Unit, UNKNOWN,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Side channel for reporting extraction progress. All methods default to
/// doing nothing, so sinks only implement what they display.
pub trait ProgressSink: Send + Sync {
    fn start(&self, _label: &str) {}

    /// Called once per completed commit record.
    fn advance(&self, _records: u64) {}

    /// Free-form status, e.g. fetch milestones.
    fn message(&self, _message: &str) {}

    fn finish(&self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

pub fn no_progress() -> Arc<dyn ProgressSink> {
    Arc::new(NoProgress)
}

/// Terminal spinner backed by indicatif.
pub struct SpinnerProgress {
    pb: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{pos} commits]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { pb }
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for SpinnerProgress {
    fn start(&self, label: &str) {
        self.pb.set_position(0);
        self.pb.set_message(label.to_string());
    }

    fn advance(&self, records: u64) {
        self.pb.inc(records);
    }

    fn message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    fn finish(&self, message: &str) {
        self.pb.finish_with_message(message.to_string());
    }
}

/// Forwards gix fetch progress to a [`ProgressSink`] as status messages.
pub struct FetchProgress {
    sink: Arc<dyn ProgressSink>,
    name: Option<String>,
    max: Option<Step>,
    unit: Option<Unit>,
    step: StepShared,
    last_percent: AtomicUsize,
}

impl FetchProgress {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            name: None,
            max: None,
            unit: None,
            step: Arc::new(AtomicUsize::new(0)),
            last_percent: AtomicUsize::new(usize::MAX),
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("fetch")
    }

    fn report(&self, step: Step) {
        let Some(max) = self.max.filter(|m| *m > 0) else {
            return;
        };
        let percent = (step.min(max) * 100) / max;
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            self.sink.message(&format!("{}: {percent}%", self.label()));
        }
    }
}

impl Count for FetchProgress {
    fn set(&self, step: Step) {
        self.step.store(step, Ordering::Relaxed);
        self.report(step);
    }

    fn step(&self) -> Step {
        self.step.load(Ordering::Relaxed)
    }

    fn inc_by(&self, step: Step) {
        let current = self.step.fetch_add(step, Ordering::Relaxed) + step;
        self.report(current);
    }

    fn counter(&self) -> StepShared {
        Arc::clone(&self.step)
    }
}

impl Progress for FetchProgress {
    fn init(&mut self, max: Option<Step>, unit: Option<Unit>) {
        self.max = max;
        self.unit = unit;
        self.step.store(0, Ordering::Relaxed);
        self.last_percent.store(usize::MAX, Ordering::Relaxed);
    }

    fn unit(&self) -> Option<Unit> {
        self.unit.clone()
    }

    fn max(&self) -> Option<Step> {
        self.max
    }

    fn set_max(&mut self, max: Option<Step>) -> Option<Step> {
        std::mem::replace(&mut self.max, max)
    }

    fn set_name(&mut self, name: String) {
        self.sink.message(&name);
        self.name = Some(name);
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn id(&self) -> Id {
        UNKNOWN
    }

    fn message(&self, _level: MessageLevel, message: String) {
        self.sink.message(&format!("{}: {message}", self.label()));
    }
}

impl NestedProgress for FetchProgress {
    type SubProgress = FetchProgress;

    fn add_child(&mut self, name: impl Into<String>) -> Self::SubProgress {
        let mut child = FetchProgress::new(Arc::clone(&self.sink));
        child.name = Some(name.into());
        child
    }

    fn add_child_with_id(&mut self, name: impl Into<String>, _id: Id) -> Self::SubProgress {
        self.add_child(name)
    }
}

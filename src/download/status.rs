//! Human-readable status stream: response info, progress redraws, summaries.
//!
//! Status output is separate from `tracing` logs. The terminal reporter
//! redraws the progress line in place through an indicatif bar and writes
//! permanent lines above it.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Destination for status output.
pub trait StatusReporter: Send {
    /// Writes a permanent line.
    fn line(&mut self, text: &str);

    /// Replaces the current progress line.
    fn redraw(&mut self, text: &str);

    /// Commits the final summary line, ending the current progress line.
    fn finish(&mut self, text: &str);
}

/// Writes status to stderr, redrawing progress in place.
#[derive(Debug, Default)]
pub struct TerminalStatus {
    bar: Option<ProgressBar>,
}

impl TerminalStatus {
    /// Creates a reporter with no active progress line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        })
    }
}

fn write_stderr(text: &str) {
    let _ = writeln!(std::io::stderr().lock(), "{text}");
}

impl StatusReporter for TerminalStatus {
    fn line(&mut self, text: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| write_stderr(text)),
            None => write_stderr(text),
        }
    }

    fn redraw(&mut self, text: &str) {
        self.bar().set_message(text.to_string());
    }

    fn finish(&mut self, text: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        write_stderr(text);
    }
}

/// Discards all status output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusReporter for NullStatus {
    fn line(&mut self, _text: &str) {}

    fn redraw(&mut self, _text: &str) {}

    fn finish(&mut self, _text: &str) {}
}

/// One recorded status call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A permanent line.
    Line(String),
    /// A progress redraw.
    Redraw(String),
    /// A final summary line.
    Finish(String),
}

/// Records status calls in memory; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingStatus {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl RecordingStatus {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Permanent lines only, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::Line(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl StatusReporter for RecordingStatus {
    fn line(&mut self, text: &str) {
        self.push(StatusEvent::Line(text.to_string()));
    }

    fn redraw(&mut self, text: &str) {
        self.push(StatusEvent::Redraw(text.to_string()));
    }

    fn finish(&mut self, text: &str) {
        self.push(StatusEvent::Finish(text.to_string()));
    }
}

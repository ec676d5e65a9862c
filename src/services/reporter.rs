//! Result reporting.
//!
//! Every failed record is surfaced exactly once as a non-fatal [`FileError`];
//! the records themselves pass through untouched.

use crate::domain::result::SigningResult;
use crate::infra::error::FileError;

/// Destination for per-file failures
pub trait ReportSink {
    fn file_failed(&mut self, error: &FileError);
}

/// Writes failures to the `log` facade at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn file_failed(&mut self, error: &FileError) {
        log::error!("{error}");
    }
}

/// Collects failures in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub errors: Vec<FileError>,
}

impl ReportSink for CollectingSink {
    fn file_failed(&mut self, error: &FileError) {
        self.errors.push(error.clone());
    }
}

pub struct ResultReporter<S: ReportSink = LogSink> {
    sink: S,
}

impl Default for ResultReporter<LogSink> {
    fn default() -> Self {
        Self::new(LogSink)
    }
}

impl<S: ReportSink> ResultReporter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Surface failures and hand back the full, unfiltered sequence
    pub fn report(&mut self, results: Vec<SigningResult>) -> Vec<SigningResult> {
        for error in results.iter().filter_map(SigningResult::error) {
            self.sink.file_failed(&error);
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        log::info!(
            "Signed {} of {} file(s), {failed} failed",
            results.len() - failed,
            results.len()
        );
        results
    }
}

// Progress callbacks for long-running operations.
//
// Reporting is informational only and never influences results.

/// Receives `(operation, current, total)` updates while an operation runs.
pub trait ProgressReporter {
    fn report(&mut self, operation: &str, current: u64, total: u64);
}

/// Reporter that discards every update. The default everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    #[inline]
    fn report(&mut self, _operation: &str, _current: u64, _total: u64) {}
}

impl<F> ProgressReporter for F
where
    F: FnMut(&str, u64, u64),
{
    fn report(&mut self, operation: &str, current: u64, total: u64) {
        self(operation, current, total)
    }
}

use crate::error::ScanError;
use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// Append-only destination for non-fatal scan errors.
///
/// Workers record into it concurrently, so implementations must be `Send + Sync`.
pub trait ErrorSink: Send + Sync {
    fn record(&self, error: ScanError);
}

impl ErrorSink for SegQueue<ScanError> {
    fn record(&self, error: ScanError) {
        self.push(error);
    }
}

impl<S: ErrorSink + ?Sized> ErrorSink for Arc<S> {
    fn record(&self, error: ScanError) {
        (**self).record(error)
    }
}

/// Drain a `SegQueue` sink into a vector
pub fn drain(queue: &SegQueue<ScanError>) -> Vec<ScanError> {
    std::iter::from_fn(|| queue.pop()).collect()
}

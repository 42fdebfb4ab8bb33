use super::job::{FrontierEntry, ScanJob, ScanSettings};
use crate::error::{Result, ScanError};
use std::sync::Arc;

/// Restartable, blocking iterator over the paths matched by one scan.
///
/// Workers start as soon as the handle is created. `next()` blocks while the
/// scan is running and returns `None` once every result has been delivered.
/// Dropping the handle cancels the scan.
pub struct ScanHandle {
    settings: Arc<ScanSettings>,
    seeds: Arc<[FrontierEntry]>,
    job: Option<Arc<ScanJob>>,
}

impl ScanHandle {
    pub(crate) fn start(settings: Arc<ScanSettings>, seeds: Arc<[FrontierEntry]>) -> Self {
        let job = ScanJob::launch(Arc::clone(&settings), &seeds);
        Self {
            settings,
            seeds,
            job: Some(job),
        }
    }

    /// Discard the running scan and start over from the same seeds
    pub fn reset(&mut self) -> Result<()> {
        let Some(old) = self.job.as_ref() else {
            return Err(ScanError::Disposed);
        };
        tracing::debug!(job = old.id(), "resetting scan");

        let fresh = ScanJob::launch(Arc::clone(&self.settings), &self.seeds);
        if let Some(old) = self.job.replace(fresh) {
            old.cancel();
        }
        Ok(())
    }

    /// Cancel the scan. Further calls to `next()` return `None`.
    pub fn dispose(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.job.is_none()
    }

    /// Handle for cancelling or observing the current scan from another thread
    pub fn control(&self) -> Option<ScanControl> {
        self.job.as_ref().map(|job| ScanControl {
            job: Arc::clone(job),
        })
    }
}

impl Iterator for ScanHandle {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.job.as_ref()?.next_result()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHandle")
            .field("seeds", &self.seeds.len())
            .field("job", &self.job.as_ref().map(|job| job.id()))
            .finish()
    }
}

/// Cancels or observes one scan job, usable from any thread
#[derive(Clone)]
pub struct ScanControl {
    job: Arc<ScanJob>,
}

impl ScanControl {
    /// Cancel the scan, waking a consumer blocked in `next()`
    pub fn cancel(&self) {
        self.job.cancel();
    }

    /// True once the scan stopped, either completed or cancelled
    pub fn is_finished(&self) -> bool {
        self.job.is_cancelled()
    }

    /// True if the scan stopped because all work was done
    pub fn is_completed(&self) -> bool {
        self.job.is_completed()
    }

    /// Workers still running against this scan
    pub fn live_workers(&self) -> usize {
        self.job.live_workers()
    }
}

impl std::fmt::Debug for ScanControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanControl")
            .field("job", &self.job.id())
            .field("finished", &self.is_finished())
            .finish()
    }
}

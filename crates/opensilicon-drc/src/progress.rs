use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is already cancelled.
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Observer of a DRC run. Calls must return quickly; they come from the
/// thread driving the run, never from workers.
pub trait ProgressReporter: Send + Sync {
    /// A provider started a new phase.
    fn report_stage(&self, _name: &str, _index: usize, _total: usize) {}

    /// Fraction of the current phase done, 0.0 to 1.0.
    fn report_progress(&self, _fraction: f64) {}

    fn report_aux(&self, _message: &str) {}

    /// Polled by the engine; return true to stop the run.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Reports stages and messages through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn report_stage(&self, name: &str, index: usize, total: usize) {
        log::info!("[{}/{}] {}", index + 1, total, name);
    }

    fn report_progress(&self, fraction: f64) {
        log::trace!("progress {:.0}%", fraction * 100.0);
    }

    fn report_aux(&self, message: &str) {
        log::info!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        clone.reset();
        assert!(!token.is_cancelled());
        assert!(CancellationToken::cancelled().is_cancelled());
    }
}

//! Progress reporting and cancellation primitives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// One progress notification. Emitted at least once per batch and once per
/// state-machine transition. Consumers must not block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: String,
    pub current: usize,
    pub total: usize,
    pub percentage: f32,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(
        stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let percentage = if total > 0 {
            current as f32 / total as f32 * 100.0
        } else {
            0.0
        };
        Self {
            stage: stage.into(),
            current,
            total,
            percentage,
            message: message.into(),
        }
    }
}

/// Fire-and-continue progress callback.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Cooperative cancellation flag, observed between batches. In-flight
/// record operations are allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_zero_total() {
        let update = ProgressUpdate::new("contacts", 0, 0, "idle");
        assert_eq!(update.percentage, 0.0);
        let update = ProgressUpdate::new("contacts", 5, 20, "");
        assert!((update.percentage - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}

//! Upload progress events and the percentage rule applied to them.
//!
//! The service implementation pushes a [`TransferProgress`] into a
//! [`ProgressSender`] each time reqwest pulls another chunk of the request
//! body. The upload controller drains the matching receiver on its own task,
//! so progress and the terminal reply are handled by one writer, in order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2pdf::progress::{PercentTracker, TransferProgress};
//!
//! let mut tracker = PercentTracker::default();
//! assert_eq!(tracker.observe(TransferProgress::new(512, Some(1024))), Some(50));
//! // Unknown totals leave the bar where it was.
//! assert_eq!(tracker.observe(TransferProgress::new(600, None)), None);
//! assert_eq!(tracker.percent(), Some(50));
//! ```

use tokio::sync::mpsc;

/// Bytes handed to the transport so far, and the total if it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// `round(100 · loaded / total)` clamped to 100, or `None` when the
    /// total is unknown or zero.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|t| *t > 0)?;
        let pct = (self.loaded as f64 / total as f64 * 100.0).round();
        Some(pct.clamp(0.0, 100.0) as u8)
    }
}

/// Channel end handed to [`crate::service::ConversionService::upload`].
pub type ProgressSender = mpsc::UnboundedSender<TransferProgress>;

/// Channel end drained by the upload controller.
pub type ProgressReceiver = mpsc::UnboundedReceiver<TransferProgress>;

/// Create a fresh progress channel for one upload.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Turns raw progress events into a percentage that never goes backwards.
///
/// Reqwest may re-poll the body after a redirect and start counting from
/// zero again; the bar should not jump back when that happens.
#[derive(Debug, Default, Clone)]
pub struct PercentTracker {
    percent: Option<u8>,
}

impl PercentTracker {
    /// Feed one event. Returns the new percentage if it changed.
    pub fn observe(&mut self, progress: TransferProgress) -> Option<u8> {
        let pct = progress.percent()?;
        match self.percent {
            Some(current) if pct <= current => None,
            _ => {
                self.percent = Some(pct);
                Some(pct)
            }
        }
    }

    /// Last reported percentage, `None` if nothing computable arrived yet.
    pub fn percent(&self) -> Option<u8> {
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(TransferProgress::new(0, Some(3)).percent(), Some(0));
        assert_eq!(TransferProgress::new(1, Some(3)).percent(), Some(33));
        assert_eq!(TransferProgress::new(2, Some(3)).percent(), Some(67));
        assert_eq!(TransferProgress::new(3, Some(3)).percent(), Some(100));
        assert_eq!(TransferProgress::new(1, Some(200)).percent(), Some(1));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(TransferProgress::new(150, Some(100)).percent(), Some(100));
    }

    #[test]
    fn unknown_or_zero_total_is_not_computable() {
        assert_eq!(TransferProgress::new(10, None).percent(), None);
        assert_eq!(TransferProgress::new(0, Some(0)).percent(), None);
    }

    #[test]
    fn tracker_is_monotonic() {
        let mut t = PercentTracker::default();
        assert_eq!(t.observe(TransferProgress::new(10, Some(100))), Some(10));
        assert_eq!(t.observe(TransferProgress::new(60, Some(100))), Some(60));
        assert_eq!(t.observe(TransferProgress::new(20, Some(100))), None);
        assert_eq!(t.observe(TransferProgress::new(60, Some(100))), None);
        assert_eq!(t.percent(), Some(60));
        assert_eq!(t.observe(TransferProgress::new(100, Some(100))), Some(100));
    }

    #[test]
    fn tracker_reports_zero_once() {
        let mut t = PercentTracker::default();
        assert_eq!(t.observe(TransferProgress::new(0, Some(100))), Some(0));
        assert_eq!(t.observe(TransferProgress::new(0, Some(100))), None);
    }

    #[tokio::test]
    async fn channel_preserves_order() {
        let (tx, mut rx) = channel();
        for loaded in [1, 2, 3] {
            tx.send(TransferProgress::new(loaded, Some(3))).unwrap();
        }
        drop(tx);
        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p.loaded);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}

//! Turns verification results into resync decisions
//!
//! A single mismatch is routine: the book is dropped and a fresh snapshot is
//! requested. A mismatch that comes back after the book was rebuilt points at
//! something the resync cannot fix, so it is escalated as a
//! [`BookIntegrityError`]. Escalation never stops processing.

use crate::checksum::{ChecksumVerifier, ReconciliationResult};
use kraken_types::BookIntegrityError;
use tracing::{error, warn};

/// Consecutive failed verifications before a mismatch is reported as an
/// integrity error (one failure, one resync, one more failure)
pub const DEFAULT_INTEGRITY_THRESHOLD: u32 = 2;

/// What the caller should do after a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Local book matches the exchange
    InSync,
    /// Local book must be discarded and rebuilt from a fresh snapshot
    Resync {
        /// The failing comparison
        result: ReconciliationResult,
        /// Set once the mismatch has survived a resync cycle
        integrity: Option<BookIntegrityError>,
    },
}

impl Verdict {
    /// Returns true if a resubscription is required
    pub fn requires_resync(&self) -> bool {
        matches!(self, Self::Resync { .. })
    }
}

/// Tracks verification history for one book
#[derive(Debug, Clone)]
pub struct ReconciliationController {
    integrity_threshold: u32,
    failure_streak: u32,
    resyncs_requested: u64,
    last_verification: Option<ReconciliationResult>,
}

impl Default for ReconciliationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationController {
    /// Create a controller with the default integrity threshold
    pub fn new() -> Self {
        Self::with_integrity_threshold(DEFAULT_INTEGRITY_THRESHOLD)
    }

    /// Create a controller that escalates after `threshold` consecutive failures
    pub fn with_integrity_threshold(threshold: u32) -> Self {
        Self {
            integrity_threshold: threshold.max(1),
            failure_streak: 0,
            resyncs_requested: 0,
            last_verification: None,
        }
    }

    /// Record a verification result and decide what happens next
    pub fn record(&mut self, pair: &str, result: ReconciliationResult) -> Verdict {
        self.last_verification = Some(result.clone());

        if !ChecksumVerifier::should_resync(&result) {
            self.failure_streak = 0;
            return Verdict::InSync;
        }

        self.failure_streak += 1;
        self.resyncs_requested += 1;
        warn!(
            pair,
            expected = %result.expected_checksum,
            computed = %result.computed_checksum,
            streak = self.failure_streak,
            "checksum mismatch, requesting resync"
        );

        let integrity = (self.failure_streak >= self.integrity_threshold).then(|| {
            let err = BookIntegrityError {
                pair: pair.to_string(),
                expected: result.expected_checksum.clone(),
                computed: result.computed_checksum.clone(),
                failed_cycles: self.failure_streak,
            };
            error!(error = %err, "book integrity lost");
            err
        });

        Verdict::Resync { result, integrity }
    }

    /// Most recent verification, if any
    pub fn last_verification(&self) -> Option<&ReconciliationResult> {
        self.last_verification.as_ref()
    }

    /// Number of resyncs requested so far
    pub fn resyncs_requested(&self) -> u64 {
        self.resyncs_requested
    }

    /// Consecutive failed verifications
    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    /// Configured integrity threshold
    pub fn integrity_threshold(&self) -> u32 {
        self.integrity_threshold
    }

    /// Drop in-flight verification state
    ///
    /// The failure streak is kept so a mismatch that outlives a resubscription
    /// is still recognized.
    pub fn reset(&mut self) {
        self.last_verification = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(valid: bool) -> ReconciliationResult {
        ReconciliationResult {
            valid,
            expected_checksum: "100".into(),
            computed_checksum: if valid { "100".into() } else { "200".into() },
        }
    }

    #[test]
    fn test_valid_result_is_in_sync() {
        let mut ctl = ReconciliationController::new();
        assert_eq!(ctl.record("XBT/USD", result(true)), Verdict::InSync);
        assert_eq!(ctl.failure_streak(), 0);
        assert!(ctl.last_verification().unwrap().valid);
    }

    #[test]
    fn test_first_mismatch_resyncs_without_integrity_error() {
        let mut ctl = ReconciliationController::new();
        match ctl.record("XBT/USD", result(false)) {
            Verdict::Resync { integrity, .. } => assert!(integrity.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctl.resyncs_requested(), 1);
    }

    #[test]
    fn test_mismatch_across_resync_escalates() {
        let mut ctl = ReconciliationController::new();
        ctl.record("XBT/USD", result(false));
        ctl.reset();

        match ctl.record("XBT/USD", result(false)) {
            Verdict::Resync {
                integrity: Some(err),
                ..
            } => {
                assert_eq!(err.failed_cycles, 2);
                assert_eq!(err.pair, "XBT/USD");
                assert_eq!(err.computed, "200");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctl.resyncs_requested(), 2);
    }

    #[test]
    fn test_valid_result_clears_streak() {
        let mut ctl = ReconciliationController::new();
        ctl.record("XBT/USD", result(false));
        ctl.record("XBT/USD", result(true));
        match ctl.record("XBT/USD", result(false)) {
            Verdict::Resync { integrity, .. } => assert!(integrity.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reset_drops_last_verification() {
        let mut ctl = ReconciliationController::with_integrity_threshold(3);
        ctl.record("XBT/USD", result(false));
        ctl.reset();
        assert!(ctl.last_verification().is_none());
        assert_eq!(ctl.failure_streak(), 1);
        assert_eq!(ctl.integrity_threshold(), 3);
    }
}

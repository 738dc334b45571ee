//! Outcome and summary types for the digest job

use serde::Serialize;

/// Per-project result of one dispatch evaluation.
///
/// Every outcome, sent or skipped, advances the schedule pointer. That
/// is a design decision, not an oversight: forward progress is preferred
/// over retrying, at the cost of never replaying a skipped window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one eligible recipient existed and sends were attempted.
    Sent,
    /// The window fell behind the staleness threshold; nothing was
    /// queried or sent.
    SkippedStale,
    /// Nobody opted in, or nobody who opted in was eligible.
    SkippedNoRecipients,
    /// The owning organization no longer exists.
    SkippedNoOrganization,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "sent",
            DispatchOutcome::SkippedStale => "stale window",
            DispatchOutcome::SkippedNoRecipients => "no eligible recipients",
            DispatchOutcome::SkippedNoOrganization => "organization missing",
        }
    }
}

/// Terminal result of one digest run.
///
/// Lock contention, a disabled job and an absent notifier all produce a
/// successful no-op summary; only propagated collaborator failures and
/// renewal loss surface as errors.
#[derive(Debug, Clone, Serialize)]
pub struct DigestRunSummary {
    pub message: String,
    pub pages: u32,
    pub sent: u64,
    pub skipped_stale: u64,
    pub skipped_no_recipients: u64,
    pub skipped_no_organization: u64,
    /// Schedule pointers durably advanced during this run.
    pub advanced: u64,
    pub cancelled: bool,
}

impl DigestRunSummary {
    pub fn noop(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pages: 0,
            sent: 0,
            skipped_stale: 0,
            skipped_no_recipients: 0,
            skipped_no_organization: 0,
            advanced: 0,
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::SkippedStale => self.skipped_stale += 1,
            DispatchOutcome::SkippedNoRecipients => self.skipped_no_recipients += 1,
            DispatchOutcome::SkippedNoOrganization => self.skipped_no_organization += 1,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_stale + self.skipped_no_recipients + self.skipped_no_organization
    }

    pub fn processed(&self) -> u64 {
        self.sent + self.skipped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_buckets_each_outcome() {
        let mut summary = DigestRunSummary::noop("test");
        summary.record(DispatchOutcome::Sent);
        summary.record(DispatchOutcome::SkippedStale);
        summary.record(DispatchOutcome::SkippedNoRecipients);
        summary.record(DispatchOutcome::SkippedNoOrganization);
        summary.record(DispatchOutcome::SkippedStale);

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped_stale, 2);
        assert_eq!(summary.skipped_no_recipients, 1);
        assert_eq!(summary.skipped_no_organization, 1);
        assert_eq!(summary.skipped(), 4);
        assert_eq!(summary.processed(), 5);
    }

    #[test]
    fn only_sent_counts_as_sent() {
        assert!(DispatchOutcome::Sent.is_sent());
        assert!(!DispatchOutcome::SkippedStale.is_sent());
        assert!(!DispatchOutcome::SkippedNoRecipients.is_sent());
        assert!(!DispatchOutcome::SkippedNoOrganization.is_sent());
    }
}

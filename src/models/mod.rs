//! Domain models for the daily digest job
//!
//! These are plain data carriers shared between the repository seam and
//! the dispatch/runner services. Nothing here talks to storage; the
//! schedule pointer on [`Project`] is only ever moved by the repository's
//! bulk advance call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A project subscribed to periodic activity digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// End instant of the next digest window (the schedule pointer).
    /// Monotonic; advanced in one-day steps, never rewound.
    pub next_window_end: DateTime<Utc>,
    /// Per-member notification preferences, keyed by member id.
    pub notification_settings: HashMap<Uuid, MemberNotificationSettings>,
}

impl Project {
    /// Member ids that opted into the daily digest for this project.
    pub fn digest_subscribers(&self) -> Vec<Uuid> {
        self.notification_settings
            .iter()
            .filter(|(_, settings)| settings.daily_digest)
            .map(|(member_id, _)| *member_id)
            .collect()
    }
}

/// Notification preferences a member holds for a single project.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemberNotificationSettings {
    pub daily_digest: bool,
}

/// An organization member who may receive digest emails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub email_notifications_enabled: bool,
    pub organization_ids: HashSet<Uuid>,
}

impl Member {
    /// A member is eligible for a project's digest iff their email is
    /// verified, email notifications are enabled, and they belong to the
    /// project's owning organization.
    pub fn can_receive_digest(&self, organization_id: Uuid) -> bool {
        self.email_verified
            && self.email_notifications_enabled
            && self.organization_ids.contains(&organization_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}

/// The one-day half-open interval `[start, end)` a digest summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DigestWindow {
    /// Derive the window preceding a schedule pointer: the day ending one
    /// second before `next_window_end`. The start is always computed from
    /// the pointer, never chosen independently.
    pub fn preceding(next_window_end: DateTime<Utc>) -> Self {
        Self {
            start: next_window_end - Duration::days(1),
            end: next_window_end - Duration::seconds(1),
        }
    }

    /// Whether the window start has fallen behind the staleness threshold.
    /// Stale windows are skipped without querying metrics or recipients.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.start < now - threshold
    }
}

/// Aggregated activity for one project over one digest window.
///
/// Computed fresh per run; never persisted by this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestMetrics {
    pub total: u64,
    pub unique_count: u64,
    pub new_count: u64,
    pub has_activity: bool,
}

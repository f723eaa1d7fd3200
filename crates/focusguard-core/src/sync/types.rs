//! Shared timer state: the cross-device canonical record of "is a session
//! active now".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The single source of truth shared by every device of one user.
///
/// Never deleted, only toggled. Every mutation stamps `last_modified_by` /
/// `last_modified_at` so concurrent writers can be attributed; conflicts are
/// resolved last-write-wins by timestamp (see `reconcile`).
///
/// When `is_active` is false the start/end/duration fields are logically
/// stale and must not drive any countdown. When `is_active` is true,
/// `end_time` is always present; expiry (`now >= end_time`) is a *derived*
/// condition -- readers treat an expired-but-still-active record as "session
/// over" without waiting for a deactivating write to land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedTimerState {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub planned_duration_secs: Option<u64>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
}

impl SharedTimerState {
    /// Freshly created records are inactive.
    pub fn inactive(user_id: impl Into<String>, device_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            is_active: false,
            start_time: None,
            end_time: None,
            planned_duration_secs: None,
            last_modified_by: device_id.to_string(),
            last_modified_at: now,
        }
    }

    pub fn activate(
        &mut self,
        start: DateTime<Utc>,
        planned_duration_secs: u64,
        device_id: &str,
        now: DateTime<Utc>,
    ) {
        self.is_active = true;
        self.start_time = Some(start);
        self.end_time = Some(start + Duration::seconds(planned_duration_secs as i64));
        self.planned_duration_secs = Some(planned_duration_secs);
        self.stamp(device_id, now);
    }

    pub fn deactivate(&mut self, device_id: &str, now: DateTime<Utc>) {
        self.is_active = false;
        self.stamp(device_id, now);
    }

    /// Push `end_time` forward. Rejected (returns false) when inactive.
    pub fn extend(&mut self, added_secs: u64, device_id: &str, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        let Some(end) = self.end_time else {
            return false;
        };
        self.end_time = Some(end + Duration::seconds(added_secs as i64));
        self.planned_duration_secs = self.planned_duration_secs.map(|d| d + added_secs);
        self.stamp(device_id, now);
        true
    }

    fn stamp(&mut self, device_id: &str, now: DateTime<Utc>) {
        self.last_modified_by = device_id.to_string();
        self.last_modified_at = now;
    }

    /// Derived: active record whose end has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.is_active, self.end_time) {
            (true, Some(end)) => now >= end,
            _ => false,
        }
    }

    /// `max(0, end - now)`; zero when inactive or end is missing.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_active {
            return 0;
        }
        self.end_time
            .map(|end| (end - now).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Last-write-wins ordering against another copy of the same record.
    pub fn newer_than(&self, other: &SharedTimerState) -> bool {
        self.last_modified_at > other.last_modified_at
    }
}

/// What this device currently believes, from its own countdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTimerView {
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl LocalTimerView {
    pub fn idle() -> Self {
        Self {
            is_active: false,
            start_time: None,
            end_time: None,
        }
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_active {
            return 0;
        }
        self.end_time
            .map(|end| (end - now).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Where the authoritative answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSource {
    Remote,
    Local,
}

/// The one reconciled answer a device acts on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeView {
    pub is_active: bool,
    pub remaining_secs: u64,
    pub end_time: Option<DateTime<Utc>>,
    pub source: ViewSource,
}

impl AuthoritativeView {
    pub fn inactive(source: ViewSource) -> Self {
        Self {
            is_active: false,
            remaining_secs: 0,
            end_time: None,
            source,
        }
    }
}

/// Sync-layer errors. Recovered locally and logged, never surfaced as a
/// blocking error mid-session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    #[error("remote store rejected the write: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn activate_sets_end_and_stamps() {
        let mut state = SharedTimerState::inactive("user-1", "dev-a", t0());
        state.activate(t0(), 1500, "dev-a", t0());

        assert!(state.is_active);
        assert_eq!(state.end_time, Some(t0() + Duration::seconds(1500)));
        assert_eq!(state.last_modified_by, "dev-a");
        assert_eq!(state.remaining_secs(t0() + Duration::seconds(500)), 1000);
    }

    #[test]
    fn expiry_is_derived_not_stored() {
        let mut state = SharedTimerState::inactive("user-1", "dev-a", t0());
        state.activate(t0(), 60, "dev-a", t0());

        assert!(!state.is_expired(t0() + Duration::seconds(59)));
        assert!(state.is_expired(t0() + Duration::seconds(60)));
        // The stored flag has not changed.
        assert!(state.is_active);
        assert_eq!(state.remaining_secs(t0() + Duration::seconds(90)), 0);
    }

    #[test]
    fn extend_rejected_when_inactive() {
        let mut state = SharedTimerState::inactive("user-1", "dev-a", t0());
        assert!(!state.extend(300, "dev-a", t0()));

        state.activate(t0(), 600, "dev-a", t0());
        assert!(state.extend(300, "dev-b", t0() + Duration::seconds(10)));
        assert_eq!(state.end_time, Some(t0() + Duration::seconds(900)));
        assert_eq!(state.planned_duration_secs, Some(900));
        assert_eq!(state.last_modified_by, "dev-b");
    }

    #[test]
    fn newer_than_orders_by_modification_time() {
        let mut a = SharedTimerState::inactive("user-1", "dev-a", t0());
        let mut b = a.clone();
        a.deactivate("dev-a", t0() + Duration::seconds(5));
        b.activate(t0(), 60, "dev-b", t0() + Duration::seconds(9));
        assert!(b.newer_than(&a));
        assert!(!a.newer_than(&b));
    }
}

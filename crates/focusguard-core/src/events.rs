//! Domain events emitted by the session timer and service layer.
//!
//! Every state change produces an `Event`. The GUI polls for events; the CLI
//! prints them; gamification and analytics consume them downstream.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        planned_duration_secs: u64,
        strict: bool,
        blocked_count: usize,
        at: DateTime<Utc>,
    },
    /// Planned duration elapsed; the session completed on its own.
    SessionCompleted {
        session_id: String,
        actual_duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// Session ended early. For strict sessions `exit_price` carries the fee
    /// that was charged.
    SessionCancelled {
        session_id: String,
        actual_duration_secs: u64,
        exit_price: Option<Decimal>,
        at: DateTime<Utc>,
    },
    SessionExtended {
        session_id: String,
        added_secs: u64,
        new_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Another device deactivated the shared timer; this device stopped its
    /// local countdown and enforcement in response.
    RemoteStopApplied {
        stopped_by: String,
        at: DateTime<Utc>,
    },
    EnforcementStarted {
        item_count: usize,
        at: DateTime<Utc>,
    },
    EnforcementStopped {
        at: DateTime<Utc>,
    },
    /// Post-session regret-prevention window re-armed.
    RegretWindowArmed {
        anchor: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::SessionCompleted { at, .. }
            | Event::SessionCancelled { at, .. }
            | Event::SessionExtended { at, .. }
            | Event::RemoteStopApplied { at, .. }
            | Event::EnforcementStarted { at, .. }
            | Event::EnforcementStopped { at }
            | Event::RegretWindowArmed { at, .. } => *at,
        }
    }
}

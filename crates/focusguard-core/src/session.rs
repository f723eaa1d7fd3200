//! The focus-session record and its timer state machine.
//!
//! The timer is a wall-clock-based state machine in the same mold as the rest
//! of the core: no internal threads, no sleeping. The caller invokes
//! [`SessionTimer::tick`] periodically with `now`, and the machine derives
//! everything from timestamps. Ticking is what drives auto-completion -- a
//! session whose planned duration has elapsed completes even if the user
//! never touches the device again.
//!
//! ```text
//! Idle -> Running -> (Completed | Cancelled) -> Idle
//! ```
//!
//! Terminal transitions hand back a finished [`Session`] record; the machine
//! itself returns to `Idle`. Ending a *strict* session consults the
//! commitment policy and, when the exit is available, records the charged
//! exit in the same call -- callers cannot sequence the charge and the end
//! separately and get them out of step.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::commitment::{emergency_exit_status, CommitmentConfig, EmergencyExitStatus};
use crate::error::CoreError;

/// One focus attempt. Created at session start, mutated exactly once at
/// termination, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    /// Set iff the session has terminated (completed or cancelled).
    pub end_time: Option<DateTime<Utc>>,
    pub planned_duration_secs: u64,
    /// Set only at termination; never negative.
    pub actual_duration_secs: Option<u64>,
    pub was_completed: bool,
    pub blocked_items: Vec<String>,
    pub mode: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn planned_end(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.planned_duration_secs as i64)
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Parameters for starting a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSession {
    pub user_id: String,
    pub device_id: String,
    pub planned_duration_secs: u64,
    pub strict: bool,
    pub blocked_items: Vec<String>,
    pub mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
}

/// The running-session payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningSession {
    pub session: Session,
    pub is_strict: bool,
}

/// Result of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    /// Still running; remaining wall-clock seconds.
    Running { remaining_secs: u64 },
    /// Planned duration elapsed; the machine auto-completed.
    Completed(Session),
}

/// Authoritative lifecycle of a single focus session on this device.
///
/// Serializable so a one-shot caller (the CLI) can persist it between
/// invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTimer {
    running: Option<RunningSession>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        if self.running.is_some() {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn running(&self) -> Option<&RunningSession> {
        self.running.as_ref()
    }

    /// Start a new session. Fails if one is already running.
    pub fn start(&mut self, params: StartSession, now: DateTime<Utc>) -> Result<&Session, CoreError> {
        if self.running.is_some() {
            return Err(CoreError::AlreadyRunning);
        }
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: params.user_id,
            device_id: params.device_id,
            start_time: now,
            end_time: None,
            planned_duration_secs: params.planned_duration_secs,
            actual_duration_secs: None,
            was_completed: false,
            blocked_items: params.blocked_items,
            mode: params.mode,
            created_at: now,
        };
        let running = self.running.insert(RunningSession {
            session,
            is_strict: params.strict,
        });
        Ok(&running.session)
    }

    /// Remaining seconds at `now`, clamped at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.running
            .as_ref()
            .map(|r| (r.session.planned_end() - now).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Drive the machine forward. When the planned duration has elapsed the
    /// session auto-completes without user action; `actual_duration_secs` is
    /// clamped to the planned duration since completion logically occurred at
    /// the planned end, however late the tick arrives.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let remaining = match self.running.as_ref() {
            Some(r) => (r.session.planned_end() - now).num_seconds(),
            None => return TickOutcome::Idle,
        };
        if remaining > 0 {
            return TickOutcome::Running {
                remaining_secs: remaining as u64,
            };
        }
        let Some(mut running) = self.running.take() else {
            return TickOutcome::Idle;
        };
        let planned_end = running.session.planned_end();
        running.session.end_time = Some(planned_end);
        running.session.actual_duration_secs = Some(running.session.planned_duration_secs);
        running.session.was_completed = true;
        TickOutcome::Completed(running.session)
    }

    /// Derived lock state for the running session.
    pub fn exit_status(
        &self,
        now: DateTime<Utc>,
        has_entitlement: bool,
        config: &CommitmentConfig,
    ) -> EmergencyExitStatus {
        match self.running.as_ref() {
            Some(r) => emergency_exit_status(
                r.session.start_time,
                now,
                r.is_strict,
                has_entitlement,
                config,
            ),
            None => EmergencyExitStatus::NotApplicable,
        }
    }

    /// Request early termination.
    ///
    /// Non-strict sessions cancel immediately. Strict sessions consult the
    /// commitment policy: if the exit is not available the call is rejected
    /// with [`CoreError::Locked`] and nothing changes; if it is available,
    /// the exit is recorded against `config` *and* the session is cancelled
    /// in this one call. Both happen or neither. The returned price is the
    /// fee that was charged (None for non-strict sessions).
    pub fn request_end(
        &mut self,
        now: DateTime<Utc>,
        has_entitlement: bool,
        config: &mut CommitmentConfig,
    ) -> Result<(Session, Option<rust_decimal::Decimal>), CoreError> {
        let running = self.running.as_ref().ok_or(CoreError::NotRunning)?;

        let price = if running.is_strict && config.enabled {
            match emergency_exit_status(
                running.session.start_time,
                now,
                true,
                has_entitlement,
                config,
            ) {
                EmergencyExitStatus::Available { price, .. } => {
                    // Charge first, while still holding the running state;
                    // no suspension point can interleave here.
                    config.record_exit(now);
                    Some(price)
                }
                locked => return Err(CoreError::Locked(locked)),
            }
        } else {
            None
        };

        let Some(mut running) = self.running.take() else {
            return Err(CoreError::NotRunning);
        };
        let elapsed = (now - running.session.start_time).num_seconds().max(0) as u64;
        running.session.end_time = Some(now);
        running.session.actual_duration_secs = Some(elapsed);
        running.session.was_completed = false;
        Ok((running.session, price))
    }

    /// Push the planned end forward. No-op when idle.
    pub fn extend(&mut self, added_secs: u64) -> Option<DateTime<Utc>> {
        let running = self.running.as_mut()?;
        running.session.planned_duration_secs += added_secs;
        Some(running.session.planned_end())
    }

    /// Discard the running session without policy checks. Used when a remote
    /// device has already authoritatively stopped the shared timer; the local
    /// record is closed as cancelled.
    pub fn force_stop(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let mut running = self.running.take()?;
        let elapsed = (now - running.session.start_time).num_seconds().max(0) as u64;
        running.session.end_time = Some(now);
        running.session.actual_duration_secs = Some(elapsed.min(running.session.planned_duration_secs));
        running.session.was_completed = false;
        Some(running.session)
    }
}

//! The focus service: one object wiring the timer, the commitment policy,
//! enforcement dispatch, regret windows, and shared-state sync.
//!
//! Every collaborator is injected at construction (no process-wide
//! singletons), so tests substitute the store and the enforcement backend
//! freely. The service is single-threaded per device: callers drive it with
//! `tick`/`refresh_remote` and its state transitions are strictly ordered.
//!
//! Two guarantees worth spelling out:
//!
//! - A failing enforcement backend or unreachable store never stops a focus
//!   session. Blocking and sync are best-effort; the session itself is not.
//! - Ending a strict session charges the exit fee and cancels the session in
//!   one synchronous step, before any suspension point. A second confirm
//!   finds the timer already idle and gets [`CoreError::NotRunning`], so the
//!   counter cannot be charged twice for one exit.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::commitment::{CommitmentConfig, EmergencyExitStatus};
use crate::enforcement::{EnforcementBackend, EnforcementDispatcher};
use crate::error::CoreError;
use crate::events::Event;
use crate::regret::{RegretEvaluator, RegretWindow};
use crate::schedule::{active_schedule, Schedule};
use crate::session::{Session, SessionTimer, StartSession, TickOutcome};
use crate::sync::{LocalTimerView, SharedStateStore, SyncEngine};

/// Options for starting a session through the service.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub duration_secs: u64,
    pub strict: bool,
    pub blocked_items: Vec<String>,
    pub mode: String,
}

pub struct FocusService<S: SharedStateStore> {
    user_id: String,
    device_id: String,
    timer: SessionTimer,
    commitment: CommitmentConfig,
    dispatcher: EnforcementDispatcher,
    regret: RegretEvaluator,
    sync: SyncEngine<S>,
    events: Vec<Event>,
}

impl<S: SharedStateStore> FocusService<S> {
    pub fn new(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        commitment: CommitmentConfig,
        backend: Arc<dyn EnforcementBackend>,
        store: Arc<S>,
    ) -> Self {
        let user_id = user_id.into();
        let device_id = device_id.into();
        Self {
            sync: SyncEngine::new(store, user_id.clone(), device_id.clone()),
            user_id,
            device_id,
            timer: SessionTimer::new(),
            commitment,
            dispatcher: EnforcementDispatcher::new(backend),
            regret: RegretEvaluator::new(),
            events: Vec::new(),
        }
    }

    pub fn commitment(&self) -> &CommitmentConfig {
        &self.commitment
    }

    pub fn is_running(&self) -> bool {
        self.timer.running().is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.sync.is_degraded()
    }

    /// Drain events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn local_view(&self) -> Option<LocalTimerView> {
        self.timer.running().map(|r| LocalTimerView {
            is_active: true,
            start_time: Some(r.session.start_time),
            end_time: Some(r.session.planned_end()),
        })
    }

    /// Start a focus session.
    ///
    /// Enforcement and the remote publish are both best-effort: a missing OS
    /// authorization or an unreachable store leaves the session running
    /// (unblocked / local-only) rather than failing the start.
    pub async fn start_session(
        &mut self,
        options: SessionOptions,
        now: DateTime<Utc>,
    ) -> Result<Session, CoreError> {
        let session = self
            .timer
            .start(
                StartSession {
                    user_id: self.user_id.clone(),
                    device_id: self.device_id.clone(),
                    planned_duration_secs: options.duration_secs,
                    strict: options.strict,
                    blocked_items: options.blocked_items.clone(),
                    mode: options.mode,
                },
                now,
            )?
            .clone();

        self.events.push(Event::SessionStarted {
            session_id: session.id.clone(),
            planned_duration_secs: session.planned_duration_secs,
            strict: options.strict,
            blocked_count: options.blocked_items.len(),
            at: now,
        });

        let block_set: BTreeSet<String> = options.blocked_items.into_iter().collect();
        if !block_set.is_empty() {
            match self.dispatcher.start_enforcement(block_set.clone()).await {
                Ok(()) => self.events.push(Event::EnforcementStarted {
                    item_count: block_set.len(),
                    at: now,
                }),
                Err(CoreError::NotAuthorized) => {
                    // Counter-intuitive but deliberate: the session runs
                    // even when blocking cannot be enacted.
                    warn!("enforcement not authorized; session proceeds unblocked");
                }
                Err(e) => warn!(error = %e, "enforcement start failed"),
            }
        }

        if self.sync.publish_start(&session, now).await.is_err() {
            info!("session running local-only; other devices will not see it");
        }

        Ok(session)
    }

    /// Drive the countdown. Auto-completes the session when its planned
    /// duration has elapsed, even with no user action.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<Session>, CoreError> {
        match self.timer.tick(now) {
            TickOutcome::Completed(session) => {
                self.events.push(Event::SessionCompleted {
                    session_id: session.id.clone(),
                    actual_duration_secs: session.actual_duration_secs.unwrap_or(0),
                    at: now,
                });
                self.finalize(&session, now).await;
                Ok(Some(session))
            }
            _ => Ok(None),
        }
    }

    /// Derived lock state for the running session (UI polls this).
    pub fn exit_status(&self, now: DateTime<Utc>, has_entitlement: bool) -> EmergencyExitStatus {
        self.timer.exit_status(now, has_entitlement, &self.commitment)
    }

    /// Request early termination. Strict sessions are policy-gated; when the
    /// exit is available the fee is recorded and the session cancelled in
    /// the same step.
    pub async fn end_session(
        &mut self,
        now: DateTime<Utc>,
        has_entitlement: bool,
    ) -> Result<Session, CoreError> {
        let (session, price) = self
            .timer
            .request_end(now, has_entitlement, &mut self.commitment)?;
        self.events.push(Event::SessionCancelled {
            session_id: session.id.clone(),
            actual_duration_secs: session.actual_duration_secs.unwrap_or(0),
            exit_price: price,
            at: now,
        });
        self.finalize(&session, now).await;
        Ok(session)
    }

    /// Push the planned end forward on both the local timer and the remote
    /// record. No-op when idle.
    pub async fn extend_session(
        &mut self,
        added_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CoreError> {
        let new_end = self.timer.extend(added_secs).ok_or(CoreError::NotRunning)?;
        let session_id = self
            .timer
            .running()
            .map(|r| r.session.id.clone())
            .unwrap_or_default();
        self.events.push(Event::SessionExtended {
            session_id,
            added_secs,
            new_end,
            at: now,
        });
        if let Err(e) = self.sync.publish_extend(added_secs, now).await {
            warn!(error = %e, "extend not published");
        }
        Ok(new_end)
    }

    /// Reconcile against the remote record (throttled). If another device
    /// authoritatively stopped the shared timer, the local session is torn
    /// down here: countdown stopped, enforcement cleared, record closed as
    /// cancelled.
    pub async fn refresh_remote(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let local = self.local_view();
        let view = self.sync.refresh(local.as_ref(), now).await;

        if !view.is_active && self.timer.running().is_some() {
            if let Some(session) = self.timer.force_stop(now) {
                info!(session_id = %session.id, "remote stop applied");
                self.events.push(Event::RemoteStopApplied {
                    stopped_by: "remote".into(),
                    at: now,
                });
                self.finalize(&session, now).await;
            }
        }
        Ok(())
    }

    /// Schedule-driven enforcement: turn blocking on for the first active
    /// enabled schedule, or off when none is active and no session is
    /// running. Safe to call redundantly; the dispatcher is idempotent.
    ///
    /// `local_now` is the user's wall-clock time (see
    /// [`crate::schedule::local_now`]); schedules are a local-time concept.
    pub async fn refresh_schedules(
        &mut self,
        schedules: &[Schedule],
        local_now: NaiveDateTime,
    ) -> Result<(), CoreError> {
        if let Some(schedule) = active_schedule(schedules, local_now) {
            let items: BTreeSet<String> = schedule.blocked_items.iter().cloned().collect();
            match self.dispatcher.start_enforcement(items).await {
                Ok(()) | Err(CoreError::NotAuthorized) => {}
                Err(e) => warn!(error = %e, schedule = %schedule.name, "schedule enforcement failed"),
            }
        } else if self.timer.running().is_none() {
            self.dispatcher.stop_enforcement().await?;
        }
        Ok(())
    }

    /// Whether a regret-prevention window currently applies. Time-of-day
    /// windows are checked against `local_now`, the user's wall clock.
    pub fn active_regret_window<'a>(
        &self,
        windows: &'a [RegretWindow],
        now: DateTime<Utc>,
        local_now: NaiveDateTime,
    ) -> Option<&'a RegretWindow> {
        self.regret.active_window(windows, now, local_now)
    }

    /// Terminal-transition side effects, shared by every path out of
    /// `Running`: stop enforcement, re-arm the post-session regret anchor,
    /// publish the stop, persist history. All best-effort.
    async fn finalize(&mut self, session: &Session, now: DateTime<Utc>) {
        if let Err(e) = self.dispatcher.stop_enforcement().await {
            warn!(error = %e, "enforcement stop failed");
        } else {
            self.events.push(Event::EnforcementStopped { at: now });
        }

        self.regret.arm(now);
        self.events.push(Event::RegretWindowArmed { anchor: now, at: now });

        if self.sync.publish_stop(now).await.is_err() {
            info!("stop not published; remote record will expire on its own");
        }
        self.sync.save_session_best_effort(session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::testing::RecordingBackend;
    use crate::sync::InMemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap()
    }

    fn service(
        authorized: bool,
    ) -> (
        FocusService<InMemoryStore>,
        Arc<RecordingBackend>,
        Arc<InMemoryStore>,
    ) {
        let backend = Arc::new(RecordingBackend::new(authorized));
        let store = Arc::new(InMemoryStore::new());
        let svc = FocusService::new(
            "user-1",
            "dev-a",
            CommitmentConfig {
                month_anchor: t0(),
                ..Default::default()
            },
            backend.clone(),
            store.clone(),
        );
        (svc, backend, store)
    }

    fn options(duration_secs: u64, strict: bool) -> SessionOptions {
        SessionOptions {
            duration_secs,
            strict,
            blocked_items: vec!["social.example".into()],
            mode: "focus".into(),
        }
    }

    #[tokio::test]
    async fn unauthorized_backend_does_not_block_start() {
        let (mut svc, backend, _) = service(false);
        let session = svc.start_session(options(600, false), t0()).await.unwrap();
        assert!(!session.is_finished());
        assert!(svc.is_running());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn offline_store_degrades_to_local_only() {
        let (mut svc, _, store) = service(true);
        store.set_offline(true);
        svc.start_session(options(600, false), t0()).await.unwrap();
        assert!(svc.is_running());
        assert!(svc.is_degraded());
    }

    #[tokio::test]
    async fn completion_arms_regret_and_tears_down() {
        let (mut svc, backend, store) = service(true);
        svc.start_session(options(60, false), t0()).await.unwrap();

        let done = svc.tick(t0() + Duration::seconds(61)).await.unwrap();
        let session = done.expect("session should auto-complete");
        assert!(session.was_completed);
        assert!(!svc.is_running());

        // Enforcement torn down.
        assert!(matches!(
            backend.calls().last(),
            Some(crate::enforcement::testing::Call::Clear)
        ));
        // Post-session window armed at completion time.
        let windows = vec![RegretWindow::post_session("cooldown", 15)];
        let later = t0() + Duration::seconds(120);
        assert!(svc
            .active_regret_window(&windows, later, later.naive_utc())
            .is_some());
        // History saved.
        assert_eq!(store.saved_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn second_end_confirm_cannot_double_charge() {
        let (mut svc, _, _) = service(true);
        svc.start_session(options(3600, true), t0()).await.unwrap();

        let end_at = t0() + Duration::minutes(6);
        svc.end_session(end_at, true).await.unwrap();
        assert_eq!(svc.commitment().exits_used_this_month, 1);

        // The confirm dialog fires again: timer is idle, nothing is charged.
        assert!(matches!(
            svc.end_session(end_at, true).await,
            Err(CoreError::NotRunning)
        ));
        assert_eq!(svc.commitment().exits_used_this_month, 1);
    }

    #[tokio::test]
    async fn remote_stop_tears_down_local_session() {
        let (mut svc, backend, store) = service(true);
        svc.start_session(options(600, false), t0()).await.unwrap();

        // Another device deactivates the shared record.
        let mut remote = store
            .read_timer_state("user-1")
            .await
            .unwrap()
            .expect("start was published");
        remote.deactivate("dev-b", t0() + Duration::seconds(30));
        store.write_timer_state(&remote).await.unwrap();

        // Next refresh past the throttle applies the stop.
        svc.refresh_remote(t0() + Duration::seconds(60)).await.unwrap();
        assert!(!svc.is_running());
        assert!(matches!(
            backend.calls().last(),
            Some(crate::enforcement::testing::Call::Clear)
        ));
        let events = svc.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::RemoteStopApplied { .. })));
    }

    #[tokio::test]
    async fn schedule_refresh_is_idempotent() {
        let (mut svc, backend, _) = service(true);
        let mut schedule = crate::schedule::Schedule::new(
            "work",
            crate::schedule::ClockTime::new(9, 0).unwrap(),
            crate::schedule::ClockTime::new(17, 0).unwrap(),
        );
        schedule.days = crate::schedule::parse_days("mon").unwrap();
        schedule.blocked_items.insert("social.example".into());

        // 2026-08-10 is a Monday.
        let during = chrono::NaiveDate::from_ymd_opt(2026, 8, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let schedules = vec![schedule];
        svc.refresh_schedules(&schedules, during).await.unwrap();
        svc.refresh_schedules(&schedules, during).await.unwrap();
        assert_eq!(backend.calls().len(), 1);

        // Window over: enforcement stops.
        let after = chrono::NaiveDate::from_ymd_opt(2026, 8, 10)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        svc.refresh_schedules(&schedules, after).await.unwrap();
        assert_eq!(backend.calls().len(), 2);
        assert!(matches!(
            backend.calls().last(),
            Some(crate::enforcement::testing::Call::Clear)
        ));
    }
}

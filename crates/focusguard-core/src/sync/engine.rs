//! Sync engine: keeps one device's timer and the remote record converging.
//!
//! The engine never blocks local ticking -- every remote round-trip is an
//! async call the caller awaits separately from its sub-second countdown, and
//! every failure degrades to local-only operation instead of surfacing
//! mid-session. Authoritative reconciliation against the remote is throttled
//! to a coarse interval; between reads the engine reconciles against its last
//! remote snapshot.
//!
//! Each remote read is tagged with the local state version it was issued
//! against. A read that resolves after a newer local action (user tapped
//! "end" while the round-trip was outstanding) is discarded rather than
//! applied over the newer state.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::reconcile::reconcile;
use super::store::SharedStateStore;
use super::types::{AuthoritativeView, LocalTimerView, SharedTimerState, SyncError};
use crate::session::Session;

pub struct SyncEngine<S: SharedStateStore> {
    store: Arc<S>,
    user_id: String,
    device_id: String,
    /// Bumped on every local mutation; stale remote reads are discarded.
    state_version: u64,
    /// Set when a remote write failed and the session runs local-only.
    degraded: bool,
    /// Last remote snapshot successfully read or written.
    cached_remote: Option<SharedTimerState>,
    last_refresh: Option<DateTime<Utc>>,
    refresh_interval: Duration,
}

impl<S: SharedStateStore> SyncEngine<S> {
    pub fn new(store: Arc<S>, user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            device_id: device_id.into(),
            state_version: 0,
            degraded: false,
            cached_remote: None,
            last_refresh: None,
            refresh_interval: Duration::seconds(15),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Whether the current session is running local-only after a failed
    /// remote write.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Publish a session start. On failure the caller keeps its local timer;
    /// the session is simply invisible to other devices until connectivity
    /// returns.
    pub async fn publish_start(
        &mut self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        self.state_version += 1;
        let mut state = match self.store.read_timer_state(&self.user_id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => SharedTimerState::inactive(&self.user_id, &self.device_id, now),
            Err(e) => {
                self.degraded = true;
                warn!(error = %e, "start not published; running local-only");
                return Err(e);
            }
        };
        state.activate(
            session.start_time,
            session.planned_duration_secs,
            &self.device_id,
            now,
        );
        self.write(state, now).await
    }

    /// Publish a stop (completion or cancellation).
    pub async fn publish_stop(&mut self, now: DateTime<Utc>) -> Result<(), SyncError> {
        self.state_version += 1;
        let mut state = match self.store.read_timer_state(&self.user_id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => SharedTimerState::inactive(&self.user_id, &self.device_id, now),
            Err(e) => {
                self.degraded = true;
                warn!(error = %e, "stop not published");
                return Err(e);
            }
        };
        state.deactivate(&self.device_id, now);
        self.write(state, now).await
    }

    /// Publish an extension. Returns `Ok(false)` when the remote timer is
    /// not active (the extend is rejected as a no-op).
    pub async fn publish_extend(
        &mut self,
        added_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        self.state_version += 1;
        let mut state = match self.store.read_timer_state(&self.user_id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return Ok(false),
            Err(e) => {
                self.degraded = true;
                warn!(error = %e, "extend not published");
                return Err(e);
            }
        };
        if !state.extend(added_secs, &self.device_id, now) {
            return Ok(false);
        }
        self.write(state, now).await?;
        Ok(true)
    }

    /// Save a finished session to history. Fire-and-forget: failures are
    /// logged, never propagated.
    pub async fn save_session_best_effort(&self, session: &Session) {
        if let Err(e) = self.store.save_session(session).await {
            warn!(error = %e, session_id = %session.id, "session history not persisted");
        }
    }

    /// Reconcile against the remote, reading it at most once per refresh
    /// interval. Between reads, reconciliation runs against the last remote
    /// snapshot, so a just-applied remote stop keeps winning locally.
    pub async fn refresh(
        &mut self,
        local: Option<&LocalTimerView>,
        now: DateTime<Utc>,
    ) -> AuthoritativeView {
        let due = match self.last_refresh {
            Some(last) => now - last >= self.refresh_interval,
            None => true,
        };
        if due {
            self.read_remote(now).await;
        }
        reconcile(local, self.cached_remote.as_ref(), now)
    }

    /// Reconcile with an immediate remote read, ignoring the throttle. Used
    /// on app-foreground events.
    pub async fn refresh_now(
        &mut self,
        local: Option<&LocalTimerView>,
        now: DateTime<Utc>,
    ) -> AuthoritativeView {
        self.read_remote(now).await;
        reconcile(local, self.cached_remote.as_ref(), now)
    }

    async fn read_remote(&mut self, now: DateTime<Utc>) {
        let issued_against = self.state_version;
        match self.store.read_timer_state(&self.user_id).await {
            Ok(remote) => {
                if self.state_version != issued_against {
                    // A local action landed while the read was in flight;
                    // this snapshot is stale.
                    debug!("discarding stale remote read");
                    return;
                }
                self.cached_remote = remote;
                self.last_refresh = Some(now);
                if self.degraded {
                    info!("remote store reachable again");
                    self.degraded = false;
                }
            }
            Err(e) => {
                // Degraded-but-functional: local countdown carries on.
                debug!(error = %e, "remote read failed; using last snapshot");
            }
        }
    }

    async fn write(&mut self, state: SharedTimerState, now: DateTime<Utc>) -> Result<(), SyncError> {
        match self.store.write_timer_state(&state).await {
            Ok(()) => {
                self.degraded = false;
                self.cached_remote = Some(state);
                self.last_refresh = Some(now);
                Ok(())
            }
            Err(e) => {
                self.degraded = true;
                warn!(error = %e, "shared-state write failed");
                Err(e)
            }
        }
    }
}

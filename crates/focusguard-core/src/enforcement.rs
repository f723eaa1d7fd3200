//! Enforcement dispatch boundary.
//!
//! The core decides *what* gets blocked and *when*; the OS-level backend
//! decides *how*. Platform backends (screen-time APIs, content filters) all
//! implement [`EnforcementBackend`]; the core only ever talks to the
//! [`EnforcementDispatcher`], which tracks enforcement start/stop
//! idempotently. Multiple upstream triggers (session start, schedule
//! activation) may call it redundantly, so repeated starts with the same set
//! and repeated stops are no-ops.
//!
//! Missing OS authorization is reported as [`CoreError::NotAuthorized`] but
//! never prevents a session from running: blocking is best-effort, not a
//! precondition for focusing.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::error::CoreError;

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("backend rejected the block set: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Platform blocking capability, selected at startup.
#[async_trait]
pub trait EnforcementBackend: Send + Sync {
    /// Whether the OS has granted blocking permission.
    fn is_authorized(&self) -> bool;

    /// Replace the active block set.
    async fn apply_blocking(&self, items: &BTreeSet<String>) -> Result<(), EnforcementError>;

    /// Remove all blocking.
    async fn clear_blocking(&self) -> Result<(), EnforcementError>;
}

/// Idempotent wrapper around a backend.
pub struct EnforcementDispatcher {
    backend: Arc<dyn EnforcementBackend>,
    active: Option<BTreeSet<String>>,
}

impl EnforcementDispatcher {
    pub fn new(backend: Arc<dyn EnforcementBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Whether enforcement is currently on.
    pub fn is_enforcing(&self) -> bool {
        self.active.is_some()
    }

    /// Enable blocking for `items`. Calling again with the same set is a
    /// no-op; a different set is applied as a replacement.
    pub async fn start_enforcement(&mut self, items: BTreeSet<String>) -> Result<(), CoreError> {
        if self.active.as_ref() == Some(&items) {
            debug!(count = items.len(), "enforcement already active for set");
            return Ok(());
        }
        if !self.backend.is_authorized() {
            return Err(CoreError::NotAuthorized);
        }
        self.backend.apply_blocking(&items).await?;
        debug!(count = items.len(), "enforcement started");
        self.active = Some(items);
        Ok(())
    }

    /// Disable blocking. No-op when already stopped.
    pub async fn stop_enforcement(&mut self) -> Result<(), CoreError> {
        if self.active.is_none() {
            return Ok(());
        }
        if self.backend.is_authorized() {
            if let Err(e) = self.backend.clear_blocking().await {
                debug!(error = %e, "backend clear failed; dropping local state anyway");
            }
        }
        self.active = None;
        debug!("enforcement stopped");
        Ok(())
    }
}

/// Backend that blocks nothing; used when no platform capability exists.
pub struct NullBackend;

#[async_trait]
impl EnforcementBackend for NullBackend {
    fn is_authorized(&self) -> bool {
        true
    }

    async fn apply_blocking(&self, _items: &BTreeSet<String>) -> Result<(), EnforcementError> {
        Ok(())
    }

    async fn clear_blocking(&self) -> Result<(), EnforcementError> {
        Ok(())
    }
}

/// Test helpers. Public so integration tests can observe backend calls.
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Apply(BTreeSet<String>),
        Clear,
    }

    /// Records every backend call; optionally reports as unauthorized.
    pub struct RecordingBackend {
        pub authorized: bool,
        pub calls: Mutex<Vec<Call>>,
    }

    impl RecordingBackend {
        pub fn new(authorized: bool) -> Self {
            Self {
                authorized,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EnforcementBackend for RecordingBackend {
        fn is_authorized(&self) -> bool {
            self.authorized
        }

        async fn apply_blocking(&self, items: &BTreeSet<String>) -> Result<(), EnforcementError> {
            self.calls.lock().unwrap().push(Call::Apply(items.clone()));
            Ok(())
        }

        async fn clear_blocking(&self) -> Result<(), EnforcementError> {
            self.calls.lock().unwrap().push(Call::Clear);
            Ok(())
        }
    }
}

//! Reconciliation of the local countdown against the remote record.
//!
//! The policy, in order:
//!
//! 1. Remote active and unexpired: remote wins. Cross-device authority -- the
//!    local view is discarded in favor of the remote remaining time.
//! 2. Remote active but expired: the session is over. Expiry is derived; no
//!    deactivating write is waited for.
//! 3. Remote inactive: remote wins even if the local timer still believes it
//!    is running. Another device issued an authoritative stop; the caller
//!    must tear down its countdown and enforcement on this answer. The one
//!    exception: a record last written *before* the local session started
//!    cannot have stopped it (this happens on reconnect after a local-only
//!    start), so the local session survives.
//! 4. Remote absent (offline / never created): fall back to the local view.
//!
//! There is no causal merge. Writes are last-write-wins by
//! `last_modified_at`, so two devices starting sessions concurrently resolve
//! to whichever write lands last -- an accepted limitation of the design, not
//! a bug to paper over.

use chrono::{DateTime, Utc};

use super::types::{AuthoritativeView, LocalTimerView, SharedTimerState, ViewSource};

/// Produce the one view a device acts on.
pub fn reconcile(
    local: Option<&LocalTimerView>,
    remote: Option<&SharedTimerState>,
    now: DateTime<Utc>,
) -> AuthoritativeView {
    if let Some(remote) = remote {
        if remote.is_active && !remote.is_expired(now) {
            return AuthoritativeView {
                is_active: true,
                remaining_secs: remote.remaining_secs(now),
                end_time: remote.end_time,
                source: ViewSource::Remote,
            };
        }
        // Inactive, or active-but-expired: either way the session is over
        // from the remote's point of view. That verdict only covers sessions
        // the record could know about: a local session started after the
        // record's last write (begun while the store was unreachable) is not
        // stopped by a stale record.
        let local_is_newer = local.is_some_and(|l| {
            l.is_active && l.start_time.is_some_and(|s| s > remote.last_modified_at)
        });
        if !local_is_newer {
            return AuthoritativeView::inactive(ViewSource::Remote);
        }
    }

    match local {
        Some(local) if local.is_active => AuthoritativeView {
            is_active: local.remaining_secs(now) > 0,
            remaining_secs: local.remaining_secs(now),
            end_time: local.end_time,
            source: ViewSource::Local,
        },
        _ => AuthoritativeView::inactive(ViewSource::Local),
    }
}

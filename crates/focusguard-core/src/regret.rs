//! Regret-prevention windows: auto-triggered protection periods independent
//! of the main session timer.
//!
//! Two variants exist, each with exactly one evaluation path:
//!
//! - Clock-time ranges delegate to [`TimeWindow`] and, unlike schedules, may
//!   wrap across midnight (late-night doomscrolling is the canonical case).
//!   Like schedules, they are checked against the user's local wall clock,
//!   which the caller supplies alongside the instant.
//! - Post-session windows are anchored to "time since last session end". The
//!   entity cannot evaluate itself; the anchor lives in the evaluator and is
//!   re-armed by the session lifecycle on every termination.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{ClockTime, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegretWindowKind {
    /// Active whenever the wall clock falls in the range. Overnight
    /// wraparound supported.
    TimeOfDay { window: TimeWindow },
    /// Active for a fixed duration after the last session ended.
    PostSession { duration_minutes: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegretWindow {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: RegretWindowKind,
}

fn default_true() -> bool {
    true
}

impl RegretWindow {
    pub fn time_of_day(name: impl Into<String>, start: ClockTime, end: ClockTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            enabled: true,
            kind: RegretWindowKind::TimeOfDay {
                window: TimeWindow::new(start, end),
            },
        }
    }

    pub fn post_session(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            enabled: true,
            kind: RegretWindowKind::PostSession { duration_minutes },
        }
    }
}

/// Evaluates regret windows against the clock and the post-session anchor.
///
/// Owns the anchor because the post-session variant is not self-computable:
/// the session lifecycle calls [`arm`](RegretEvaluator::arm) on every
/// terminal transition, re-arming protection regardless of whether a
/// time-of-day window also happens to be active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegretEvaluator {
    last_session_end: Option<DateTime<Utc>>,
}

impl RegretEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-anchor the post-session countdown at `now`.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.last_session_end = Some(now);
    }

    pub fn last_session_end(&self) -> Option<DateTime<Utc>> {
        self.last_session_end
    }

    fn window_active(
        &self,
        window: &RegretWindow,
        now: DateTime<Utc>,
        local_now: NaiveDateTime,
    ) -> bool {
        if !window.enabled {
            return false;
        }
        match &window.kind {
            RegretWindowKind::TimeOfDay { window } => {
                window.contains(ClockTime::from_naive(local_now.time()))
            }
            RegretWindowKind::PostSession { duration_minutes } => {
                match self.last_session_end {
                    Some(anchor) => {
                        let elapsed = (now - anchor).num_seconds();
                        elapsed >= 0 && (elapsed as u64) < *duration_minutes as u64 * 60
                    }
                    None => false,
                }
            }
        }
    }

    /// First enabled, currently-active window in order, if any.
    ///
    /// `now` anchors the post-session countdown; `local_now` is the wall
    /// clock the time-of-day variants are checked against (see
    /// [`crate::schedule::local_now`]).
    pub fn active_window<'a>(
        &self,
        windows: &'a [RegretWindow],
        now: DateTime<Utc>,
        local_now: NaiveDateTime,
    ) -> Option<&'a RegretWindow> {
        windows.iter().find(|w| self.window_active(w, now, local_now))
    }
}

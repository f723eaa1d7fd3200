//! Strict-mode commitment policy and escalating emergency-exit pricing.
//!
//! A strict session cannot be ended early until a minimum commitment time has
//! elapsed, and ending it then costs money. The price doubles (by a
//! configurable multiplier) with each exit used inside the current calendar
//! month, capped at a ceiling, and resets when a new month begins.
//!
//! Two rules matter more than anything else here:
//!
//! - Reading the price never mutates state. The monthly rollover is applied
//!   lazily while computing, because the config may be read after months of
//!   dormancy and there is no background job to reset it.
//! - [`record_exit`](CommitmentConfig::record_exit) is the only mutation of
//!   the exit counter, and it is deliberately not idempotent: calling it twice
//!   charges twice. Callers guarantee at-most-one invocation per confirmed
//!   exit.
//!
//! Prices use [`rust_decimal::Decimal`]; binary floats would accumulate
//! rounding artifacts on currency. The power is applied as repeated exact
//! multiplication from the base, never compounded on a previously displayed
//! price.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pricing knobs for emergency exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitPricing {
    pub base_price: Decimal,
    pub multiplier: Decimal,
    pub cap: Decimal,
}

impl Default for ExitPricing {
    fn default() -> Self {
        Self {
            base_price: Decimal::new(200, 2),  // 2.00
            multiplier: Decimal::new(20, 1),   // 2.0
            cap: Decimal::new(5000, 2),        // 50.00
        }
    }
}

/// Per-user strict-mode configuration.
///
/// Persisted locally (see `storage::config`) so the monthly exit counter
/// survives restarts. Whether the counter should be account-wide instead of
/// per-device is an open product question; per-device is what ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Minimum focus time before any exit is possible.
    #[serde(default = "default_minimum_minutes")]
    pub minimum_commitment_minutes: u32,
    /// Exits used inside the month anchored at `month_anchor`.
    #[serde(default)]
    pub exits_used_this_month: u32,
    /// Start of the month the counter is anchored to.
    #[serde(default = "Utc::now")]
    pub month_anchor: DateTime<Utc>,
    /// When false, strict sessions have no escape at all.
    #[serde(default = "default_enabled")]
    pub allow_exits: bool,
    /// When true, exits additionally require a premium entitlement.
    #[serde(default)]
    pub require_entitlement: bool,
    #[serde(default)]
    pub pricing: ExitPricing,
}

fn default_enabled() -> bool {
    true
}

fn default_minimum_minutes() -> u32 {
    5
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum_commitment_minutes: default_minimum_minutes(),
            exits_used_this_month: 0,
            month_anchor: Utc::now(),
            allow_exits: true,
            require_entitlement: false,
            pricing: ExitPricing::default(),
        }
    }
}

/// Derived lock state for a running strict session. Never persisted;
/// recomputed on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmergencyExitStatus {
    /// Session is not strict (or strict mode is disabled).
    NotApplicable,
    /// Minimum commitment not yet reached.
    LockedInsufficientCommitment { remaining_secs: u64 },
    /// Commitment met, but the policy requires an entitlement the user lacks.
    LockedRequiresEntitlement,
    /// This policy never allows an exit.
    LockedNoEscape,
    /// Exit is available at the quoted price.
    Available {
        focused_minutes: u64,
        price: Decimal,
    },
}

impl std::fmt::Display for EmergencyExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmergencyExitStatus::NotApplicable => write!(f, "not a strict session"),
            EmergencyExitStatus::LockedInsufficientCommitment { remaining_secs } => {
                write!(f, "minimum commitment not reached ({remaining_secs}s remaining)")
            }
            EmergencyExitStatus::LockedRequiresEntitlement => {
                write!(f, "emergency exit requires a premium entitlement")
            }
            EmergencyExitStatus::LockedNoEscape => write!(f, "this session has no escape"),
            EmergencyExitStatus::Available { price, .. } => {
                write!(f, "exit available for {price}")
            }
        }
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

impl CommitmentConfig {
    pub fn minimum_commitment_secs(&self) -> u64 {
        self.minimum_commitment_minutes as u64 * 60
    }

    /// Exit count with the monthly rollover applied lazily: a counter
    /// anchored in a prior month reads as zero. Read-only.
    pub fn effective_exit_count(&self, now: DateTime<Utc>) -> u32 {
        if same_month(self.month_anchor, now) {
            self.exits_used_this_month
        } else {
            0
        }
    }

    /// Current exit price: `min(base * multiplier^n, cap)` where `n` is the
    /// effective (rolled-over) exit count. Does not mutate.
    pub fn current_price(&self, now: DateTime<Utc>) -> Decimal {
        let n = self.effective_exit_count(now);
        let mut price = self.pricing.base_price;
        for _ in 0..n {
            price *= self.pricing.multiplier;
            if price >= self.pricing.cap {
                return self.pricing.cap;
            }
        }
        price.min(self.pricing.cap)
    }

    /// Record one confirmed emergency exit: roll the counter over to the
    /// current month if needed, then increment.
    ///
    /// Deliberately not idempotent. Must be called exactly once per confirmed
    /// exit, never on mere display of the price.
    pub fn record_exit(&mut self, now: DateTime<Utc>) {
        if !same_month(self.month_anchor, now) {
            self.exits_used_this_month = 0;
            self.month_anchor = month_start(now);
        }
        self.exits_used_this_month += 1;
    }
}

/// Whether early termination has become possible at all.
pub fn is_exit_available(
    session_start: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &CommitmentConfig,
) -> bool {
    elapsed_secs(session_start, now) >= config.minimum_commitment_secs()
}

fn elapsed_secs(session_start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - session_start).num_seconds().max(0) as u64
}

/// Full derived lock state for a session started at `session_start`.
pub fn emergency_exit_status(
    session_start: DateTime<Utc>,
    now: DateTime<Utc>,
    is_strict: bool,
    has_entitlement: bool,
    config: &CommitmentConfig,
) -> EmergencyExitStatus {
    if !is_strict || !config.enabled {
        return EmergencyExitStatus::NotApplicable;
    }
    if !config.allow_exits {
        return EmergencyExitStatus::LockedNoEscape;
    }
    let elapsed = elapsed_secs(session_start, now);
    let minimum = config.minimum_commitment_secs();
    if elapsed < minimum {
        return EmergencyExitStatus::LockedInsufficientCommitment {
            remaining_secs: minimum - elapsed,
        };
    }
    if config.require_entitlement && !has_entitlement {
        return EmergencyExitStatus::LockedRequiresEntitlement;
    }
    EmergencyExitStatus::Available {
        focused_minutes: elapsed / 60,
        price: config.current_price(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn august(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn price_ladder_doubles_to_cap() {
        let now = august(15, 12);
        let mut config = CommitmentConfig {
            month_anchor: month_start(now),
            ..Default::default()
        };
        let expected = ["2.00", "4.00", "8.00", "16.00", "32.00", "50.00", "50.00"];
        for (used, want) in expected.iter().enumerate() {
            config.exits_used_this_month = used as u32;
            assert_eq!(config.current_price(now), dec(want), "after {used} exits");
        }
    }

    #[test]
    fn rollover_is_lazy_and_read_only() {
        let july = Utc.with_ymd_and_hms(2026, 7, 3, 9, 0, 0).unwrap();
        let config = CommitmentConfig {
            exits_used_this_month: 5,
            month_anchor: july,
            ..Default::default()
        };
        let now = august(2, 10);
        // New month: price is back to base...
        assert_eq!(config.current_price(now), dec("2.00"));
        // ...but the stored count is untouched until record_exit runs.
        assert_eq!(config.exits_used_this_month, 5);
    }

    #[test]
    fn record_exit_rolls_over_then_increments() {
        let july = Utc.with_ymd_and_hms(2026, 7, 3, 9, 0, 0).unwrap();
        let mut config = CommitmentConfig {
            exits_used_this_month: 5,
            month_anchor: july,
            ..Default::default()
        };
        let now = august(2, 10);
        config.record_exit(now);
        assert_eq!(config.exits_used_this_month, 1);
        assert_eq!(config.month_anchor, august(1, 0));
        // Second exit in the same month escalates.
        config.record_exit(now + Duration::days(1));
        assert_eq!(config.exits_used_this_month, 2);
        assert_eq!(config.current_price(now + Duration::days(1)), dec("8.00"));
    }

    #[test]
    fn commitment_gate_boundary() {
        let start = august(10, 9);
        let config = CommitmentConfig::default(); // 5 minutes.

        let just_before = start + Duration::seconds(299);
        match emergency_exit_status(start, just_before, true, true, &config) {
            EmergencyExitStatus::LockedInsufficientCommitment { remaining_secs } => {
                assert_eq!(remaining_secs, 1)
            }
            other => panic!("expected locked, got {other:?}"),
        }

        let exactly = start + Duration::seconds(300);
        match emergency_exit_status(start, exactly, true, true, &config) {
            EmergencyExitStatus::Available { focused_minutes, price } => {
                assert_eq!(focused_minutes, 5);
                assert_eq!(price, dec("2.00"));
            }
            other => panic!("expected available, got {other:?}"),
        }
    }

    #[test]
    fn non_strict_session_is_not_applicable() {
        let start = august(10, 9);
        let config = CommitmentConfig::default();
        assert_eq!(
            emergency_exit_status(start, start, false, false, &config),
            EmergencyExitStatus::NotApplicable
        );
    }

    #[test]
    fn no_escape_policy_wins_over_countdown() {
        let start = august(10, 9);
        let config = CommitmentConfig {
            allow_exits: false,
            ..Default::default()
        };
        assert_eq!(
            emergency_exit_status(start, start + Duration::hours(2), true, true, &config),
            EmergencyExitStatus::LockedNoEscape
        );
    }

    #[test]
    fn entitlement_required_after_commitment_met() {
        let start = august(10, 9);
        let config = CommitmentConfig {
            require_entitlement: true,
            ..Default::default()
        };
        let later = start + Duration::minutes(10);
        assert_eq!(
            emergency_exit_status(start, later, true, false, &config),
            EmergencyExitStatus::LockedRequiresEntitlement
        );
        assert!(matches!(
            emergency_exit_status(start, later, true, true, &config),
            EmergencyExitStatus::Available { .. }
        ));
    }

    proptest! {
        /// Within one month the price never decreases as exits accumulate.
        #[test]
        fn price_monotone_within_month(used in 0u32..20) {
            let now = august(15, 12);
            let mut config = CommitmentConfig {
                month_anchor: month_start(now),
                exits_used_this_month: used,
                ..Default::default()
            };
            let before = config.current_price(now);
            config.record_exit(now);
            let after = config.current_price(now);
            prop_assert!(after >= before);
            prop_assert!(after <= config.pricing.cap);
        }

        /// Exit availability is a pure threshold on elapsed time.
        #[test]
        fn exit_gate_is_threshold(delta in -600i64..600) {
            let start = august(10, 9);
            let config = CommitmentConfig::default();
            let now = start + Duration::seconds(300 + delta);
            prop_assert_eq!(
                is_exit_available(start, now, &config),
                delta >= 0
            );
        }
    }
}

//! # FocusGuard Core Library
//!
//! Core business logic for FocusGuard, a distraction blocker built around
//! focus sessions, recurring schedules, and strict-mode commitment locks.
//! The library is UI-free and transport-free: the OS blocking mechanism and
//! the remote shared-state backend are both abstract collaborators, and the
//! CLI binary is a thin layer over the same core the desktop app uses.
//!
//! ## Architecture
//!
//! - **Session timer**: a wall-clock-based state machine; the caller invokes
//!   `tick()` periodically and auto-completion is derived from timestamps
//! - **Commitment policy**: pure pricing/lock logic with a lazily-rolled-over
//!   monthly exit counter
//! - **Sync**: last-write-wins reconciliation of the local countdown against
//!   the remote [`SharedTimerState`] record, degraded-but-functional offline
//! - **Enforcement**: idempotent dispatch against a platform blocking backend
//! - **Storage**: TOML configuration plus SQLite session history
//!
//! ## Key components
//!
//! - [`SessionTimer`]: session lifecycle state machine
//! - [`FocusService`]: injected-dependency orchestration of the whole core
//! - [`CommitmentConfig`]: strict-mode policy and exit pricing
//! - [`SyncEngine`]: remote reconciliation with offline fallback

pub mod commitment;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod regret;
pub mod schedule;
pub mod service;
pub mod session;
pub mod storage;
pub mod sync;

pub use commitment::{
    emergency_exit_status, is_exit_available, CommitmentConfig, EmergencyExitStatus, ExitPricing,
};
pub use enforcement::{EnforcementBackend, EnforcementDispatcher, NullBackend};
pub use error::{ConfigError, CoreError, Result, StorageError};
pub use events::Event;
pub use regret::{RegretEvaluator, RegretWindow, RegretWindowKind};
pub use schedule::{active_schedule, local_now, parse_days, ClockTime, Schedule, TimeWindow};
pub use service::{FocusService, SessionOptions};
pub use session::{Session, SessionTimer, StartSession, TickOutcome, TimerState};
pub use storage::{AppConfig, Database};
pub use sync::{
    AuthoritativeView, LocalTimerView, SharedStateStore, SharedTimerState, SyncEngine, SyncError,
};

pub use rust_decimal::Decimal;

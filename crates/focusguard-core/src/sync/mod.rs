//! Shared-state synchronization.
//!
//! Reconciles the locally-observed timer with the remotely-stored canonical
//! [`SharedTimerState`] record so that starting or stopping on one device is
//! observed by all others, while staying usable offline.

pub mod device_id;
pub mod engine;
pub mod reconcile;
pub mod store;
pub mod types;

pub use device_id::{load_or_create_device_id, DeviceIdError};
pub use engine::SyncEngine;
pub use reconcile::reconcile;
pub use store::{InMemoryStore, SharedStateStore};
pub use types::{AuthoritativeView, LocalTimerView, SharedTimerState, SyncError, ViewSource};

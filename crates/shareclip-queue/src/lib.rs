//! Job lifecycle plumbing for the transcode core.
//!
//! This crate provides:
//! - Durable job state in SQLite with atomic claims
//! - A counting dispatcher that wakes idle workers
//! - The startup recovery queue for interrupted jobs
//! - A per-user event bus for live notifications

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod recovery;
pub mod store;

pub use dispatcher::Dispatcher;
pub use error::{StoreError, StoreResult};
pub use events::{EventBus, Subscription, SubscriptionId, DEFAULT_EVENT_BUFFER};
pub use recovery::{RecoveryQueue, DEFAULT_RECOVERY_CAPACITY};
pub use store::{JobStore, SqliteJobStore};

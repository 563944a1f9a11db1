//! Sync coordinator.
//!
//! Keeps the published view set in step with the source tree.  Refreshes
//! are triggered by the poll loop ([`scheduler`]), by signed webhooks
//! ([`webhook`]) and by the manual refresh endpoint; all of them go through
//! [`coordinator::Coordinator::refresh`], which enforces one build at a
//! time through the [`session::RegistrySession`] build flag.

pub mod coordinator;
pub mod marker;
pub mod scheduler;
pub mod session;
pub mod webhook;

pub use coordinator::{Coordinator, RefreshOutcome, SyncSettings, Trigger};
pub use session::{Phase, RegistrySession, SyncStatus};

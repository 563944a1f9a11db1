//! HTTP layer for the registry views.
//!
//! Serves the live view set at the same paths the static tree uses, plus
//! the operational endpoints (status, manual refresh, webhook, health,
//! metrics).

pub mod handler;
pub mod resolve;

//! The registry session: the live view set plus the single-build guard.
//!
//! These are the only pieces of state shared across tasks.  The view set is
//! replaced wholesale with an atomic swap, and the build flag is claimed
//! with a compare-and-set, so readers never block and a second build can
//! never start while one is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::views::ViewSet;

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing has been built or restored yet.
    Uninitialized,
    /// Serving a view set built from `content_id`.
    Synced,
    CheckingForUpdate,
    BuildInProgress,
    /// The most recent attempt failed; the previous view set (if any) is live.
    BuildFailed,
}

/// Point-in-time status, replaced as a whole on every transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub phase: Phase,
    pub source: String,
    pub tracked_ref: String,
    /// Content id of the live view set; the staleness gate compares against it.
    pub content_id: Option<String>,
    pub last_build: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_check: Option<DateTime<Utc>>,
    pub entry_count: usize,
    pub normalization_errors: usize,
    pub restored: bool,
}

impl SyncStatus {
    fn new(source: String, tracked_ref: String) -> Self {
        Self {
            phase: Phase::Uninitialized,
            source,
            tracked_ref,
            content_id: None,
            last_build: None,
            last_attempt: None,
            last_error: None,
            next_check: None,
            entry_count: 0,
            normalization_errors: 0,
            restored: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct RegistrySession {
    views: ArcSwap<ViewSet>,
    building: AtomicBool,
    status: ArcSwap<SyncStatus>,
}

impl RegistrySession {
    pub fn new(source: impl Into<String>, tracked_ref: impl Into<String>) -> Self {
        Self {
            views: ArcSwap::from_pointee(ViewSet::empty()),
            building: AtomicBool::new(false),
            status: ArcSwap::from_pointee(SyncStatus::new(source.into(), tracked_ref.into())),
        }
    }

    /// The live view set.  Holding the returned `Arc` keeps that version
    /// alive even if a rebuild swaps in a newer one.
    pub fn views(&self) -> Arc<ViewSet> {
        self.views.load_full()
    }

    /// Atomically replace the live view set.
    pub fn publish(&self, views: Arc<ViewSet>) -> Arc<ViewSet> {
        self.views.swap(views)
    }

    /// Claim the build flag.  `None` when a build is already running.
    pub fn try_begin_build(&self) -> Option<BuildGuard<'_>> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BuildGuard {
                flag: &self.building,
            })
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    pub fn status(&self) -> Arc<SyncStatus> {
        self.status.load_full()
    }

    /// Apply `f` to a copy of the status and store it.  `f` may run more
    /// than once under contention.
    pub fn update_status<F>(&self, f: F)
    where
        F: Fn(&mut SyncStatus),
    {
        self.status.rcu(|current| {
            let mut next = SyncStatus::clone(current);
            f(&mut next);
            next
        });
    }
}

/// Releases the build flag on drop, including on early return or panic.
pub struct BuildGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

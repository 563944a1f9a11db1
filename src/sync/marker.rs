//! Last-known-good marker and canonical snapshot.
//!
//! After every successful publish the coordinator writes the canonical
//! entries (`snapshot.json`) and then the marker (`last-known-good.json`)
//! into the state directory.  The marker is written last, so a marker on
//! disk always refers to a complete snapshot.  Both files are replaced by
//! atomic rename.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::CanonicalEntry;

pub const MARKER_FILE: &str = "last-known-good.json";
pub const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub tracked_ref: String,
    pub content_id: String,
    pub built_at: DateTime<Utc>,
    pub entry_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotOut<'a> {
    content_id: &'a str,
    entries: Vec<&'a CanonicalEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotIn {
    content_id: String,
    entries: Vec<CanonicalEntry>,
}

/// Persist `entries` and then `marker` under `state_dir`.
pub fn persist<'a>(
    state_dir: &Path,
    marker: &Marker,
    entries: impl IntoIterator<Item = &'a CanonicalEntry>,
) -> Result<()> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;

    let snapshot = SnapshotOut {
        content_id: &marker.content_id,
        entries: entries.into_iter().collect(),
    };
    write_atomic(state_dir, SNAPSHOT_FILE, &serde_json::to_vec(&snapshot)?)?;
    write_atomic(state_dir, MARKER_FILE, &serde_json::to_vec_pretty(marker)?)?;
    debug!(dir = %state_dir.display(), content_id = %marker.content_id, "persisted last-known-good marker");
    Ok(())
}

/// Load the marker and its snapshot.  `Ok(None)` when there is no marker,
/// or when the snapshot does not belong to it.
pub fn load(state_dir: &Path) -> Result<Option<(Marker, Vec<CanonicalEntry>)>> {
    let marker_path = state_dir.join(MARKER_FILE);
    let raw = match std::fs::read(&marker_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", marker_path.display()))
        }
    };
    let marker: Marker = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", marker_path.display()))?;

    let snapshot_path = state_dir.join(SNAPSHOT_FILE);
    let raw = std::fs::read(&snapshot_path)
        .with_context(|| format!("failed to read {}", snapshot_path.display()))?;
    let snapshot: SnapshotIn = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", snapshot_path.display()))?;

    if snapshot.content_id != marker.content_id {
        warn!(
            marker = %marker.content_id,
            snapshot = %snapshot.content_id,
            "snapshot does not match last-known-good marker; ignoring both"
        );
        return Ok(None);
    }
    Ok(Some((marker, snapshot.entries)))
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name))
        .with_context(|| format!("failed to persist {name}"))?;
    Ok(())
}

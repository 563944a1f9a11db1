//! Static artifact tree writer.
//!
//! The whole tree is written into a staging directory next to the target and
//! then renamed into place, so readers of the output directory see either
//! the previous tree or the new one, never a mix.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::ViewSet;

/// Write every document of `views` under `out_dir`, replacing its contents.
/// Returns the number of files written.
pub fn write_tree(out_dir: &Path, views: &ViewSet) -> Result<usize> {
    let parent = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let staging = tempfile::Builder::new()
        .prefix(".registry-staging-")
        .tempdir_in(&parent)
        .context("failed to create staging directory")?;

    let mut written = 0;
    for (key, doc) in views.documents() {
        let Some(relative) = safe_relative(key) else {
            warn!(key, "skipping document with an unsafe path");
            continue;
        };
        let path = staging.path().join(relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&path, &doc.body).with_context(|| format!("failed to write {key}"))?;
        written += 1;
    }

    // Move the old tree aside first; a rename onto a non-empty directory fails.
    let retired = parent.join(format!(
        ".registry-retired-{}",
        views.generated_at().timestamp_millis()
    ));
    let had_previous = out_dir.exists();
    if had_previous {
        fs::rename(out_dir, &retired)
            .with_context(|| format!("failed to move aside {}", out_dir.display()))?;
    }
    if let Err(e) = fs::rename(staging.path(), out_dir) {
        if had_previous {
            let _ = fs::rename(&retired, out_dir);
        }
        return Err(e).with_context(|| format!("failed to publish {}", out_dir.display()));
    }
    if had_previous {
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!(path = %retired.display(), error = %e, "failed to remove retired output tree");
        }
    }

    info!(path = %out_dir.display(), files = written, "wrote static tree");
    Ok(written)
}

/// Keys are relative paths made of normal components only.
fn safe_relative(key: &str) -> Option<&Path> {
    let path = Path::new(key);
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalEntry, VersionRecord};
    use crate::views::{build, BuildOptions};

    fn views() -> ViewSet {
        let entry = CanonicalEntry {
            identifier: "io.example/foo".to_string(),
            display_title: None,
            description: "d".to_string(),
            source_location: None,
            homepage_url: None,
            versions: vec![VersionRecord {
                version: "1.0.0".to_string(),
                release_date: None,
                is_latest: true,
                distributions: Vec::new(),
                remotes: Vec::new(),
            }],
        };
        build(vec![entry], &BuildOptions::default()).unwrap()
    }

    #[test]
    fn writes_every_document() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("public");
        let views = views();

        let written = write_tree(&out, &views).unwrap();
        assert_eq!(written, views.document_count());
        assert!(out.join("index.json").is_file());
        assert!(out.join("api/entries/io.example/foo/versions/latest/index.json").is_file());
        assert!(out.join("simple/io.example%2Ffoo/index.html").is_file());
    }

    #[test]
    fn replaces_previous_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("public");
        fs::create_dir_all(out.join("stale")).unwrap();
        fs::write(out.join("stale/index.json"), b"{}").unwrap();

        write_tree(&out, &views()).unwrap();
        assert!(!out.join("stale").exists());
        assert!(out.join("index.json").is_file());

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("public")]);
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        assert!(safe_relative("api/entries/index.json").is_some());
        assert!(safe_relative("../escape").is_none());
        assert!(safe_relative("/abs").is_none());
    }
}

//! Local directory source.  The content identifier is a SHA-256 digest over
//! every file path and its bytes.  Resolving it also pins those bytes, so a
//! listing or fetch at that identifier sees exactly the tree it describes even
//! if the directory changes underneath.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::SourceProvider;

pub struct LocalSource {
    root: PathBuf,
    /// The tree read by the most recent `content_id`.
    pinned: Mutex<Option<Arc<Snapshot>>>,
}

struct Snapshot {
    content_id: String,
    files: BTreeMap<String, Bytes>,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pinned: Mutex::new(None),
        }
    }

    fn pinned_at(&self, git_ref: &str) -> Option<Arc<Snapshot>> {
        self.pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|snap| snap.content_id == git_ref)
            .cloned()
    }

    /// Join a tree-relative path onto the root, refusing anything that would
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        anyhow::ensure!(
            rel.components().all(|c| matches!(c, Component::Normal(_))),
            "path escapes source root: {path}"
        );
        Ok(self.root.join(rel))
    }
}

/// Walk `root` and return `/`-separated relative paths of regular files,
/// sorted, skipping hidden directories such as `.git`.
fn walk(root: &Path) -> Result<Vec<String>> {
    anyhow::ensure!(root.is_dir(), "source directory does not exist: {}", root.display());

    let mut paths = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .context("walked path outside root")?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        paths.push(joined);
    }
    paths.sort();
    Ok(paths)
}

/// Read every file once and digest exactly those bytes.
fn read_snapshot(root: &Path) -> Result<Snapshot> {
    let mut hasher = Sha256::new();
    let mut files = BTreeMap::new();
    for path in walk(root)? {
        let bytes = std::fs::read(root.join(&path)).with_context(|| format!("failed to read {path}"))?;
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
        files.insert(path, Bytes::from(bytes));
    }
    Ok(Snapshot {
        content_id: format!("sha256:{}", hex::encode(hasher.finalize())),
        files,
    })
}

#[async_trait::async_trait]
impl SourceProvider for LocalSource {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn content_id(&self, _git_ref: &str) -> Result<String> {
        let root = self.root.clone();
        let snapshot = tokio::task::spawn_blocking(move || read_snapshot(&root))
            .await
            .context("content digest task failed")??;
        let content_id = snapshot.content_id.clone();
        *self.pinned.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
        Ok(content_id)
    }

    /// At a pinned content id this lists the pinned tree; any other ref
    /// walks the directory as it is now.
    async fn list_tree(&self, git_ref: &str) -> Result<Vec<String>> {
        if let Some(snapshot) = self.pinned_at(git_ref) {
            return Ok(snapshot.files.keys().cloned().collect());
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk(&root))
            .await
            .context("directory walk task failed")?
    }

    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<Bytes> {
        let full = self.resolve(path)?;
        if let Some(snapshot) = self.pinned_at(git_ref) {
            return snapshot
                .files
                .get(path)
                .cloned()
                .with_context(|| format!("{path} is not part of tree {git_ref}"));
        }
        let bytes = tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read {}", full.display()))?;
        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("servers/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("servers/a.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("servers/nested/b.json"), b"{}").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), b"ref").unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_files_relative_and_skips_hidden_dirs() {
        let dir = tree();
        let source = LocalSource::new(dir.path());
        let paths = source.list_tree("ignored").await.unwrap();
        assert_eq!(paths, vec!["servers/a.json", "servers/nested/b.json"]);
    }

    #[tokio::test]
    async fn content_id_changes_with_content() {
        let dir = tree();
        let source = LocalSource::new(dir.path());
        let before = source.content_id("main").await.unwrap();
        assert_eq!(before, source.content_id("main").await.unwrap());

        std::fs::write(dir.path().join("servers/a.json"), b"{\"x\":1}").unwrap();
        let after = source.content_id("main").await.unwrap();
        assert_ne!(before, after);
        assert!(after.starts_with("sha256:"));
    }

    #[tokio::test]
    async fn reads_at_a_content_id_see_the_digested_bytes() {
        let dir = tree();
        let source = LocalSource::new(dir.path());
        let pinned = source.content_id("local").await.unwrap();

        std::fs::write(dir.path().join("servers/a.json"), b"{\"x\":2}").unwrap();
        std::fs::write(dir.path().join("servers/c.json"), b"{}").unwrap();

        assert_eq!(
            source.list_tree(&pinned).await.unwrap(),
            vec!["servers/a.json", "servers/nested/b.json"]
        );
        assert_eq!(
            source.fetch_file("servers/a.json", &pinned).await.unwrap(),
            Bytes::from_static(b"{}")
        );
        assert!(source.fetch_file("servers/c.json", &pinned).await.is_err());

        // The directory as it is now.
        assert_eq!(
            source.fetch_file("servers/a.json", "local").await.unwrap(),
            Bytes::from_static(b"{\"x\":2}")
        );
        assert_ne!(source.content_id("local").await.unwrap(), pinned);
    }

    #[tokio::test]
    async fn fetch_rejects_parent_traversal() {
        let dir = tree();
        let source = LocalSource::new(dir.path());
        assert!(source.fetch_file("../etc/passwd", "main").await.is_err());
        assert_eq!(
            source.fetch_file("servers/a.json", "main").await.unwrap(),
            Bytes::from_static(b"{}")
        );
    }

    #[tokio::test]
    async fn missing_root_is_a_fetch_error() {
        let source = LocalSource::new("/nonexistent/registry-sync-test");
        assert!(source.list_tree("main").await.is_err());
    }
}

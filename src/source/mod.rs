//! Source providers: where raw entry files come from.
//!
//! The [`SourceProvider`] trait is the only thing the sync coordinator knows
//! about the source tree.  Two adapters exist: a local directory walk
//! ([`local::LocalSource`]) and the GitHub REST tree/contents API
//! ([`github::GitHubSource`]).

pub mod github;
pub mod local;
pub mod rate_limit;

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::config::{Config, SourceKind};

// ---------------------------------------------------------------------------
// Raw file
// ---------------------------------------------------------------------------

/// One file discovered under the source root.  Lives for a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    pub content: Bytes,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Capability interface over a file tree addressed by ref.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Human-readable location, used in logs and the status endpoint.
    fn describe(&self) -> String;

    /// Resolve `git_ref` to an opaque content identifier (a commit id for
    /// remote trees, a content digest for local ones).
    async fn content_id(&self, git_ref: &str) -> Result<String>;

    /// List every file path in the tree at `git_ref`.
    async fn list_tree(&self, git_ref: &str) -> Result<Vec<String>>;

    /// Fetch one file's bytes at `git_ref`.
    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<Bytes>;

    /// Remaining upstream API budget, when the provider tracks one.
    fn rate_limit_remaining(&self) -> Option<u64> {
        None
    }
}

/// Build the configured provider.
pub fn build_provider(config: &Config, http_client: reqwest::Client) -> Result<Arc<dyn SourceProvider>> {
    let provider: Arc<dyn SourceProvider> = match config.source.kind {
        SourceKind::Local => Arc::new(local::LocalSource::new(&config.source.local.path)),
        SourceKind::Github => Arc::new(
            github::GitHubSource::new(&config.source.github, http_client)
                .context("failed to configure GitHub source")?,
        ),
    };
    Ok(provider)
}

// ---------------------------------------------------------------------------
// File selection
// ---------------------------------------------------------------------------

/// Which paths in the tree are entry files.
#[derive(Debug, Clone)]
pub struct FileFilter {
    /// Only paths under this prefix are considered (empty = whole tree).
    pub include_prefix: String,
    /// Accepted extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with(&self.include_prefix) {
            return false;
        }
        let Some((_, ext)) = path.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

/// List the tree at `pinned_ref`, keep the entry files, and fetch them with
/// at most `max_concurrent` requests in flight.  Results come back in
/// ascending path order.
pub async fn fetch_raw_files(
    provider: Arc<dyn SourceProvider>,
    pinned_ref: &str,
    filter: &FileFilter,
    max_concurrent: usize,
) -> Result<Vec<RawFile>> {
    let mut paths: Vec<String> = provider
        .list_tree(pinned_ref)
        .await
        .context("failed to list source tree")?
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect();
    paths.sort();
    debug!(files = paths.len(), "fetching entry files");

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    for (idx, path) in paths.into_iter().enumerate() {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let pinned_ref = pinned_ref.to_string();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("fetch semaphore closed")?;
            let content = provider
                .fetch_file(&path, &pinned_ref)
                .await
                .with_context(|| format!("failed to fetch {path}"))?;
            Ok::<_, anyhow::Error>((idx, RawFile { path, content }))
        });
    }

    let mut files = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (idx, file) = joined.context("fetch task panicked")??;
        files.push((idx, file));
    }
    files.sort_by_key(|(idx, _)| *idx);
    Ok(files.into_iter().map(|(_, f)| f).collect())
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    //! In-memory provider with controllable content, latency and failure.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    pub struct MemorySource {
        files: Mutex<BTreeMap<String, Bytes>>,
        content_id: Mutex<String>,
        pub delay: Mutex<Duration>,
        pub fail: AtomicBool,
        pub list_calls: AtomicUsize,
    }

    impl MemorySource {
        pub fn new(content_id: &str) -> Self {
            let source = Self::default();
            *source.content_id.lock().unwrap() = content_id.to_string();
            source
        }

        pub fn put(&self, path: &str, value: serde_json::Value) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), Bytes::from(serde_json::to_vec(&value).unwrap()));
        }

        pub fn set_content_id(&self, id: &str) {
            *self.content_id.lock().unwrap() = id.to_string();
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = delay;
        }

        async fn pause(&self) -> Result<()> {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("simulated upstream failure");
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl SourceProvider for MemorySource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn content_id(&self, _git_ref: &str) -> Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("simulated upstream failure");
            }
            Ok(self.content_id.lock().unwrap().clone())
        }

        async fn list_tree(&self, _git_ref: &str) -> Result<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await?;
            Ok(self.files.lock().unwrap().keys().cloned().collect())
        }

        async fn fetch_file(&self, path: &str, _git_ref: &str) -> Result<Bytes> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such file: {path}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySource;
    use super::*;

    fn filter() -> FileFilter {
        FileFilter {
            include_prefix: "servers/".to_string(),
            extensions: vec!["json".to_string(), "yaml".to_string()],
        }
    }

    #[test]
    fn filter_checks_prefix_and_extension() {
        let f = filter();
        assert!(f.matches("servers/a.json"));
        assert!(f.matches("servers/nested/b.YAML"));
        assert!(!f.matches("README.md"));
        assert!(!f.matches("docs/a.json"));
        assert!(!f.matches("servers/noext"));
    }

    #[tokio::test]
    async fn fetch_raw_files_returns_sorted_matching_files() {
        let source = MemorySource::new("c1");
        source.put("servers/b.json", serde_json::json!({"b": 1}));
        source.put("servers/a.json", serde_json::json!({"a": 1}));
        source.put("other/c.json", serde_json::json!({"c": 1}));

        let files = fetch_raw_files(Arc::new(source), "c1", &filter(), 2)
            .await
            .unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["servers/a.json", "servers/b.json"]);
    }
}

//! Refresh pipeline.
//!
//! One refresh: claim the build flag, resolve the tracked ref to a content
//! id, stop early if that id is already live, fetch the entry files, run the
//! normalizer and the view builder, optionally write the static tree, swap
//! the new view set in, persist the last-known-good marker, release the
//! flag.  Only the fetch phase is bounded by a timeout and can be
//! cancelled; everything after it is an in-memory pass.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::marker::{self, Marker};
use super::session::{Phase, RegistrySession};
use crate::config::{Config, SourceKind};
use crate::metrics::{FetchResult, Metrics, RebuildOutcome};
use crate::normalize::{ingest, Policy};
use crate::source::{fetch_raw_files, FileFilter, RawFile, SourceProvider};
use crate::views::{build, build_at, output, BuildOptions, ViewSet};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub tracked_ref: String,
    pub filter: FileFilter,
    pub policy: Policy,
    pub build: BuildOptions,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    /// Static tree target, written on every successful build.
    pub output_dir: Option<PathBuf>,
    /// Where the last-known-good marker lives.
    pub state_dir: Option<PathBuf>,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        let tracked_ref = match config.source.kind {
            SourceKind::Github => config.source.github.git_ref.clone(),
            SourceKind::Local => "local".to_string(),
        };
        Self {
            tracked_ref,
            filter: FileFilter {
                include_prefix: config.source.include_prefix.clone(),
                extensions: config
                    .source
                    .extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            },
            policy: Policy {
                description_max_len: config.views.description_max_len,
            },
            build: BuildOptions {
                compat_prefixes: config.views.compat_prefixes.clone(),
                base_path: config.views.base_path.clone(),
                content_id: None,
            },
            fetch_timeout: Duration::from_secs(config.sync.fetch_timeout),
            max_concurrent_fetches: config.sync.max_concurrent_fetches,
            output_dir: config.output.path.as_ref().map(PathBuf::from),
            state_dir: Some(PathBuf::from(&config.output.state_dir)),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Startup,
    Poll,
    Webhook,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Poll => "poll",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RefreshOutcome {
    #[serde(rename_all = "camelCase")]
    Rebuilt {
        content_id: String,
        entries: usize,
        errors: usize,
    },
    #[serde(rename_all = "camelCase")]
    NoChange { content_id: String },
    /// Another refresh held the build flag; nothing was done.
    SkippedInProgress,
    Failed { error: String },
}

enum Fetched {
    Unchanged(String),
    Changed {
        content_id: String,
        files: Vec<RawFile>,
    },
}

enum FetchFailure {
    Error(anyhow::Error),
    TimedOut(Duration),
    Cancelled,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "fetch failed: {e:#}"),
            Self::TimedOut(t) => write!(f, "fetch timed out after {}s", t.as_secs_f64()),
            Self::Cancelled => write!(f, "fetch cancelled by shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    session: Arc<RegistrySession>,
    provider: Arc<dyn SourceProvider>,
    settings: SyncSettings,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(
        session: Arc<RegistrySession>,
        provider: Arc<dyn SourceProvider>,
        settings: SyncSettings,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            provider,
            settings,
            metrics,
            shutdown,
        }
    }

    pub fn session(&self) -> &Arc<RegistrySession> {
        &self.session
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Publish the persisted last-known-good view set, if there is one for
    /// the tracked ref.  Its content id becomes the staleness gate.
    pub fn restore(&self) -> Result<bool> {
        let Some(dir) = &self.settings.state_dir else {
            return Ok(false);
        };
        let Some((marker, entries)) = marker::load(dir)? else {
            return Ok(false);
        };
        if marker.tracked_ref != self.settings.tracked_ref {
            info!(
                marker_ref = %marker.tracked_ref,
                tracked_ref = %self.settings.tracked_ref,
                "last-known-good marker is for another ref; not restoring"
            );
            return Ok(false);
        }

        let opts = BuildOptions {
            content_id: Some(marker.content_id.clone()),
            ..self.settings.build.clone()
        };
        let views = build_at(entries, &opts, marker.built_at)
            .context("failed to rebuild views from snapshot")?;
        let entry_count = views.entry_count();
        self.session.publish(Arc::new(views));
        self.session.update_status(|s| {
            s.phase = Phase::Synced;
            s.content_id = Some(marker.content_id.clone());
            s.last_build = Some(marker.built_at);
            s.entry_count = entry_count;
            s.restored = true;
        });
        self.metrics.entries_live.set(entry_count as i64);
        info!(
            content_id = %marker.content_id,
            entries = entry_count,
            built_at = %marker.built_at,
            "restored last-known-good view set"
        );
        Ok(true)
    }

    /// Run one refresh.  Returns immediately with
    /// [`RefreshOutcome::SkippedInProgress`] if another one is running.
    #[instrument(skip_all, fields(%trigger, force))]
    pub async fn refresh(&self, trigger: Trigger, force: bool) -> RefreshOutcome {
        let Some(guard) = self.session.try_begin_build() else {
            info!("refresh skipped; a build is already in progress");
            self.metrics.record_rebuild(RebuildOutcome::SkippedInProgress);
            return RefreshOutcome::SkippedInProgress;
        };
        let outcome = self.run(force).await;
        // The marker is already on disk at this point.
        drop(guard);
        outcome
    }

    /// [`Self::refresh`] on its own task.  Dropping the returned future
    /// detaches from the pass instead of cutting it short, so the status and
    /// marker are always finished before the build flag is released.
    pub async fn refresh_detached(self: &Arc<Self>, trigger: Trigger, force: bool) -> RefreshOutcome {
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move { coordinator.refresh(trigger, force).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "refresh task panicked or was aborted");
                RefreshOutcome::Failed {
                    error: format!("refresh task failed: {e}"),
                }
            }
        }
    }

    async fn run(&self, force: bool) -> RefreshOutcome {
        let started = Instant::now();
        let attempt_at = Utc::now();
        self.session.update_status(|s| {
            s.phase = Phase::CheckingForUpdate;
            s.last_attempt = Some(attempt_at);
        });

        // ── fetch ──
        let fetched = self.fetch_phase(force).await;
        self.observe_rate_limit();
        let (content_id, files) = match fetched {
            Ok(Fetched::Unchanged(content_id)) => {
                self.metrics.record_fetch(FetchResult::Ok);
                self.metrics.record_rebuild(RebuildOutcome::NoChange);
                self.session.update_status(|s| {
                    s.phase = Phase::Synced;
                    s.last_error = None;
                });
                info!(%content_id, "source unchanged; keeping live view set");
                return RefreshOutcome::NoChange { content_id };
            }
            Ok(Fetched::Changed { content_id, files }) => {
                self.metrics.record_fetch(FetchResult::Ok);
                (content_id, files)
            }
            Err(failure) => {
                self.metrics.record_fetch(match failure {
                    FetchFailure::TimedOut(_) => FetchResult::Timeout,
                    FetchFailure::Error(_) | FetchFailure::Cancelled => FetchResult::Error,
                });
                return self.fail(failure.to_string());
            }
        };

        // ── normalize + build ──
        self.session.update_status(|s| s.phase = Phase::BuildInProgress);
        let report = ingest(&files, &self.settings.policy);
        let error_count = report.errors.len();
        self.metrics
            .normalization_errors_total
            .inc_by(error_count as u64);

        let opts = BuildOptions {
            content_id: Some(content_id.clone()),
            ..self.settings.build.clone()
        };
        let views = match build(report.entries, &opts) {
            Ok(views) => Arc::new(views),
            Err(e) => return self.fail(format!("view build failed: {e:#}")),
        };
        let entry_count = views.entry_count();

        if let Some(dir) = &self.settings.output_dir {
            if let Err(e) = write_output(dir.clone(), Arc::clone(&views)).await {
                return self.fail(format!("{e:#}"));
            }
        }

        // ── publish ──
        let built_at = views.generated_at();
        self.session.publish(Arc::clone(&views));
        self.persist_marker(&content_id, Arc::clone(&views)).await;

        self.session.update_status(|s| {
            s.phase = Phase::Synced;
            s.content_id = Some(content_id.clone());
            s.last_build = Some(built_at);
            s.last_error = None;
            s.entry_count = entry_count;
            s.normalization_errors = error_count;
            s.restored = false;
        });
        self.metrics.entries_live.set(entry_count as i64);
        self.metrics
            .rebuild_duration_seconds
            .observe(started.elapsed().as_secs_f64());
        self.metrics.record_rebuild(RebuildOutcome::Rebuilt);

        info!(
            %content_id,
            entries = entry_count,
            errors = error_count,
            files = files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "published new view set"
        );
        RefreshOutcome::Rebuilt {
            content_id,
            entries: entry_count,
            errors: error_count,
        }
    }

    /// Fetch under the configured timeout; shutdown cancels it.
    async fn fetch_phase(&self, force: bool) -> Result<Fetched, FetchFailure> {
        let cancel = self.shutdown.child_token();
        let timeout = self.settings.fetch_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
            res = tokio::time::timeout(timeout, self.fetch(force)) => match res {
                Ok(Ok(fetched)) => Ok(fetched),
                Ok(Err(e)) => Err(FetchFailure::Error(e)),
                Err(_) => Err(FetchFailure::TimedOut(timeout)),
            },
        }
    }

    async fn fetch(&self, force: bool) -> Result<Fetched> {
        let content_id = self
            .provider
            .content_id(&self.settings.tracked_ref)
            .await
            .with_context(|| format!("failed to resolve {}", self.settings.tracked_ref))?;

        let live = self.session.status().content_id.clone();
        if !force && live.as_deref() == Some(content_id.as_str()) && !self.session.views().is_empty()
        {
            return Ok(Fetched::Unchanged(content_id));
        }

        // List and fetch at the resolved id so the pass sees one tree.
        let files = fetch_raw_files(
            Arc::clone(&self.provider),
            &content_id,
            &self.settings.filter,
            self.settings.max_concurrent_fetches,
        )
        .await?;
        Ok(Fetched::Changed { content_id, files })
    }

    async fn persist_marker(&self, content_id: &str, views: Arc<ViewSet>) {
        let Some(dir) = self.settings.state_dir.clone() else {
            return;
        };
        let marker = Marker {
            tracked_ref: self.settings.tracked_ref.clone(),
            content_id: content_id.to_string(),
            built_at: views.generated_at(),
            entry_count: views.entry_count(),
        };
        let result =
            tokio::task::spawn_blocking(move || marker::persist(&dir, &marker, views.entries()))
                .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %format!("{e:#}"), "failed to persist last-known-good marker"),
            Err(e) => error!(error = %e, "marker persistence task failed"),
        }
    }

    fn fail(&self, error: String) -> RefreshOutcome {
        error!(error = %error, "refresh failed; previous view set stays live");
        self.session.update_status(|s| {
            s.phase = Phase::BuildFailed;
            s.last_error = Some(error.clone());
        });
        self.metrics.record_rebuild(RebuildOutcome::Failed);
        RefreshOutcome::Failed { error }
    }

    fn observe_rate_limit(&self) {
        if let Some(remaining) = self.provider.rate_limit_remaining() {
            self.metrics
                .upstream_rate_limit_remaining
                .set(i64::try_from(remaining).unwrap_or(i64::MAX));
            if remaining == 0 {
                warn!("upstream API rate limit exhausted");
            }
        }
    }
}

async fn write_output(dir: PathBuf, views: Arc<ViewSet>) -> Result<usize> {
    tokio::task::spawn_blocking(move || output::write_tree(&dir, &views))
        .await
        .context("output writer task failed")?
}

/// Fetch and return the raw entry files at the tracked ref, without
/// building anything.
pub async fn fetch_tree(
    provider: Arc<dyn SourceProvider>,
    settings: &SyncSettings,
) -> Result<(String, Vec<RawFile>)> {
    let work = async {
        let content_id = provider
            .content_id(&settings.tracked_ref)
            .await
            .with_context(|| format!("failed to resolve {}", settings.tracked_ref))?;
        let files = fetch_raw_files(
            Arc::clone(&provider),
            &content_id,
            &settings.filter,
            settings.max_concurrent_fetches,
        )
        .await?;
        Ok::<_, anyhow::Error>((content_id, files))
    };
    tokio::time::timeout(settings.fetch_timeout, work)
        .await
        .with_context(|| {
            format!(
                "fetch timed out after {}s",
                settings.fetch_timeout.as_secs()
            )
        })?
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::metrics::MetricsRegistry;
    use crate::source::testing::MemorySource;

    fn settings() -> SyncSettings {
        SyncSettings {
            tracked_ref: "main".to_string(),
            filter: FileFilter {
                include_prefix: "servers/".to_string(),
                extensions: vec!["json".to_string()],
            },
            policy: Policy::default(),
            build: BuildOptions::default(),
            fetch_timeout: Duration::from_secs(5),
            max_concurrent_fetches: 4,
            output_dir: None,
            state_dir: None,
        }
    }

    fn entry_file(name: &str, version: &str) -> serde_json::Value {
        json!({
            "name": name,
            "description": "x",
            "version": version,
            "packages": [{
                "registryType": "npm",
                "identifier": "foo",
                "transport": {"type": "stdio"}
            }]
        })
    }

    fn source(content_id: &str) -> Arc<MemorySource> {
        let source = MemorySource::new(content_id);
        source.put("servers/foo.json", entry_file("io.example/foo", "1.0.0"));
        Arc::new(source)
    }

    fn coordinator(source: &Arc<MemorySource>, settings: SyncSettings) -> Coordinator {
        let provider: Arc<dyn SourceProvider> = source.clone();
        Coordinator::new(
            Arc::new(RegistrySession::new("memory", "main")),
            provider,
            settings,
            MetricsRegistry::new().metrics,
            CancellationToken::new(),
        )
    }

    // ── staleness gate ──

    #[tokio::test]
    async fn first_refresh_rebuilds_then_gate_skips() {
        let src = source("c1");
        let coord = coordinator(&src, settings());

        let first = coord.refresh(Trigger::Startup, false).await;
        assert_eq!(
            first,
            RefreshOutcome::Rebuilt {
                content_id: "c1".to_string(),
                entries: 1,
                errors: 0
            }
        );
        let second = coord.refresh(Trigger::Poll, false).await;
        assert_eq!(
            second,
            RefreshOutcome::NoChange {
                content_id: "c1".to_string()
            }
        );
        assert_eq!(src.list_calls.load(Ordering::SeqCst), 1);

        let status = coord.session().status();
        assert_eq!(status.phase, Phase::Synced);
        assert_eq!(status.entry_count, 1);
        assert!(status.last_build.is_some());
    }

    #[tokio::test]
    async fn changed_content_id_rebuilds() {
        let src = source("c1");
        let coord = coordinator(&src, settings());
        coord.refresh(Trigger::Startup, false).await;

        src.put("servers/bar.json", entry_file("io.example/bar", "2.0.0"));
        src.set_content_id("c2");
        let outcome = coord.refresh(Trigger::Poll, false).await;
        assert!(matches!(outcome, RefreshOutcome::Rebuilt { entries: 2, .. }));
        assert_eq!(coord.session().views().content_id(), Some("c2"));
    }

    #[tokio::test]
    async fn force_bypasses_gate() {
        let src = source("c1");
        let coord = coordinator(&src, settings());
        coord.refresh(Trigger::Startup, false).await;
        let outcome = coord.refresh(Trigger::Manual, true).await;
        assert!(matches!(outcome, RefreshOutcome::Rebuilt { .. }));
        assert_eq!(src.list_calls.load(Ordering::SeqCst), 2);
    }

    // ── single build ──

    #[tokio::test]
    async fn concurrent_refreshes_run_one_pass() {
        let src = source("c1");
        src.set_delay(Duration::from_millis(200));
        let coord = coordinator(&src, settings());

        let (a, b) = tokio::join!(
            coord.refresh(Trigger::Manual, false),
            coord.refresh(Trigger::Manual, false)
        );
        let outcomes = [a, b];
        let rebuilt = outcomes
            .iter()
            .filter(|o| matches!(o, RefreshOutcome::Rebuilt { .. }))
            .count();
        let skipped = outcomes
            .iter()
            .filter(|o| **o == RefreshOutcome::SkippedInProgress)
            .count();
        assert_eq!((rebuilt, skipped), (1, 1));
        assert_eq!(src.list_calls.load(Ordering::SeqCst), 1);
        assert!(!coord.session().is_building());
    }

    #[tokio::test]
    async fn detached_refresh_survives_a_dropped_caller() {
        let src = source("c1");
        src.set_delay(Duration::from_millis(200));
        let coord = Arc::new(coordinator(&src, settings()));

        let dropped = tokio::time::timeout(
            Duration::from_millis(20),
            coord.refresh_detached(Trigger::Manual, false),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let status = coord.session().status();
        assert!(!coord.session().is_building());
        assert_eq!(status.phase, Phase::Synced);
        assert_eq!(status.content_id.as_deref(), Some("c1"));
        assert_eq!(coord.session().views().entry_count(), 1);
    }

    // ── failure handling ──

    #[tokio::test]
    async fn timed_out_fetch_keeps_previous_views() {
        let src = source("c1");
        let coord = coordinator(
            &src,
            SyncSettings {
                fetch_timeout: Duration::from_millis(100),
                ..settings()
            },
        );
        coord.refresh(Trigger::Startup, false).await;

        src.set_content_id("c2");
        src.put("servers/bar.json", entry_file("io.example/bar", "2.0.0"));
        src.set_delay(Duration::from_millis(1000));
        let outcome = coord.refresh(Trigger::Poll, false).await;
        assert!(matches!(outcome, RefreshOutcome::Failed { ref error } if error.contains("timed out")));

        let status = coord.session().status();
        assert_eq!(status.content_id.as_deref(), Some("c1"));
        assert_eq!(status.entry_count, 1);
        assert_eq!(status.phase, Phase::BuildFailed);
        assert!(status.last_error.is_some());
        assert_eq!(coord.session().views().entry_count(), 1);

        src.set_delay(Duration::ZERO);
        let outcome = coord.refresh(Trigger::Poll, false).await;
        assert!(matches!(outcome, RefreshOutcome::Rebuilt { entries: 2, .. }));
        let status = coord.session().status();
        assert_eq!(status.content_id.as_deref(), Some("c2"));
        assert_eq!(status.entry_count, 2);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn upstream_error_is_a_failed_outcome() {
        let src = source("c1");
        src.fail.store(true, Ordering::SeqCst);
        let coord = coordinator(&src, settings());
        let outcome = coord.refresh(Trigger::Startup, false).await;
        assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
        assert!(coord.session().views().is_empty());
        assert!(!coord.session().is_building());
    }

    #[tokio::test]
    async fn invalid_entries_do_not_fail_the_refresh() {
        let src = source("c1");
        src.put("servers/bad.json", json!({"name": "Bad/Name", "description": "x", "version": "1"}));
        let coord = coordinator(&src, settings());
        let outcome = coord.refresh(Trigger::Startup, false).await;
        assert_eq!(
            outcome,
            RefreshOutcome::Rebuilt {
                content_id: "c1".to_string(),
                entries: 1,
                errors: 1
            }
        );
        assert_eq!(coord.session().status().normalization_errors, 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_fetch() {
        let src = source("c1");
        src.set_delay(Duration::from_millis(1000));
        let coord = coordinator(&src, settings());
        coord.shutdown.cancel();
        let outcome = coord.refresh(Trigger::Poll, false).await;
        assert!(matches!(outcome, RefreshOutcome::Failed { ref error } if error.contains("cancelled")));
    }

    // ── persistence ──

    #[tokio::test]
    async fn marker_restores_views_and_gate() {
        let state = tempfile::tempdir().unwrap();
        let with_state = || SyncSettings {
            state_dir: Some(state.path().to_path_buf()),
            ..settings()
        };

        let src = source("c1");
        let coord = coordinator(&src, with_state());
        coord.refresh(Trigger::Startup, false).await;
        assert!(state.path().join(marker::MARKER_FILE).is_file());

        // A fresh process against the same upstream.
        let src2 = source("c1");
        let restarted = coordinator(&src2, with_state());
        assert!(restarted.restore().unwrap());
        assert_eq!(restarted.session().views().entry_count(), 1);
        assert!(restarted.session().status().restored);

        let outcome = restarted.refresh(Trigger::Startup, false).await;
        assert!(matches!(outcome, RefreshOutcome::NoChange { .. }));
        assert_eq!(src2.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn marker_for_other_ref_is_not_restored() {
        let state = tempfile::tempdir().unwrap();
        let src = source("c1");
        let coord = coordinator(
            &src,
            SyncSettings {
                state_dir: Some(state.path().to_path_buf()),
                ..settings()
            },
        );
        coord.refresh(Trigger::Startup, false).await;

        let other = coordinator(
            &src,
            SyncSettings {
                tracked_ref: "release".to_string(),
                state_dir: Some(state.path().to_path_buf()),
                ..settings()
            },
        );
        assert!(!other.restore().unwrap());
    }

    #[tokio::test]
    async fn output_tree_is_written_on_rebuild() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("public");
        let src = source("c1");
        let coord = coordinator(
            &src,
            SyncSettings {
                output_dir: Some(target.clone()),
                ..settings()
            },
        );
        coord.refresh(Trigger::Manual, false).await;
        assert!(target.join("api/entries/index.json").is_file());
        assert!(target.join("v0.1/servers/io.example/foo/versions/latest/index.json").is_file());
    }

    #[tokio::test]
    async fn fetch_tree_returns_pinned_files() {
        let src = source("c1");
        let provider: Arc<dyn SourceProvider> = src.clone();
        let (content_id, files) = fetch_tree(provider, &settings()).await.unwrap();
        assert_eq!(content_id, "c1");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "servers/foo.json");
    }

    #[test]
    fn outcome_serializes_with_kebab_tag() {
        let value = serde_json::to_value(RefreshOutcome::SkippedInProgress).unwrap();
        assert_eq!(value, json!({"outcome": "skipped-in-progress"}));
        let value = serde_json::to_value(RefreshOutcome::NoChange {
            content_id: "c".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"outcome": "no-change", "contentId": "c"}));
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full runtime configuration.  Every field has a default, so an empty YAML
/// document (or no file at all) yields a usable config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub output: OutputConfig,
    pub views: ViewsConfig,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote repository via the GitHub REST API.
    #[default]
    Github,
    /// Directory on the local filesystem.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub local: LocalSourceConfig,
    pub github: GitHubSourceConfig,
    /// Only files under this tree prefix are entry files.
    pub include_prefix: String,
    /// Accepted entry-file extensions, without the dot.
    pub extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            local: LocalSourceConfig::default(),
            github: GitHubSourceConfig::default(),
            include_prefix: "servers/".to_string(),
            extensions: vec!["json".to_string(), "yaml".to_string(), "yml".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSourceConfig {
    pub path: String,
}

impl Default for LocalSourceConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSourceConfig {
    /// API root, e.g. `https://api.github.com` or `https://ghe.example.com/api/v3`.
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Branch or tag to track.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Name of the environment variable that holds the API token.
    pub token_env: String,
    pub user_agent: String,
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            git_ref: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: concat!("registry-sync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between upstream change checks.
    pub poll_interval: u64,
    /// Upper bound (seconds) on each fetch phase of a rebuild.
    pub fetch_timeout: u64,
    pub max_concurrent_fetches: usize,
    /// Disable to rely on webhooks and manual refreshes only.
    pub poll_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            fetch_timeout: 30,
            max_concurrent_fetches: 8,
            poll_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Server / webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener.
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Name of the environment variable holding the shared HMAC secret.  When
    /// the variable is unset or empty, signature checking is disabled.
    pub secret_env: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_env: "MCP_WEBHOOK_SECRET".to_string(),
        }
    }
}

impl WebhookConfig {
    pub fn secret(&self) -> Option<String> {
        std::env::var(&self.secret_env).ok().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Output / views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// When set, every successful build is also written here as a static tree.
    pub path: Option<String>,
    /// Holds the last-known-good marker and the canonical snapshot.
    pub state_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            state_dir: ".registry-sync".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Path prefixes that carry the compatibility-wrapped API.  The consuming
    /// client probes them in order, so all are populated identically.
    pub compat_prefixes: Vec<String>,
    pub description_max_len: usize,
    /// Prefix for absolute links in generated documents (e.g. `/registry`).
    pub base_path: String,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            compat_prefixes: vec!["v0".to_string(), "v0.1".to_string()],
            description_max_len: 100,
            base_path: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load a [`Config`] from the YAML file at `path` (defaults when `None`),
/// apply environment overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            parse_config(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(contents: &str) -> Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

/// Overlay the deployment environment variables.  `lookup` is injectable so
/// tests do not touch the process environment.
fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = get("GITHUB_OWNER") {
        config.source.github.owner = v;
    }
    if let Some(v) = get("GITHUB_REPO") {
        config.source.github.repo = v;
    }
    if let Some(v) = get("GITHUB_REF") {
        config.source.github.git_ref = v;
    }
    if let Some(v) = get("SOURCE_DIR") {
        config.source.kind = SourceKind::Local;
        config.source.local.path = v;
    }
    if let Some(v) = get("POLL_INTERVAL_SECS") {
        config.sync.poll_interval = v
            .parse()
            .with_context(|| format!("POLL_INTERVAL_SECS is not a number: {v}"))?;
    }
    if let Some(v) = get("PORT") {
        let port: u16 = v.parse().with_context(|| format!("PORT is not a port: {v}"))?;
        let host = config
            .server
            .listen
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host)
            .to_string();
        config.server.listen = format!("{host}:{port}");
    }
    if let Some(v) = get("OUTPUT_DIR") {
        config.output.path = Some(v);
    }
    Ok(())
}

/// Sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(config.sync.poll_interval > 0, "sync.poll_interval must be positive");
    anyhow::ensure!(config.sync.fetch_timeout > 0, "sync.fetch_timeout must be positive");
    anyhow::ensure!(
        !config.views.compat_prefixes.is_empty(),
        "views.compat_prefixes must not be empty"
    );
    anyhow::ensure!(
        config
            .views
            .compat_prefixes
            .iter()
            .all(|p| !p.is_empty() && !p.contains('/')),
        "views.compat_prefixes entries must be single path segments"
    );
    if config.source.kind == SourceKind::Github {
        anyhow::ensure!(
            !config.source.github.owner.is_empty() && !config.source.github.repo.is_empty(),
            "source.github.owner and source.github.repo are required for a github source"
        );
    }
    Ok(())
}

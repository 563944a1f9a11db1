//! GitHub / GitHub Enterprise source via the REST API.
//!
//! - content id: `GET /repos/{owner}/{repo}/commits/{ref}` (the commit `sha`)
//! - tree:       `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`
//! - blob:       `GET /repos/{owner}/{repo}/contents/{path}?ref={sha}`
//!
//! The coordinator resolves the tracked branch to a commit id first and then
//! lists and fetches at that commit, so one pass never mixes two commits.

use anyhow::{Context, Result};
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use super::rate_limit::RateLimitState;
use super::SourceProvider;
use crate::config::GitHubSourceConfig;

const ACCEPT: &str = "application/vnd.github+json";

pub struct GitHubSource {
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
    http_client: reqwest::Client,
    rate_limit: RateLimitState,
}

// ---------------------------------------------------------------------------
// API response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    download_url: Option<String>,
}

impl GitHubSource {
    pub fn new(config: &GitHubSourceConfig, http_client: reqwest::Client) -> Result<Self> {
        anyhow::ensure!(!config.owner.is_empty(), "source.github.owner is not set");
        anyhow::ensure!(!config.repo.is_empty(), "source.github.repo is not set");
        let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            debug!(env = %config.token_env, "no GitHub token set; using anonymous API access");
        }
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token,
            http_client,
            rate_limit: RateLimitState::new(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{tail}", self.api_url, self.owner, self.repo)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if let Some(wait) = self.rate_limit.exhausted_for(now) {
            anyhow::bail!("GitHub API rate limit exhausted; resets in {wait}s");
        }

        let mut req = self.http_client.get(url).header("Accept", ACCEPT);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("GitHub API request failed: {url}"))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, %status, "GitHub API returned non-success status");
            anyhow::bail!("GET {url} returned {status}");
        }
        Ok(resp)
    }
}

/// Percent-encode each path segment, keeping the `/` separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode a contents-API base64 payload (wrapped at 60 columns).
fn decode_content(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .context("invalid base64 in contents response")
}

#[async_trait::async_trait]
impl SourceProvider for GitHubSource {
    fn describe(&self) -> String {
        format!("github:{}/{}", self.owner, self.repo)
    }

    async fn content_id(&self, git_ref: &str) -> Result<String> {
        let url = self.repo_url(&format!("commits/{}", encode_path(git_ref)));
        let commit: CommitResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse commit response")?;
        Ok(commit.sha)
    }

    async fn list_tree(&self, git_ref: &str) -> Result<Vec<String>> {
        let url = self.repo_url(&format!("git/trees/{}?recursive=1", encode_path(git_ref)));
        let tree: TreeResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse tree response")?;
        if tree.truncated {
            warn!(git_ref, "GitHub tree listing was truncated; some files will be missing");
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|item| item.kind == "blob")
            .map(|item| item.path)
            .collect())
    }

    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<Bytes> {
        let url = self.repo_url(&format!(
            "contents/{}?ref={}",
            encode_path(path),
            urlencoding::encode(git_ref)
        ));
        let contents: ContentsResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .with_context(|| format!("failed to parse contents response for {path}"))?;

        if contents.encoding == "base64" {
            return Ok(Bytes::from(decode_content(&contents.content)?));
        }

        // Files above the contents-API size limit come back without inline content.
        let download_url = contents
            .download_url
            .with_context(|| format!("no inline content or download_url for {path}"))?;
        let bytes = self.get(&download_url).await?.bytes().await?;
        Ok(bytes)
    }

    fn rate_limit_remaining(&self) -> Option<u64> {
        self.rate_limit.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GitHubSourceConfig {
        GitHubSourceConfig {
            owner: "example".to_string(),
            repo: "registry".to_string(),
            token_env: "REGISTRY_SYNC_TEST_UNSET_TOKEN".to_string(),
            ..GitHubSourceConfig::default()
        }
    }

    #[test]
    fn urls_are_built_from_config() {
        let source = GitHubSource::new(&config(), reqwest::Client::new()).unwrap();
        assert_eq!(
            source.repo_url("commits/main"),
            "https://api.github.com/repos/example/registry/commits/main"
        );
        assert_eq!(source.describe(), "github:example/registry");
    }

    #[test]
    fn owner_is_required() {
        let mut cfg = config();
        cfg.owner.clear();
        assert!(GitHubSource::new(&cfg, reqwest::Client::new()).is_err());
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_path("servers/a b.json"), "servers/a%20b.json");
        assert_eq!(encode_path("refs/heads/main"), "refs/heads/main");
    }

    #[test]
    fn wrapped_base64_is_decoded() {
        let decoded = decode_content("eyJh\nIjox\nfQ==\n").unwrap();
        assert_eq!(decoded, b"{\"a\":1}");
    }

    #[test]
    fn tree_response_keeps_blobs_only() {
        let body = serde_json::json!({
            "tree": [
                {"path": "servers", "type": "tree"},
                {"path": "servers/a.json", "type": "blob"}
            ],
            "truncated": false
        });
        let tree: TreeResponse = serde_json::from_value(body).unwrap();
        let blobs: Vec<_> = tree.tree.into_iter().filter(|i| i.kind == "blob").collect();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].path, "servers/a.json");
    }
}

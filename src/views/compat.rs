//! Compatibility envelope for the third-party registry client protocol.
//!
//! The client expects each version as
//! `{"server": <server.json object>, "_meta": {"io.modelcontextprotocol.registry/official": {...}}}`
//! and lists as `{"servers": [...], "metadata": {"count": n}}`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::model::{CanonicalEntry, SourceLocation, Transport, VersionRecord};

pub const SERVER_SCHEMA: &str =
    "https://static.modelcontextprotocol.io/schemas/2025-09-29/server.schema.json";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub server: ServerJson<'a>,
    #[serde(rename = "_meta")]
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    #[serde(rename = "io.modelcontextprotocol.registry/official")]
    pub official: Official,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Official {
    pub status: &'static str,
    pub published_at: String,
    pub updated_at: String,
    pub is_latest: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerJson<'a> {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<&'a str>,
    pub version: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageJson<'a>>,
    #[serde(skip_serializing_if = "no_remotes")]
    pub remotes: &'a [Transport],
}

#[derive(Debug, Serialize)]
pub struct RepositoryJson<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson<'a> {
    pub registry_type: &'a str,
    pub identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<&'a str>,
    pub transport: &'a Transport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariableJson<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariableJson<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<'a> {
    pub servers: Vec<Envelope<'a>>,
    pub metadata: ListMetadata,
}

#[derive(Debug, Serialize)]
pub struct ListMetadata {
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Wrap one version of an entry.  Entries without a release date report the
/// generation time as their publish time.
pub fn envelope<'a>(
    entry: &'a CanonicalEntry,
    version: &'a VersionRecord,
    generated_at: DateTime<Utc>,
) -> Envelope<'a> {
    let published_at = version
        .release_date
        .as_deref()
        .and_then(release_timestamp)
        .unwrap_or_else(|| generated_at.to_rfc3339_opts(SecondsFormat::Secs, true));

    Envelope {
        server: server_json(entry, version),
        meta: Meta {
            official: Official {
                status: "active",
                updated_at: published_at.clone(),
                published_at,
                is_latest: version.is_latest,
            },
        },
    }
}

pub fn list<'a>(servers: Vec<Envelope<'a>>) -> ListResponse<'a> {
    ListResponse {
        metadata: ListMetadata {
            count: servers.len(),
        },
        servers,
    }
}

fn server_json<'a>(entry: &'a CanonicalEntry, version: &'a VersionRecord) -> ServerJson<'a> {
    ServerJson {
        schema: SERVER_SCHEMA,
        name: &entry.identifier,
        title: entry.display_title.as_deref(),
        description: &entry.description,
        repository: entry.source_location.as_ref().map(repository_json),
        website_url: entry.homepage_url.as_deref(),
        version: &version.version,
        packages: version
            .distributions
            .iter()
            .map(|d| PackageJson {
                registry_type: d.kind.as_str(),
                identifier: &d.identifier,
                version: d.version.as_deref(),
                runtime_hint: d.runtime_hint.as_deref(),
                transport: &d.transport,
                environment_variables: d
                    .environment_variables
                    .iter()
                    .map(|v| EnvironmentVariableJson {
                        name: &v.name,
                        description: v.description.as_deref(),
                        is_required: v.required,
                        is_secret: v.secret,
                    })
                    .collect(),
            })
            .collect(),
        remotes: &version.remotes,
    }
}

fn no_remotes(remotes: &&[Transport]) -> bool {
    remotes.is_empty()
}

fn repository_json(loc: &SourceLocation) -> RepositoryJson<'_> {
    RepositoryJson {
        url: &loc.url,
        source: loc.kind.as_deref(),
        subfolder: loc.subfolder.as_deref(),
    }
}

/// `YYYY-MM-DD` becomes midnight UTC; RFC 3339 values are normalized to UTC.
fn release_timestamp(date: &str) -> Option<String> {
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        let midnight = day.and_hms_opt(0, 0, 0)?.and_utc();
        return Some(midnight.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

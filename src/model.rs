//! Canonical registry data model.
//!
//! Every raw file shape the normalizer accepts collapses into these types.
//! They are also the on-disk snapshot format written next to the
//! last-known-good marker, so the serde representation is stable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the dotted namespace and the short name of an identifier.
pub const IDENTIFIER_SEPARATOR: char = '/';

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One published service descriptor with its full version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntry {
    /// `namespace/name`, unique across the whole entry set.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    /// Descending precedence; exactly one record has `is_latest` set once
    /// [`CanonicalEntry::settle_latest`] has run.
    pub versions: Vec<VersionRecord>,
}

/// How the latest flag was settled for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestResolution {
    /// Exactly one version was flagged by the source.
    Declared,
    /// No version was flagged; the first in list order was chosen.
    Defaulted,
    /// Several versions were flagged; the first flagged one was kept.
    Multiple(usize),
}

impl CanonicalEntry {
    /// The version flagged `is_latest`, falling back to the first in list order.
    pub fn latest(&self) -> Option<&VersionRecord> {
        self.versions
            .iter()
            .find(|v| v.is_latest)
            .or_else(|| self.versions.first())
    }

    pub fn version(&self, version: &str) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Dotted namespace half of the identifier.
    #[cfg(test)]
    pub fn namespace(&self) -> &str {
        split_identifier(&self.identifier).map_or("", |(ns, _)| ns)
    }

    /// Short-name half of the identifier.
    #[cfg(test)]
    pub fn name(&self) -> &str {
        split_identifier(&self.identifier).map_or(self.identifier.as_str(), |(_, name)| name)
    }

    /// Merge `incoming` into the version list, keyed by version string.
    ///
    /// A repeated version string replaces the existing record in place; a new
    /// one is appended.  Returns how many records were overwritten.
    pub fn merge_versions(&mut self, incoming: Vec<VersionRecord>) -> usize {
        let mut overwritten = 0;
        for record in incoming {
            match self
                .versions
                .iter_mut()
                .find(|existing| existing.version == record.version)
            {
                Some(existing) => {
                    *existing = record;
                    overwritten += 1;
                }
                None => self.versions.push(record),
            }
        }
        overwritten
    }

    /// Leave exactly one version flagged `is_latest`.
    ///
    /// The first flagged version in list order wins; when none is flagged the
    /// first version is promoted.  No version-string comparison is done.
    pub fn settle_latest(&mut self) -> LatestResolution {
        let flagged = self.versions.iter().filter(|v| v.is_latest).count();
        let winner = self
            .versions
            .iter()
            .position(|v| v.is_latest)
            .unwrap_or(0);
        for (idx, record) in self.versions.iter_mut().enumerate() {
            record.is_latest = idx == winner;
        }
        match flagged {
            0 => LatestResolution::Defaulted,
            1 => LatestResolution::Declared,
            n => LatestResolution::Multiple(n),
        }
    }
}

/// Split `namespace/name` at its separator.
pub fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    identifier.split_once(IDENTIFIER_SEPARATOR)
}

/// Where the entry's source code lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub url: String,
    /// Provenance kind, e.g. `github`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
}

// ---------------------------------------------------------------------------
// Versions and distributions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub is_latest: bool,
    #[serde(default)]
    pub distributions: Vec<PackageDistribution>,
    /// Hosted endpoints; always a transport that carries a URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<Transport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDistribution {
    pub kind: PackageKind,
    /// Package name or download URL.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
}

/// Package manager a distribution is published through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PackageKind {
    Npm,
    Pypi,
    Oci,
    Nuget,
    /// Downloadable archive bundle.
    Mcpb,
    Other(String),
}

impl PackageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Oci => "oci",
            Self::Nuget => "nuget",
            Self::Mcpb => "mcpb",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "npm" => Self::Npm,
            "pypi" => Self::Pypi,
            "oci" | "docker" => Self::Oci,
            "nuget" => Self::Nuget,
            "mcpb" => Self::Mcpb,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for PackageKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<PackageKind> for String {
    fn from(kind: PackageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a client talks to a running entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Transport {
    Stdio,
    StreamableHttp { url: String },
    Sse { url: String },
}

impl Transport {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Stdio => None,
            Self::StreamableHttp { url } | Self::Sse { url } => Some(url),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::StreamableHttp { .. } => "streamable-http",
            Self::Sse { .. } => "sse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: &str, is_latest: bool) -> VersionRecord {
        VersionRecord {
            version: version.to_string(),
            release_date: None,
            is_latest,
            distributions: Vec::new(),
            remotes: Vec::new(),
        }
    }

    fn entry(versions: Vec<VersionRecord>) -> CanonicalEntry {
        CanonicalEntry {
            identifier: "io.example/foo".to_string(),
            display_title: None,
            description: "x".to_string(),
            source_location: None,
            homepage_url: None,
            versions,
        }
    }

    // ── Latest flag ─────────────────────────────────────────────────────

    #[test]
    fn settle_latest_defaults_to_first_in_list() {
        let mut e = entry(vec![record("1.0.0", false), record("2.0.0", false)]);
        assert_eq!(e.settle_latest(), LatestResolution::Defaulted);
        assert_eq!(e.latest().map(|v| v.version.as_str()), Some("1.0.0"));
        assert_eq!(e.versions.iter().filter(|v| v.is_latest).count(), 1);
    }

    #[test]
    fn settle_latest_keeps_first_of_many_flags() {
        let mut e = entry(vec![
            record("1.0.0", false),
            record("2.0.0", true),
            record("3.0.0", true),
        ]);
        assert_eq!(e.settle_latest(), LatestResolution::Multiple(2));
        assert_eq!(e.latest().map(|v| v.version.as_str()), Some("2.0.0"));
        assert!(!e.versions[2].is_latest);
    }

    // ── Merge law ───────────────────────────────────────────────────────

    #[test]
    fn merge_overwrites_repeated_version_and_appends_new() {
        let mut e = entry(vec![record("1.0.0", true)]);
        let mut replacement = record("1.0.0", true);
        replacement.release_date = Some("2025-01-01".to_string());

        let overwritten = e.merge_versions(vec![replacement, record("1.1.0", false)]);

        assert_eq!(overwritten, 1);
        assert_eq!(e.versions.len(), 2);
        assert_eq!(e.versions[0].release_date.as_deref(), Some("2025-01-01"));
        assert_eq!(e.versions[1].version, "1.1.0");
    }

    // ── Serde shapes ────────────────────────────────────────────────────

    #[test]
    fn transport_serializes_with_type_tag() {
        let t = Transport::StreamableHttp {
            url: "https://x.example/mcp".to_string(),
        };
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"type": "streamable-http", "url": "https://x.example/mcp"})
        );
    }

    #[test]
    fn package_kind_round_trips_unknown_values() {
        let kind: PackageKind = serde_json::from_str("\"cargo\"").unwrap();
        assert_eq!(kind, PackageKind::Other("cargo".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"cargo\"");
    }

    #[test]
    fn identifier_halves() {
        let e = entry(vec![record("1.0.0", true)]);
        assert_eq!(e.namespace(), "io.example");
        assert_eq!(e.name(), "foo");
    }
}

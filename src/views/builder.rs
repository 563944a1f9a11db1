//! Derive every published document from a canonical entry set.
//!
//! [`build_at`] is a pure function of its inputs; [`build`] only adds the
//! clock.  Two builds of the same entries at the same instant are
//! byte-identical.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use super::keys::{self, Format, VersionSelector};
use super::{browse, compat, Document, ViewSet};
use crate::model::{CanonicalEntry, SourceLocation, VersionRecord};

/// Version tag of the discovery document layout.
pub const FORMAT_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Every prefix gets an identical copy of the compatibility API.
    pub compat_prefixes: Vec<String>,
    /// Prefix for absolute links in generated documents.
    pub base_path: String,
    /// Content id of the source tree, recorded in the discovery document.
    pub content_id: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            compat_prefixes: vec!["v0".to_string(), "v0.1".to_string()],
            base_path: String::new(),
            content_id: None,
        }
    }
}

pub fn build(entries: Vec<CanonicalEntry>, opts: &BuildOptions) -> Result<ViewSet> {
    build_at(entries, opts, Utc::now())
}

/// Build at a fixed generation time.
pub fn build_at(
    entries: Vec<CanonicalEntry>,
    opts: &BuildOptions,
    generated_at: DateTime<Utc>,
) -> Result<ViewSet> {
    // Keyed by identifier, so every list below is in ordinal order.
    let entries: BTreeMap<String, CanonicalEntry> = entries
        .into_iter()
        .map(|e| (e.identifier.clone(), e))
        .collect();

    let mut docs = DocumentSet::default();
    let stamp = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    // ── native API ──
    docs.json(
        &keys::summary_dir(),
        &SummaryList {
            generated_at: &stamp,
            count: entries.len(),
            entries: entries.values().filter_map(summary_item).collect(),
        },
    )?;

    for entry in entries.values() {
        docs.json(&keys::entry_dir(&entry.identifier), &entry_detail(entry))?;
        for version in &entry.versions {
            let selector = VersionSelector::Exact(version.version.clone());
            docs.json(
                &keys::version_dir(&entry.identifier, &selector),
                &version_detail(entry, version),
            )?;
        }
        if let Some(latest) = entry.latest() {
            docs.json(
                &keys::version_dir(&entry.identifier, &VersionSelector::Latest),
                &version_detail(entry, latest),
            )?;
        }
    }

    // ── compatibility API ──
    for prefix in &opts.compat_prefixes {
        build_compat(&mut docs, prefix, &entries, generated_at)?;
    }

    // ── browsing index ──
    let root = keys::browse_root_dir();
    docs.json(&root, &browse::root_json(entries.values(), &opts.base_path))?;
    docs.html(&root, browse::root_html(entries.values(), &opts.base_path));
    for entry in entries.values() {
        let dir = keys::browse_entry_dir(&entry.identifier);
        docs.json(&dir, &browse::entry_json(entry, &opts.base_path))?;
        docs.html(&dir, browse::entry_html(entry, &opts.base_path));
    }

    // ── discovery ──
    docs.json("", &discovery(opts, &stamp, entries.len()))?;

    debug!(
        entries = entries.len(),
        documents = docs.0.len(),
        "built view set"
    );

    Ok(ViewSet {
        generated_at,
        content_id: opts.content_id.clone(),
        entries,
        documents: docs.0,
    })
}

fn build_compat(
    docs: &mut DocumentSet,
    prefix: &str,
    entries: &BTreeMap<String, CanonicalEntry>,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let latest: Vec<_> = entries
        .values()
        .filter_map(|e| e.latest().map(|v| compat::envelope(e, v, generated_at)))
        .collect();
    docs.json(&keys::compat_list_dir(prefix), &compat::list(latest))?;

    for entry in entries.values() {
        let id = &entry.identifier;
        let all = entry
            .versions
            .iter()
            .map(|v| compat::envelope(entry, v, generated_at))
            .collect();
        docs.json(&keys::compat_versions_dir(prefix, id), &compat::list(all))?;

        for version in &entry.versions {
            let selector = VersionSelector::Exact(version.version.clone());
            docs.json(
                &keys::compat_version_dir(prefix, id, &selector),
                &compat::envelope(entry, version, generated_at),
            )?;
        }
        if let Some(latest) = entry.latest() {
            let envelope = compat::envelope(entry, latest, generated_at);
            docs.json(&keys::compat_entry_dir(prefix, id), &envelope)?;
            docs.json(
                &keys::compat_version_dir(prefix, id, &VersionSelector::Latest),
                &envelope,
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Document accumulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DocumentSet(BTreeMap<String, Document>);

impl DocumentSet {
    fn json<T: Serialize>(&mut self, dir: &str, value: &T) -> Result<()> {
        let mut body = serde_json::to_vec_pretty(value)
            .with_context(|| format!("failed to serialize document for /{dir}"))?;
        body.push(b'\n');
        self.insert(dir, Format::Json, body);
        Ok(())
    }

    fn html(&mut self, dir: &str, page: String) {
        self.insert(dir, Format::Html, page.into_bytes());
    }

    fn insert(&mut self, dir: &str, format: Format, body: Vec<u8>) {
        self.0.insert(
            keys::file_key(dir, format),
            Document {
                format,
                body: Bytes::from(body),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Native document shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryList<'a> {
    generated_at: &'a str,
    count: usize,
    entries: Vec<SummaryItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryItem<'a> {
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    description: &'a str,
    latest_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_location: Option<&'a SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    homepage_url: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryDetail<'a> {
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_location: Option<&'a SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    homepage_url: Option<&'a str>,
    versions: Vec<VersionSummary<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionSummary<'a> {
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_date: Option<&'a str>,
    is_latest: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionDetail<'a> {
    identifier: &'a str,
    #[serde(flatten)]
    record: &'a VersionRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Discovery<'a> {
    format_version: &'static str,
    generated_at: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<&'a str>,
    entry_count: usize,
    summary: String,
    /// URI templates; `{identifier}` is the percent-encoded identifier.
    entry: String,
    version: String,
    latest: String,
    compat: Vec<CompatLocation<'a>>,
    browse: BrowseLocation,
}

#[derive(Serialize)]
struct CompatLocation<'a> {
    prefix: &'a str,
    servers: String,
}

#[derive(Serialize)]
struct BrowseLocation {
    html: String,
    json: String,
}

fn summary_item(entry: &CanonicalEntry) -> Option<SummaryItem<'_>> {
    let latest = entry.latest()?;
    Some(SummaryItem {
        identifier: &entry.identifier,
        title: entry.display_title.as_deref(),
        description: &entry.description,
        latest_version: &latest.version,
        source_location: entry.source_location.as_ref(),
        homepage_url: entry.homepage_url.as_deref(),
    })
}

fn entry_detail(entry: &CanonicalEntry) -> EntryDetail<'_> {
    EntryDetail {
        identifier: &entry.identifier,
        title: entry.display_title.as_deref(),
        description: &entry.description,
        source_location: entry.source_location.as_ref(),
        homepage_url: entry.homepage_url.as_deref(),
        versions: entry
            .versions
            .iter()
            .map(|v| VersionSummary {
                version: &v.version,
                release_date: v.release_date.as_deref(),
                is_latest: v.is_latest,
            })
            .collect(),
    }
}

fn version_detail<'a>(entry: &'a CanonicalEntry, record: &'a VersionRecord) -> VersionDetail<'a> {
    VersionDetail {
        identifier: &entry.identifier,
        record,
    }
}

fn discovery<'a>(opts: &'a BuildOptions, stamp: &'a str, entry_count: usize) -> Discovery<'a> {
    let base = &opts.base_path;
    let entry_template = keys::href(base, &format!("{}/{{identifier}}", keys::API_ROOT));
    Discovery {
        format_version: FORMAT_VERSION,
        generated_at: stamp,
        content_id: opts.content_id.as_deref(),
        entry_count,
        summary: keys::href(base, &keys::summary_dir()),
        version: format!("{entry_template}versions/{{version}}/"),
        latest: format!("{entry_template}versions/{}/", keys::LATEST),
        entry: entry_template,
        compat: opts
            .compat_prefixes
            .iter()
            .map(|prefix| CompatLocation {
                prefix,
                servers: keys::href(base, &keys::compat_list_dir(prefix)),
            })
            .collect(),
        browse: BrowseLocation {
            html: keys::href(base, &keys::browse_root_dir()),
            json: format!(
                "{}{}",
                keys::href(base, &keys::browse_root_dir()),
                Format::Json.file_name()
            ),
        },
    }
}

//! Two-level browsing index in the "simple index" style: a flat listing of
//! every identifier, and per identifier a listing of its versions.  Each
//! level is rendered as JSON and as hyperlinked HTML.
//!
//! Identifier links use the percent-encoded single-segment form so they
//! resolve through the router's decoding path.

use std::fmt::Write as _;

use serde::Serialize;

use super::keys::{self, VersionSelector};
use crate::model::CanonicalEntry;

const API_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct Meta {
    #[serde(rename = "api-version")]
    pub api_version: &'static str,
}

const META: Meta = Meta {
    api_version: API_VERSION,
};

#[derive(Debug, Serialize)]
pub struct RootIndex<'a> {
    pub meta: Meta,
    pub projects: Vec<ProjectLink<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ProjectLink<'a> {
    pub name: &'a str,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EntryIndex<'a> {
    pub meta: Meta,
    pub name: &'a str,
    pub versions: Vec<VersionLink<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionLink<'a> {
    pub version: &'a str,
    pub is_latest: bool,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Root level
// ---------------------------------------------------------------------------

pub fn root_json<'a>(
    entries: impl IntoIterator<Item = &'a CanonicalEntry>,
    base_path: &str,
) -> RootIndex<'a> {
    RootIndex {
        meta: META,
        projects: entries
            .into_iter()
            .map(|e| ProjectLink {
                name: &e.identifier,
                url: keys::href(base_path, &keys::browse_entry_dir(&e.identifier)),
            })
            .collect(),
    }
}

pub fn root_html<'a>(entries: impl IntoIterator<Item = &'a CanonicalEntry>, base_path: &str) -> String {
    let mut body = String::new();
    for entry in entries {
        let url = keys::href(base_path, &keys::browse_entry_dir(&entry.identifier));
        let _ = writeln!(
            body,
            "    <a href=\"{}\">{}</a><br/>",
            escape(&url),
            escape(&entry.identifier)
        );
    }
    page("Registry index", &body)
}

// ---------------------------------------------------------------------------
// Entry level
// ---------------------------------------------------------------------------

fn version_links<'a>(entry: &'a CanonicalEntry, base_path: &str) -> Vec<VersionLink<'a>> {
    entry
        .versions
        .iter()
        .map(|v| VersionLink {
            version: &v.version,
            is_latest: v.is_latest,
            url: keys::encoded_version_href(
                base_path,
                &entry.identifier,
                &VersionSelector::Exact(v.version.clone()),
            ),
        })
        .collect()
}

pub fn entry_json<'a>(entry: &'a CanonicalEntry, base_path: &str) -> EntryIndex<'a> {
    EntryIndex {
        meta: META,
        name: &entry.identifier,
        versions: version_links(entry, base_path),
    }
}

pub fn entry_html(entry: &CanonicalEntry, base_path: &str) -> String {
    let mut body = String::new();
    for link in version_links(entry, base_path) {
        let marker = if link.is_latest { " (latest)" } else { "" };
        let _ = writeln!(
            body,
            "    <a href=\"{}\">{}</a>{marker}<br/>",
            escape(&link.url),
            escape(link.version)
        );
    }
    page(&format!("Versions of {}", entry.identifier), &body)
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn page(title: &str, body: &str) -> String {
    let title = escape(title);
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <meta name=\"api-version\" value=\"{API_VERSION}\"/>\n    <title>{title}</title>\n  </head>\n  <body>\n    <h1>{title}</h1>\n{body}  </body>\n</html>\n"
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

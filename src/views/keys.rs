//! Document keys and link targets.
//!
//! A key is the file path of a document inside the static tree
//! (`api/entries/io.example/foo/index.json`).  The same string, minus the
//! trailing file name, is the URL path the live router answers on, so both
//! operating modes share one layout.
//!
//! Identifiers appear in two forms.  Directory paths use the two literal
//! segments (`io.example/foo`); generated links and browse-index directories
//! use the percent-encoded single segment (`io.example%2Ffoo`).

use std::borrow::Cow;

use crate::model::split_identifier;

pub const API_ROOT: &str = "api/entries";
pub const BROWSE_ROOT: &str = "simple";
pub const COMPAT_COLLECTION: &str = "servers";
pub const LATEST: &str = "latest";

/// Serialization format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Html,
}

impl Format {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Json => "index.json",
            Self::Html => "index.html",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

/// A requested version: an exact string or the latest alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Exact(String),
}

impl VersionSelector {
    /// `latest` is always the alias, never a literal version string.
    pub fn from_segment(segment: &str) -> Self {
        if segment == LATEST {
            Self::Latest
        } else {
            Self::Exact(segment.to_string())
        }
    }

    fn segment(&self) -> Cow<'_, str> {
        match self {
            Self::Latest => Cow::Borrowed(LATEST),
            Self::Exact(v) => urlencoding::encode(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Percent-encode a value as one path segment (`/` becomes `%2F`).
pub fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Decode one path segment.  `None` for invalid UTF-8.
pub fn decode_segment(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(Cow::into_owned)
}

/// `io.example/foo` as two literal, individually encoded segments.
fn literal_identifier(identifier: &str) -> String {
    match split_identifier(identifier) {
        Some((ns, name)) => format!("{}/{}", encode_segment(ns), encode_segment(name)),
        None => encode_segment(identifier),
    }
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

pub fn summary_dir() -> String {
    API_ROOT.to_string()
}

pub fn entry_dir(identifier: &str) -> String {
    format!("{API_ROOT}/{}", literal_identifier(identifier))
}

pub fn version_dir(identifier: &str, version: &VersionSelector) -> String {
    format!("{}/versions/{}", entry_dir(identifier), version.segment())
}

pub fn compat_list_dir(prefix: &str) -> String {
    format!("{prefix}/{COMPAT_COLLECTION}")
}

pub fn compat_entry_dir(prefix: &str, identifier: &str) -> String {
    format!("{}/{}", compat_list_dir(prefix), literal_identifier(identifier))
}

pub fn compat_versions_dir(prefix: &str, identifier: &str) -> String {
    format!("{}/versions", compat_entry_dir(prefix, identifier))
}

pub fn compat_version_dir(prefix: &str, identifier: &str, version: &VersionSelector) -> String {
    format!("{}/{}", compat_versions_dir(prefix, identifier), version.segment())
}

pub fn browse_root_dir() -> String {
    BROWSE_ROOT.to_string()
}

pub fn browse_entry_dir(identifier: &str) -> String {
    format!("{BROWSE_ROOT}/{}", encode_segment(identifier))
}

/// Document key for a directory in the given format.
pub fn file_key(dir: &str, format: Format) -> String {
    if dir.is_empty() {
        format.file_name().to_string()
    } else {
        format!("{dir}/{}", format.file_name())
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Absolute link to a directory, with the configured base path.
pub fn href(base_path: &str, dir: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if dir.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{dir}/")
    }
}

/// Link to an entry's version detail using the encoded single-segment form.
pub fn encoded_version_href(base_path: &str, identifier: &str, version: &VersionSelector) -> String {
    href(
        base_path,
        &format!(
            "{API_ROOT}/{}/versions/{}",
            encode_segment(identifier),
            version.segment()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_layout() {
        assert_eq!(entry_dir("io.example/foo"), "api/entries/io.example/foo");
        assert_eq!(
            version_dir("io.example/foo", &VersionSelector::Exact("1.0.0+b".into())),
            "api/entries/io.example/foo/versions/1.0.0%2Bb"
        );
        assert_eq!(
            compat_version_dir("v0", "io.example/foo", &VersionSelector::Latest),
            "v0/servers/io.example/foo/versions/latest"
        );
        assert_eq!(browse_entry_dir("io.example/foo"), "simple/io.example%2Ffoo");
    }

    #[test]
    fn file_keys_and_links() {
        assert_eq!(file_key("", Format::Json), "index.json");
        assert_eq!(file_key("simple", Format::Html), "simple/index.html");
        assert_eq!(href("", "simple"), "/simple/");
        assert_eq!(href("/reg/", ""), "/reg/");
        assert_eq!(
            encoded_version_href("", "io.example/foo", &VersionSelector::Latest),
            "/api/entries/io.example%2Ffoo/versions/latest/"
        );
    }

    #[test]
    fn segments_round_trip() {
        let encoded = encode_segment("io.example/foo");
        assert_eq!(encoded, "io.example%2Ffoo");
        assert_eq!(decode_segment(&encoded).as_deref(), Some("io.example/foo"));
    }
}

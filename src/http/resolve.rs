//! Map a raw request path to a document in the live view set.
//!
//! Identifiers contain the path separator, so a client may send one either
//! as two literal segments (`/api/entries/io.example/foo`) or as a single
//! percent-encoded segment (`/api/entries/io.example%2Ffoo`).  Both forms
//! are accepted: the literal split is tried first, then the encoded
//! segment.  Resolution works on the undecoded path, since decoding first
//! would erase the difference.

use std::fmt;

use crate::views::keys::{self, decode_segment, Format, VersionSelector, BROWSE_ROOT, COMPAT_COLLECTION};
use crate::views::ViewSet;

/// Collection segment accepted as an alias of `servers` under compat prefixes.
pub const COMPAT_ALIAS: &str = "entries";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Document key in the view set.
    pub key: String,
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Path,
    Entry(String),
    Version { identifier: String, version: String },
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "no such path"),
            Self::Entry(id) => write!(f, "no entry named {id}"),
            Self::Version {
                identifier,
                version,
            } => write!(f, "entry {identifier} has no version {version}"),
        }
    }
}

/// Which API family a path belongs to.
enum Family<'a> {
    Native,
    Compat(&'a str),
    Browse,
}

/// Resolve `raw_path` (the undecoded URI path) against `views`.
///
/// `preferred` picks between the JSON and HTML rendering where both exist;
/// an explicit `index.json`/`index.html` final segment overrides it.
pub fn resolve(
    views: &ViewSet,
    raw_path: &str,
    base_path: &str,
    compat_prefixes: &[String],
    preferred: Format,
) -> Result<Resolved, NotFound> {
    let path = strip_base(raw_path, base_path).ok_or(NotFound::Path)?;
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut format = preferred;
    if let Some(last) = segments.last() {
        if *last == Format::Json.file_name() {
            format = Format::Json;
            segments.pop();
        } else if *last == Format::Html.file_name() {
            format = Format::Html;
            segments.pop();
        }
    }

    let (family, rest) = match segments.as_slice() {
        [] => return found(views, "", Format::Json, None),
        ["api", "entries", rest @ ..] => (Family::Native, rest),
        [root, rest @ ..] if *root == BROWSE_ROOT => (Family::Browse, rest),
        [prefix, collection, rest @ ..]
            if compat_prefixes.iter().any(|p| p == prefix)
                && (*collection == COMPAT_COLLECTION || *collection == COMPAT_ALIAS) =>
        {
            (Family::Compat(prefix), rest)
        }
        _ => return Err(NotFound::Path),
    };

    if rest.is_empty() {
        let dir = match family {
            Family::Native => keys::summary_dir(),
            Family::Compat(prefix) => keys::compat_list_dir(prefix),
            Family::Browse => keys::browse_root_dir(),
        };
        return found(views, &dir, format, None);
    }

    let (identifier, tail) = split_identifier(views, rest)?;
    let dir = match (&family, tail) {
        (Family::Native, []) => keys::entry_dir(&identifier),
        (Family::Compat(prefix), []) => keys::compat_entry_dir(prefix, &identifier),
        (Family::Compat(prefix), ["versions"]) => keys::compat_versions_dir(prefix, &identifier),
        (Family::Browse, []) => keys::browse_entry_dir(&identifier),
        (Family::Native | Family::Compat(_), ["versions", version]) => {
            let version = decode_segment(version).ok_or(NotFound::Path)?;
            let selector = VersionSelector::from_segment(&version);
            if !views.has_version(&identifier, &selector) {
                return Err(NotFound::Version {
                    identifier,
                    version,
                });
            }
            match &family {
                Family::Compat(prefix) => keys::compat_version_dir(prefix, &identifier, &selector),
                _ => keys::version_dir(&identifier, &selector),
            }
        }
        _ => return Err(NotFound::Path),
    };
    found(views, &dir, format, Some(identifier))
}

/// Find the identifier at the start of `rest`: two literal segments first,
/// then one encoded segment.  Returns it with the remaining segments.
fn split_identifier<'a, 'b>(
    views: &ViewSet,
    rest: &'b [&'a str],
) -> Result<(String, &'b [&'a str]), NotFound> {
    if let [ns, name, tail @ ..] = rest {
        if let (Some(ns), Some(name)) = (decode_segment(ns), decode_segment(name)) {
            let candidate = format!("{ns}/{name}");
            if views.entry(&candidate).is_some() {
                return Ok((candidate, tail));
            }
        }
    }
    if let [single, tail @ ..] = rest {
        if let Some(candidate) = decode_segment(single) {
            if views.entry(&candidate).is_some() {
                return Ok((candidate, tail));
            }
            if candidate.contains('/') {
                return Err(NotFound::Entry(candidate));
            }
        }
    }
    match rest {
        [ns, name, ..] => Err(NotFound::Entry(format!(
            "{}/{}",
            decode_segment(ns).unwrap_or_default(),
            decode_segment(name).unwrap_or_default()
        ))),
        _ => Err(NotFound::Path),
    }
}

/// Look the directory up in the preferred format, falling back to the other.
fn found(
    views: &ViewSet,
    dir: &str,
    format: Format,
    identifier: Option<String>,
) -> Result<Resolved, NotFound> {
    let other = match format {
        Format::Json => Format::Html,
        Format::Html => Format::Json,
    };
    [format, other]
        .into_iter()
        .map(|f| keys::file_key(dir, f))
        .find(|key| views.document(key).is_some())
        .map(|key| Resolved { key, identifier })
        .ok_or(NotFound::Path)
}

fn strip_base<'a>(raw_path: &'a str, base_path: &str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(raw_path);
    }
    let rest = raw_path.strip_prefix(base)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalEntry, VersionRecord};
    use crate::views::{build, BuildOptions};

    fn entry(id: &str, versions: &[&str]) -> CanonicalEntry {
        CanonicalEntry {
            identifier: id.to_string(),
            display_title: None,
            description: "d".to_string(),
            source_location: None,
            homepage_url: None,
            versions: versions
                .iter()
                .enumerate()
                .map(|(i, v)| VersionRecord {
                    version: v.to_string(),
                    release_date: None,
                    is_latest: i == 0,
                    distributions: Vec::new(),
                    remotes: Vec::new(),
                })
                .collect(),
        }
    }

    fn views() -> ViewSet {
        build(
            vec![
                entry("io.example/foo", &["2.0.0", "1.0.0"]),
                entry("com.acme.tools/zed", &["0.1.0+build.5"]),
            ],
            &BuildOptions::default(),
        )
        .unwrap()
    }

    fn prefixes() -> Vec<String> {
        vec!["v0".to_string(), "v0.1".to_string()]
    }

    fn key(views: &ViewSet, path: &str) -> Result<String, NotFound> {
        resolve(views, path, "", &prefixes(), Format::Json).map(|r| r.key)
    }

    // ── identifier forms ──

    #[test]
    fn literal_and_encoded_forms_resolve_to_same_entry() {
        let views = views();
        for e in views.entries() {
            let (ns, name) = (e.namespace(), e.name());
            let literal = resolve(
                &views,
                &format!("/api/entries/{ns}/{name}"),
                "",
                &prefixes(),
                Format::Json,
            )
            .unwrap();
            let encoded = resolve(
                &views,
                &format!("/api/entries/{}", keys::encode_segment(&e.identifier)),
                "",
                &prefixes(),
                Format::Json,
            )
            .unwrap();
            assert_eq!(literal, encoded);
            assert_eq!(literal.identifier.as_deref(), Some(e.identifier.as_str()));
        }
    }

    #[test]
    fn encoded_separator_is_case_insensitive() {
        let views = views();
        assert_eq!(
            key(&views, "/api/entries/io.example%2ffoo/versions/latest").unwrap(),
            "api/entries/io.example/foo/versions/latest/index.json"
        );
    }

    #[test]
    fn version_paths_in_both_forms() {
        let views = views();
        let expected = "api/entries/io.example/foo/versions/1.0.0/index.json";
        assert_eq!(key(&views, "/api/entries/io.example/foo/versions/1.0.0").unwrap(), expected);
        assert_eq!(key(&views, "/api/entries/io.example%2Ffoo/versions/1.0.0/").unwrap(), expected);
        assert_eq!(
            key(&views, "/api/entries/com.acme.tools/zed/versions/0.1.0%2Bbuild.5").unwrap(),
            "api/entries/com.acme.tools/zed/versions/0.1.0%2Bbuild.5/index.json"
        );
    }

    // ── compat ──

    #[test]
    fn compat_paths_under_every_prefix_and_alias() {
        let views = views();
        assert_eq!(key(&views, "/v0/servers").unwrap(), "v0/servers/index.json");
        assert_eq!(key(&views, "/v0.1/entries").unwrap(), "v0.1/servers/index.json");
        assert_eq!(
            key(&views, "/v0/entries/io.example/foo/versions").unwrap(),
            "v0/servers/io.example/foo/versions/index.json"
        );
        assert_eq!(
            key(&views, "/v0.1/servers/io.example%2Ffoo/versions/latest").unwrap(),
            "v0.1/servers/io.example/foo/versions/latest/index.json"
        );
        assert_eq!(
            key(&views, "/v0/servers/io.example/foo").unwrap(),
            "v0/servers/io.example/foo/index.json"
        );
        assert_eq!(key(&views, "/v9/servers"), Err(NotFound::Path));
    }

    // ── static-style and browse ──

    #[test]
    fn static_file_names_select_format() {
        let views = views();
        assert_eq!(key(&views, "/").unwrap(), "index.json");
        assert_eq!(key(&views, "/index.json").unwrap(), "index.json");
        assert_eq!(key(&views, "/simple/index.html").unwrap(), "simple/index.html");
        assert_eq!(key(&views, "/simple/").unwrap(), "simple/index.json");
        assert_eq!(
            resolve(&views, "/simple/io.example%2Ffoo/", "", &prefixes(), Format::Html)
                .unwrap()
                .key,
            "simple/io.example%2Ffoo/index.html"
        );
    }

    #[test]
    fn base_path_is_stripped() {
        let views = views();
        let r = resolve(&views, "/registry/api/entries", "/registry", &prefixes(), Format::Json).unwrap();
        assert_eq!(r.key, "api/entries/index.json");
        assert_eq!(
            resolve(&views, "/registryx/api/entries", "/registry", &prefixes(), Format::Json),
            Err(NotFound::Path)
        );
    }

    // ── not found ──

    #[test]
    fn unknown_entries_and_versions_are_distinguished() {
        let views = views();
        assert_eq!(
            key(&views, "/api/entries/io.example/nope"),
            Err(NotFound::Entry("io.example/nope".to_string()))
        );
        assert_eq!(
            key(&views, "/api/entries/io.example%2Fnope"),
            Err(NotFound::Entry("io.example/nope".to_string()))
        );
        assert_eq!(
            key(&views, "/api/entries/io.example/foo/versions/9.9.9"),
            Err(NotFound::Version {
                identifier: "io.example/foo".to_string(),
                version: "9.9.9".to_string()
            })
        );
        assert_eq!(key(&views, "/nothing/here"), Err(NotFound::Path));
        assert_eq!(key(&views, "/api/entries/io.example/foo/extra"), Err(NotFound::Path));
    }
}

//! Published views.
//!
//! A [`ViewSet`] is every artifact derived from one canonical entry set:
//! summary list, entry and version detail, latest aliases, the
//! compatibility-wrapped API at each configured prefix, the browsing index
//! and the discovery document.  It is built once by [`builder::build`] and
//! never mutated afterwards; refreshes replace the whole value.

pub mod browse;
pub mod builder;
pub mod compat;
pub mod keys;
pub mod output;

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::model::CanonicalEntry;

pub use builder::{build, build_at, BuildOptions};
pub use keys::{Format, VersionSelector};

/// One rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub format: Format,
    pub body: Bytes,
}

/// Immutable set of published artifacts plus the entries they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSet {
    generated_at: DateTime<Utc>,
    content_id: Option<String>,
    entries: BTreeMap<String, CanonicalEntry>,
    documents: BTreeMap<String, Document>,
}

impl ViewSet {
    /// The answer set before anything has been built: no entries, no documents.
    pub fn empty() -> Self {
        Self {
            generated_at: DateTime::<Utc>::default(),
            content_id: None,
            entries: BTreeMap::new(),
            documents: BTreeMap::new(),
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Content id of the source tree this set was built from.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, identifier: &str) -> Option<&CanonicalEntry> {
        self.entries.get(identifier)
    }

    /// Entries in identifier order.
    pub fn entries(&self) -> impl Iterator<Item = &CanonicalEntry> {
        self.entries.values()
    }

    /// Whether `identifier` has the selected version.
    pub fn has_version(&self, identifier: &str, version: &VersionSelector) -> bool {
        self.entry(identifier).is_some_and(|entry| match version {
            VersionSelector::Latest => entry.latest().is_some(),
            VersionSelector::Exact(v) => entry.version(v).is_some(),
        })
    }

    pub fn document(&self, key: &str) -> Option<&Document> {
        self.documents.get(key)
    }

    /// Every document in key order.
    pub fn documents(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.documents.iter().map(|(k, d)| (k.as_str(), d))
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

//! Entry normalizer.
//!
//! Turns one raw file into zero or more [`CanonicalEntry`] values.  Three
//! document shapes are accepted and detected structurally (see [`shape`]):
//! a container with a `servers` array, a versioned entry with a `versions`
//! array, and a flat single-version entry.  Field validation lives in
//! [`validate`]; the whole-tree pass that enforces identifier uniqueness and
//! the version merge law lives in [`ingest`].
//!
//! Validation problems never abort a pass.  Each one becomes a
//! [`NormalizationError`] tagged with the originating path, the offending
//! entry is dropped, and everything else carries on.

pub mod ingest;
pub mod shape;
pub mod validate;

use std::fmt;

use serde::Serialize;

use crate::model::CanonicalEntry;
use crate::source::RawFile;

pub use ingest::{ingest, IngestReport};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tunables that are policy rather than schema.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Descriptions longer than this produce a warning, not an error.
    pub description_max_len: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            description_max_len: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The file (or one element) is not valid JSON/YAML or has wrong field types.
    Parse,
    /// None of the three recognised shapes matched.
    UnrecognizedShape,
    MissingField,
    InvalidIdentifier,
    /// A transport that needs a `url` has none, or the type is unknown.
    InvalidTransport,
    EmptyVersions,
    /// A version string that collides with a path segment the views reserve.
    ReservedVersion,
    /// Another file already declared this identifier.
    IdentifierConflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::UnrecognizedShape => "unrecognized-shape",
            Self::MissingField => "missing-field",
            Self::InvalidIdentifier => "invalid-identifier",
            Self::InvalidTransport => "invalid-transport",
            Self::EmptyVersions => "empty-versions",
            Self::ReservedVersion => "reserved-version",
            Self::IdentifierConflict => "identifier-conflict",
        }
    }
}

/// A per-entry (or per-file) validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationError {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub kind: ErrorKind,
    pub reason: String,
}

impl NormalizationError {
    pub fn new(path: &str, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            identifier: None,
            kind,
            reason: reason.into(),
        }
    }

    pub fn with_identifier(mut self, identifier: Option<&str>) -> Self {
        self.identifier = identifier.map(str::to_string);
        self
    }
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{}: {id}: {}", self.path, self.reason),
            None => write!(f, "{}: {}", self.path, self.reason),
        }
    }
}

impl std::error::Error for NormalizationError {}

/// Something tolerated but worth reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationWarning {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub reason: String,
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{}: {id}: {}", self.path, self.reason),
            None => write!(f, "{}: {}", self.path, self.reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Single-file entry point
// ---------------------------------------------------------------------------

/// Result of normalizing one raw file: the valid subset plus everything that
/// was dropped or tolerated along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileOutcome {
    pub entries: Vec<CanonicalEntry>,
    pub errors: Vec<NormalizationError>,
    pub warnings: Vec<NormalizationWarning>,
}

/// Normalize one raw file.
///
/// Container elements are normalized independently, so a bad element only
/// costs that element.
pub fn normalize(file: &RawFile, policy: &Policy) -> FileOutcome {
    let mut outcome = FileOutcome::default();

    let document = match shape::parse_document(&file.path, &file.content) {
        Ok(doc) => doc,
        Err(e) => {
            outcome.errors.push(e);
            return outcome;
        }
    };

    let candidates = match shape::detect(document) {
        Ok(shape::RawShape::Container(elements)) => elements
            .into_iter()
            .enumerate()
            .map(|(idx, element)| {
                shape::detect_element(element).map_err(|reason| {
                    NormalizationError::new(
                        &file.path,
                        ErrorKind::UnrecognizedShape,
                        format!("servers[{idx}]: {reason}"),
                    )
                })
            })
            .collect::<Vec<_>>(),
        Ok(single) => vec![Ok(single)],
        Err(reason) => vec![Err(NormalizationError::new(
            &file.path,
            ErrorKind::UnrecognizedShape,
            reason,
        ))],
    };

    for candidate in candidates {
        let result = candidate.and_then(|shape| {
            validate::validate_entry(&file.path, shape, policy, &mut outcome.warnings)
        });
        match result {
            Ok(entry) => outcome.entries.push(entry),
            Err(e) => outcome.errors.push(e),
        }
    }

    outcome
}

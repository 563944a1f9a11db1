//! Whole-tree ingestion pass.
//!
//! Files are processed in ascending path order.  The first file to declare an
//! identifier owns it; a later declaration from a different file is rejected
//! as a conflict.  A repeated declaration inside the same file merges its
//! versions into the first one.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::{normalize, ErrorKind, NormalizationError, NormalizationWarning, Policy};
use crate::model::CanonicalEntry;
use crate::source::RawFile;

/// Everything one ingestion pass produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Surviving entries, sorted by identifier.
    pub entries: Vec<CanonicalEntry>,
    pub errors: Vec<NormalizationError>,
    pub warnings: Vec<NormalizationWarning>,
    pub files_scanned: usize,
}

/// Normalize every raw file and enforce global identifier uniqueness.
pub fn ingest(files: &[RawFile], policy: &Policy) -> IngestReport {
    let mut ordered: Vec<&RawFile> = files.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let mut claimed: BTreeMap<String, (String, CanonicalEntry)> = BTreeMap::new();
    let mut report = IngestReport {
        files_scanned: ordered.len(),
        ..IngestReport::default()
    };

    for file in ordered {
        let outcome = normalize(file, policy);
        debug!(
            path = %file.path,
            entries = outcome.entries.len(),
            errors = outcome.errors.len(),
            "normalized raw file"
        );
        report.errors.extend(outcome.errors);
        report.warnings.extend(outcome.warnings);

        for entry in outcome.entries {
            match claimed.get_mut(&entry.identifier) {
                None => {
                    claimed.insert(entry.identifier.clone(), (file.path.clone(), entry));
                }
                Some((owner, existing)) if *owner == file.path => {
                    existing.merge_versions(entry.versions);
                    existing.settle_latest();
                    report.warnings.push(NormalizationWarning {
                        path: file.path.clone(),
                        identifier: Some(existing.identifier.clone()),
                        reason: "identifier declared more than once in this file; versions merged"
                            .to_string(),
                    });
                }
                Some((owner, _)) => {
                    report.errors.push(
                        NormalizationError::new(
                            &file.path,
                            ErrorKind::IdentifierConflict,
                            format!("identifier already declared in {owner}"),
                        )
                        .with_identifier(Some(&entry.identifier)),
                    );
                }
            }
        }
    }

    for e in &report.errors {
        warn!(
            path = %e.path,
            identifier = e.identifier.as_deref().unwrap_or(""),
            kind = e.kind.as_str(),
            reason = %e.reason,
            "dropping entry"
        );
    }
    for w in &report.warnings {
        debug!(
            path = %w.path,
            identifier = w.identifier.as_deref().unwrap_or(""),
            reason = %w.reason,
            "normalization warning"
        );
    }

    report.entries = claimed.into_values().map(|(_, entry)| entry).collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn raw(path: &str, value: serde_json::Value) -> RawFile {
        RawFile {
            path: path.to_string(),
            content: Bytes::from(serde_json::to_vec(&value).unwrap()),
        }
    }

    fn flat(name: &str, version: &str, package: &str) -> serde_json::Value {
        json!({
            "name": name,
            "description": "d",
            "version": version,
            "packages": [{"registryType": "npm", "identifier": package}]
        })
    }

    #[test]
    fn conflicting_identifier_in_later_file_is_rejected() {
        let files = vec![
            raw("servers/b.json", flat("io.example/foo", "2.0.0", "from-b")),
            raw("servers/a.json", flat("io.example/foo", "1.0.0", "from-a")),
        ];
        let report = ingest(&files, &Policy::default());

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].versions[0].version, "1.0.0");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ErrorKind::IdentifierConflict);
        assert_eq!(report.errors[0].path, "servers/b.json");
        assert!(report.errors[0].reason.contains("servers/a.json"));
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let a = raw("servers/a.json", flat("io.example/a", "1.0.0", "a"));
        let b = raw("servers/b.json", flat("io.example/b", "1.0.0", "b"));
        let c = raw("servers/c.json", flat("io.example/a", "9.9.9", "c"));

        let forward = ingest(&[a.clone(), b.clone(), c.clone()], &Policy::default());
        let backward = ingest(&[c, b, a], &Policy::default());
        assert_eq!(forward, backward);
    }

    #[test]
    fn same_file_redeclaration_merges_versions() {
        let file = raw(
            "servers/all.json",
            json!({"servers": [
                flat("io.example/foo", "1.0.0", "old"),
                flat("io.example/foo", "1.0.0", "new"),
                flat("io.example/foo", "1.1.0", "next"),
            ]}),
        );
        let report = ingest(&[file], &Policy::default());

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let entry = &report.entries[0];
        let versions: Vec<&str> = entry.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0"]);
        assert_eq!(entry.versions[0].distributions[0].identifier, "new");
        assert_eq!(entry.versions.iter().filter(|v| v.is_latest).count(), 1);
    }

    #[test]
    fn entries_are_sorted_by_identifier() {
        let files = vec![
            raw("servers/z.json", flat("io.example/alpha", "1.0.0", "x")),
            raw("servers/a.json", flat("com.example/zeta", "1.0.0", "y")),
        ];
        let report = ingest(&files, &Policy::default());
        let ids: Vec<&str> = report.entries.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["com.example/zeta", "io.example/alpha"]);
        assert_eq!(report.files_scanned, 2);
    }
}

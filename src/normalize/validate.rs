//! Field validation: raw entry objects to [`CanonicalEntry`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::shape::RawShape;
use super::{ErrorKind, NormalizationError, NormalizationWarning, Policy};
use crate::model::{
    CanonicalEntry, EnvironmentVariable, LatestResolution, PackageDistribution, PackageKind,
    SourceLocation, Transport, VersionRecord,
};

/// Dotted lowercase namespace, exactly one separator, lowercase short name.
static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*(\.[a-z][a-z0-9-]*)*/[a-z][a-z0-9-]*$")
        .expect("identifier pattern is valid")
});

pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_RE.is_match(identifier)
}

// ---------------------------------------------------------------------------
// Raw shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    repository: Option<RawRepository>,
    #[serde(alias = "homepage", alias = "website_url")]
    website_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    url: Option<String>,
    source: Option<String>,
    subfolder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVersion {
    version: Option<String>,
    #[serde(alias = "release_date")]
    release_date: Option<String>,
    #[serde(alias = "is_latest")]
    is_latest: Option<bool>,
    #[serde(default)]
    packages: Vec<RawPackage>,
    #[serde(default)]
    remotes: Vec<RawTransport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackage {
    #[serde(alias = "registry_type", alias = "registryName")]
    registry_type: Option<String>,
    identifier: Option<String>,
    version: Option<String>,
    #[serde(alias = "runtime_hint")]
    runtime_hint: Option<String>,
    transport: Option<RawTransport>,
    #[serde(default, alias = "environment_variables")]
    environment_variables: Vec<RawEnvironmentVariable>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTransport {
    Bare(String),
    Full {
        #[serde(rename = "type")]
        kind: Option<String>,
        url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvironmentVariable {
    name: Option<String>,
    description: Option<String>,
    #[serde(alias = "required")]
    is_required: Option<bool>,
    #[serde(alias = "secret")]
    is_secret: Option<bool>,
}

// ---------------------------------------------------------------------------
// Entry validation
// ---------------------------------------------------------------------------

/// Per-entry context so every error and warning carries path + identifier.
struct Ctx<'a> {
    path: &'a str,
    identifier: Option<&'a str>,
    warnings: &'a mut Vec<NormalizationWarning>,
}

impl Ctx<'_> {
    fn error(&self, kind: ErrorKind, reason: impl Into<String>) -> NormalizationError {
        NormalizationError::new(self.path, kind, reason).with_identifier(self.identifier)
    }

    fn warn(&mut self, reason: impl Into<String>) {
        self.warnings.push(NormalizationWarning {
            path: self.path.to_string(),
            identifier: self.identifier.map(str::to_string),
            reason: reason.into(),
        });
    }
}

/// Validate one entry-shaped object.  Containers must already be split.
pub fn validate_entry(
    path: &str,
    shape: RawShape,
    policy: &Policy,
    warnings: &mut Vec<NormalizationWarning>,
) -> Result<CanonicalEntry, NormalizationError> {
    let (map, flat) = match shape {
        RawShape::Versioned(map) => (map, false),
        RawShape::Flat(map) => (map, true),
        RawShape::Container(_) => {
            return Err(NormalizationError::new(
                path,
                ErrorKind::UnrecognizedShape,
                "nested container is not allowed",
            ))
        }
    };

    let claimed = map
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut ctx = Ctx {
        path,
        identifier: claimed.as_deref(),
        warnings,
    };

    let raw: RawEntry = serde_json::from_value(Value::Object(entry_fields(&map)))
        .map_err(|e| ctx.error(ErrorKind::Parse, format!("malformed entry: {e}")))?;

    let identifier = raw
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ctx.error(ErrorKind::MissingField, "missing `name`"))?;
    if !is_valid_identifier(&identifier) {
        return Err(ctx.error(
            ErrorKind::InvalidIdentifier,
            format!("identifier `{identifier}` must look like `namespace.sub/name` in lowercase"),
        ));
    }

    let description = raw
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ctx.error(ErrorKind::MissingField, "missing `description`"))?;
    let len = description.chars().count();
    if len > policy.description_max_len {
        ctx.warn(format!(
            "description is {len} characters, limit is {}",
            policy.description_max_len
        ));
    }

    let raw_versions = if flat {
        let mut single: RawVersion = serde_json::from_value(Value::Object(map))
            .map_err(|e| ctx.error(ErrorKind::Parse, format!("malformed version: {e}")))?;
        single.is_latest = Some(true);
        vec![single]
    } else {
        let Some(Value::Array(items)) = map.get("versions") else {
            return Err(ctx.error(ErrorKind::Parse, "`versions` must be an array"));
        };
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                serde_json::from_value::<RawVersion>(item.clone()).map_err(|e| {
                    ctx.error(ErrorKind::Parse, format!("malformed versions[{idx}]: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    if raw_versions.is_empty() {
        return Err(ctx.error(ErrorKind::EmptyVersions, "entry declares no versions"));
    }

    let mut entry = CanonicalEntry {
        identifier,
        display_title: raw.title.filter(|t| !t.is_empty()),
        description,
        source_location: raw.repository.and_then(|r| {
            r.url.filter(|u| !u.is_empty()).map(|url| SourceLocation {
                url,
                kind: r.source,
                subfolder: r.subfolder,
            })
        }),
        homepage_url: raw.website_url.filter(|u| !u.is_empty()),
        versions: Vec::with_capacity(raw_versions.len()),
    };

    for raw_version in raw_versions {
        let record = validate_version(&mut ctx, raw_version)?;
        if entry.merge_versions(vec![record.clone()]) > 0 {
            ctx.warn(format!(
                "version `{}` declared more than once; later declaration wins",
                record.version
            ));
        }
    }

    if let LatestResolution::Multiple(n) = entry.settle_latest() {
        ctx.warn(format!("{n} versions flagged isLatest; keeping the first"));
    }

    Ok(entry)
}

/// Entry-level fields only; version fields of a flat entry are read separately.
fn entry_fields(map: &Map<String, Value>) -> Map<String, Value> {
    const KEYS: &[&str] = &[
        "name",
        "title",
        "description",
        "repository",
        "websiteUrl",
        "website_url",
        "homepage",
    ];
    map.iter()
        .filter(|(k, _)| KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Version strings that would land on the `latest` alias or vanish as
/// relative path segments.
const RESERVED_VERSIONS: &[&str] = &["latest", ".", ".."];

fn validate_version(ctx: &mut Ctx<'_>, raw: RawVersion) -> Result<VersionRecord, NormalizationError> {
    let version = raw
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ctx.error(ErrorKind::MissingField, "version record missing `version`"))?;
    if RESERVED_VERSIONS.contains(&version.as_str()) {
        return Err(ctx.error(
            ErrorKind::ReservedVersion,
            format!("version `{version}` is reserved and cannot be published"),
        ));
    }

    let release_date = match raw.release_date {
        Some(date) if is_valid_date(&date) => Some(date),
        Some(date) => {
            ctx.warn(format!(
                "version `{version}`: dropping malformed releaseDate `{date}`"
            ));
            None
        }
        None => None,
    };

    let mut distributions = Vec::with_capacity(raw.packages.len());
    for (idx, package) in raw.packages.into_iter().enumerate() {
        distributions.push(validate_package(ctx, &version, idx, package)?);
    }
    if distributions.is_empty() {
        ctx.warn(format!("version `{version}` has no distributions"));
    }

    let mut remotes = Vec::with_capacity(raw.remotes.len());
    for (idx, remote) in raw.remotes.into_iter().enumerate() {
        let transport = convert_transport(ctx, &format!("version `{version}` remotes[{idx}]"), Some(remote))?;
        if transport.url().is_none() {
            return Err(ctx.error(
                ErrorKind::InvalidTransport,
                format!("version `{version}` remotes[{idx}]: remote endpoints need an http transport"),
            ));
        }
        remotes.push(transport);
    }

    Ok(VersionRecord {
        version,
        release_date,
        is_latest: raw.is_latest.unwrap_or(false),
        distributions,
        remotes,
    })
}

fn validate_package(
    ctx: &mut Ctx<'_>,
    version: &str,
    idx: usize,
    raw: RawPackage,
) -> Result<PackageDistribution, NormalizationError> {
    let at = format!("version `{version}` packages[{idx}]");

    let kind = raw
        .registry_type
        .filter(|k| !k.is_empty())
        .map(|k| PackageKind::parse(&k))
        .ok_or_else(|| ctx.error(ErrorKind::MissingField, format!("{at}: missing `registryType`")))?;
    if !kind.is_known() {
        ctx.warn(format!("{at}: unknown registry type `{kind}`"));
    }

    let identifier = raw
        .identifier
        .filter(|i| !i.is_empty())
        .ok_or_else(|| ctx.error(ErrorKind::MissingField, format!("{at}: missing `identifier`")))?;

    let transport = convert_transport(ctx, &at, raw.transport)?;

    let environment_variables = raw
        .environment_variables
        .into_iter()
        .enumerate()
        .map(|(env_idx, var)| {
            let name = var.name.filter(|n| !n.is_empty()).ok_or_else(|| {
                ctx.error(
                    ErrorKind::MissingField,
                    format!("{at}: environmentVariables[{env_idx}] missing `name`"),
                )
            })?;
            Ok(EnvironmentVariable {
                name,
                description: var.description,
                required: var.is_required,
                secret: var.is_secret,
            })
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;

    Ok(PackageDistribution {
        kind,
        identifier,
        version: raw.version,
        transport,
        runtime_hint: raw.runtime_hint,
        environment_variables,
    })
}

fn convert_transport(
    ctx: &Ctx<'_>,
    at: &str,
    raw: Option<RawTransport>,
) -> Result<Transport, NormalizationError> {
    let (kind, url) = match raw {
        None => return Ok(Transport::Stdio),
        Some(RawTransport::Bare(kind)) => (Some(kind), None),
        Some(RawTransport::Full { kind, url }) => (kind, url.filter(|u| !u.is_empty())),
    };

    let needs_url = |ctor: fn(String) -> Transport, name: &str| {
        url.clone().map(ctor).ok_or_else(|| {
            ctx.error(
                ErrorKind::InvalidTransport,
                format!("{at}: transport `{name}` requires `url`"),
            )
        })
    };

    match kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None if url.is_none() => Ok(Transport::Stdio),
        None => Err(ctx.error(
            ErrorKind::InvalidTransport,
            format!("{at}: transport has a `url` but no `type`"),
        )),
        Some("stdio") => Ok(Transport::Stdio),
        Some("streamable-http" | "streamable_http" | "http" | "http-stream") => {
            needs_url(|url| Transport::StreamableHttp { url }, "streamable-http")
        }
        Some("sse" | "server-sent-events") => needs_url(|url| Transport::Sse { url }, "sse"),
        Some(other) => Err(ctx.error(
            ErrorKind::InvalidTransport,
            format!("{at}: unknown transport type `{other}`"),
        )),
    }
}

fn is_valid_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

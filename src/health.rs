use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::sync::{RegistrySession, SyncStatus};
use crate::views::ViewSet;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// A view set is live.
    pub views: CheckResult,
    /// The most recent refresh attempt succeeded.
    pub last_refresh: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy(detail: Option<String>) -> Self {
        Self { ok: true, detail }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn check_views(views: &ViewSet) -> CheckResult {
    if views.is_empty() {
        return CheckResult::unhealthy("no view set has been published");
    }
    CheckResult::healthy(Some(format!(
        "{} entries, generated {}",
        views.entry_count(),
        views.generated_at().to_rfc3339()
    )))
}

/// `last_error` is only cleared by a successful refresh, so a retry that is
/// still running keeps reporting the previous failure.
fn check_last_refresh(status: &SyncStatus) -> CheckResult {
    match &status.last_error {
        Some(err) => CheckResult::unhealthy(err.clone()),
        None => CheckResult::healthy(status.content_id.clone()),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if !checks.views.ok {
        // Nothing to serve.
        HealthStatus::Unhealthy
    } else if !checks.last_refresh.ok {
        // Still serving the last good view set.
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

/// Evaluate health from the session's current status and view set.
pub fn evaluate(session: &RegistrySession) -> HealthResponse {
    let views = session.views();
    let status = session.status();
    let checks = HealthChecks {
        views: check_views(&views),
        last_refresh: check_last_refresh(&status),
    };
    HealthResponse {
        status: aggregate_status(&checks),
        checks,
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Health check handler.
///
/// Returns HTTP 200 when status is `ok` or `degraded`, and HTTP 503 when
/// `unhealthy`.
pub fn health_handler(session: &RegistrySession) -> impl IntoResponse {
    let response = evaluate(session);
    let http_status = if response.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::Phase;
    use crate::views::{build, BuildOptions};

    #[test]
    fn unhealthy_until_something_is_published() {
        let session = RegistrySession::new("memory", "main");
        let health = evaluate(&session);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(!health.checks.views.ok);
    }

    #[test]
    fn failed_refresh_over_live_views_is_degraded() {
        let session = RegistrySession::new("memory", "main");
        session.publish(Arc::new(build(Vec::new(), &BuildOptions::default()).unwrap()));
        assert_eq!(evaluate(&session).status, HealthStatus::Ok);

        session.update_status(|s| {
            s.phase = Phase::BuildFailed;
            s.last_error = Some("upstream unreachable".to_string());
        });
        let health = evaluate(&session);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(
            health.checks.last_refresh.detail.as_deref(),
            Some("upstream unreachable")
        );
    }

    #[test]
    fn retry_in_progress_still_reports_the_failure() {
        let session = RegistrySession::new("memory", "main");
        session.publish(Arc::new(build(Vec::new(), &BuildOptions::default()).unwrap()));
        session.update_status(|s| {
            s.phase = Phase::BuildFailed;
            s.last_error = Some("fetch timed out after 30s".to_string());
        });
        for phase in [Phase::CheckingForUpdate, Phase::BuildInProgress] {
            session.update_status(|s| s.phase = phase);
            assert_eq!(evaluate(&session).status, HealthStatus::Degraded, "{phase:?}");
        }

        session.update_status(|s| {
            s.phase = Phase::Synced;
            s.last_error = None;
        });
        assert_eq!(evaluate(&session).status, HealthStatus::Ok);
    }

    #[test]
    fn serializes_lowercase_status() {
        let session = RegistrySession::new("memory", "main");
        let value = serde_json::to_value(evaluate(&session)).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["checks"]["views"]["ok"], false);
    }
}

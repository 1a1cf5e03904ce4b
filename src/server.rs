//! HTTP front end.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /status` | `{version, runtime_version, environment}` |
//! | `GET /dependencies?url=<repo>[&branch=]` | `{dependencies: [...]}` |
//!
//! A malformed repository URL is a 400, any other failure a 500. Error
//! bodies are `{"error": "..."}`.

use crate::doctor::Doctor;
use crate::error::Error;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub doctor: Arc<Doctor>,
    pub environment: String,
}

impl AppState {
    pub fn new(doctor: Doctor, environment: impl Into<String>) -> Self {
        Self {
            doctor: Arc::new(doctor),
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub version: String,
    /// Version of the rustc that built this binary.
    pub runtime_version: String,
    pub environment: String,
}

impl StatusResponse {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            runtime_version: env!("DEPDOCTOR_RUSTC_VERSION").to_string(),
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DependenciesQuery {
    pub url: String,
    pub branch: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependenciesResponse {
    pub dependencies: Vec<String>,
}

/// Maps crate errors onto HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_user_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/dependencies", get(dependencies))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::new(state.environment.clone()))
}

async fn dependencies(
    State(state): State<AppState>,
    Query(query): Query<DependenciesQuery>,
) -> Result<Json<DependenciesResponse>, ApiError> {
    let dependencies = state
        .doctor
        .dependencies(&query.url, query.branch.as_deref())
        .await
        .inspect_err(|e| error!(url = %query.url, error = %e, "dependency extraction failed"))?;

    Ok(Json(DependenciesResponse { dependencies }))
}

/// Serves the router on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(addr: SocketAddr, state: AppState) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, environment = %state.environment, "listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{AuditRunner, VersionRegistry};
    use crate::manifest::{ManifestSource, RepoRef};
    use crate::model::ScanOutcome;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct FakeSource {
        fail: bool,
    }

    #[async_trait]
    impl ManifestSource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_file(
            &self,
            _repo: &RepoRef,
            path: &str,
            branch: &str,
        ) -> crate::Result<Option<String>> {
            if self.fail {
                return Err(Error::upstream("fake", "HTTP 503"));
            }
            match (path, branch) {
                ("requirements.txt", "main") => Ok(Some("click>=8.0.0\n# comment\n\npathspec>=0.9.0\n".to_string())),
                ("requirements.txt", "dev") => Ok(Some("numpy\n".to_string())),
                _ => Ok(None),
            }
        }
    }

    struct NoRegistry;

    #[async_trait]
    impl VersionRegistry for NoRegistry {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn latest_version(&self, _package: &str) -> Option<String> {
            None
        }
    }

    struct NoAudit;

    #[async_trait]
    impl AuditRunner for NoAudit {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn audit(&self, _pinned: &[String]) -> ScanOutcome {
            ScanOutcome::Clean
        }
    }

    fn app(fail: bool) -> Router {
        let doctor = Doctor::new(
            Arc::new(FakeSource { fail }),
            Arc::new(NoRegistry),
            Arc::new(NoAudit),
        );
        create_router(AppState::new(doctor, "test"))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_reports_version_and_environment() {
        let (status, body) = get_json(app(false), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["runtime_version"], env!("DEPDOCTOR_RUSTC_VERSION"));
        // The compiler version, not the declared minimum.
        let runtime = body["runtime_version"].as_str().unwrap();
        assert!(runtime == "unknown" || runtime.starts_with(|c: char| c.is_ascii_digit()));
        assert!(!runtime.contains("rustc"));
        assert_eq!(body["environment"], "test");
    }

    #[tokio::test]
    async fn test_dependencies_returns_declarations() {
        let (status, body) = get_json(
            app(false),
            "/dependencies?url=https%3A%2F%2Fgithub.com%2Fpsf%2Fblack",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["dependencies"],
            serde_json::json!(["click>=8.0.0", "pathspec>=0.9.0"])
        );
    }

    #[tokio::test]
    async fn test_dependencies_honors_branch() {
        let (status, body) = get_json(
            app(false),
            "/dependencies?url=https%3A%2F%2Fgithub.com%2Fpsf%2Fblack&branch=dev",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dependencies"], serde_json::json!(["numpy"]));
    }

    #[tokio::test]
    async fn test_malformed_url_is_bad_request() {
        let (status, body) = get_json(app(false), "/dependencies?url=not-a-repo").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid GitHub URL"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_server_error() {
        let (status, body) = get_json(
            app(true),
            "/dependencies?url=https%3A%2F%2Fgithub.com%2Fpsf%2Fblack",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }
}

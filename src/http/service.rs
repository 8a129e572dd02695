//! Rate limit check endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::ratelimit::{AdmissionControl, Outcome};

/// Query parameters of a rate limit check.
#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
    /// The data source being accessed
    pub datasource: Option<String>,
    /// The user making the request, if known
    pub user: Option<String>,
}

/// Build the router serving rate limit checks.
pub fn router<R: AdmissionControl + 'static>(rate_limiter: Arc<R>) -> Router {
    Router::new()
        .route("/", get(check::<R>))
        .route("/health", get(|| async { "OK" }))
        .with_state(rate_limiter)
}

/// Determine whether a request may be served.
#[instrument(skip_all, fields(datasource = ?params.datasource, user = ?params.user))]
async fn check<R: AdmissionControl + 'static>(
    State(rate_limiter): State<Arc<R>>,
    Query(params): Query<CheckParams>,
) -> Response {
    let Some(datasource) = params.datasource.as_deref().filter(|d| !d.is_empty()) else {
        warn!("Received rate limit check without a data source");
        return (StatusCode::BAD_REQUEST, "datasource is required").into_response();
    };

    debug!("Processing rate limit check");

    let outcome = rate_limiter
        .evaluate(datasource, params.user.as_deref())
        .await;

    info!(
        datasource = %datasource,
        allowed = outcome.is_allowed(),
        "Rate limit decision made"
    );

    outcome_response(outcome)
}

fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Allowed => StatusCode::OK.into_response(),
        Outcome::Denied { message, .. } => (StatusCode::TOO_MANY_REQUESTS, message).into_response(),
        Outcome::Invalid(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
        Outcome::Backend(e) => {
            error!(error = %e, "Counter store failure");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::ratelimit::{QuotaTable, QuotaThresholds, RateLimiter, Tier};
    use crate::store::{InMemoryStore, StoreError};

    fn test_router() -> Router {
        let quotas = QuotaTable::new().with_source(
            "DataSourceA",
            QuotaThresholds::new().with(Tier::UserHourly, 2),
        );
        router(Arc::new(RateLimiter::new(quotas, InMemoryStore::new())))
    }

    async fn send(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    struct BrokenLimiter;

    #[async_trait]
    impl AdmissionControl for BrokenLimiter {
        async fn evaluate(&self, _data_source: &str, _user: Option<&str>) -> Outcome {
            Outcome::Backend(StoreError::Unavailable("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_allowed_then_denied() {
        let app = test_router();

        for _ in 0..2 {
            let (status, body) = send(&app, "/?datasource=DataSourceA&user=U").await;
            assert_eq!(status, StatusCode::OK);
            assert!(body.is_empty());
        }

        let (status, body) = send(&app, "/?datasource=DataSourceA&user=U").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, "Exceeded the UserHourly rate limit of 2.");
    }

    #[tokio::test]
    async fn test_unknown_data_source_is_bad_request() {
        let app = test_router();

        let (status, body) = send(&app, "/?datasource=Other&user=U").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "unknown data source");
    }

    #[tokio::test]
    async fn test_missing_data_source_is_bad_request() {
        let app = test_router();

        let (status, _) = send(&app, "/?user=U").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "/?datasource=&user=U").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_server_error() {
        let app = router(Arc::new(BrokenLimiter));

        let (status, _) = send(&app, "/?datasource=DataSourceA").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&test_router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}

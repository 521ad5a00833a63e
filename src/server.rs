//! HTTP surface: the scheduled refresh endpoints and read-only price routes.

use crate::core::admin::ActionResponse;
use crate::core::refresh::{FullRefreshSummary, GoldRefreshSummary};
use crate::core::valuation::ActPriceSnapshot;
use crate::{AppContext, DEFAULT_HISTORY_LIMIT};
use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

type AppState = Arc<AppContext>;

pub fn app_router(ctx: AppState) -> Router {
    Router::new()
        .route(
            "/api/cron/update-gold-price",
            get(update_gold_price).post(update_gold_price),
        )
        .route("/api/cron/update-rates", get(update_rates).post(update_rates))
        .route("/api/act/price", get(current_price))
        .route("/api/act/history", get(price_history))
        .route("/healthz", get(healthz))
        .with_state(ctx)
}

/// Accepts `Authorization: Bearer <secret>`. With no secret configured every
/// request passes.
fn check_cron_secret(headers: &HeaderMap, secret: Option<&str>) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let mut parts = header.splitn(2, ' ');
    let (Some(scheme), Some(token)) = (parts.next(), parts.next()) else {
        return Err(ApiError::Unauthorized);
    };
    if !scheme.eq_ignore_ascii_case("Bearer") || token.trim() != secret {
        warn!("Rejected cron request with invalid credentials");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn update_gold_price(
    State(ctx): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<GoldRefreshSummary>)> {
    check_cron_secret(&headers, ctx.config.cron.secret.as_deref())?;
    let summary = ctx.jobs.refresh_gold().await;
    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(summary)))
}

async fn update_rates(
    State(ctx): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<FullRefreshSummary>> {
    check_cron_secret(&headers, ctx.config.cron.secret.as_deref())?;
    Ok(Json(ctx.jobs.refresh_all().await))
}

async fn current_price(
    State(ctx): State<AppState>,
) -> ApiResult<Json<ActionResponse<ActPriceSnapshot>>> {
    let response = ctx.admin.current_price().await;
    if !response.success {
        return Err(ApiError::Internal(response.error.unwrap_or_default()));
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn price_history(
    State(ctx): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<ActionResponse<Vec<ActPriceSnapshot>>>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let response = ctx.admin.price_history(limit).await;
    if !response.success {
        return Err(ApiError::Internal(response.error.unwrap_or_default()));
    }
    Ok(Json(response))
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn serve(ctx: AppState) -> anyhow::Result<()> {
    if ctx.config.cron.secret.is_none() {
        warn!("No cron secret configured, refresh endpoints accept unauthenticated requests");
    }
    let addr = ctx.config.server.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app_router(ctx))
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_cron_secret_check() {
        assert!(check_cron_secret(&headers("Bearer s3cret"), Some("s3cret")).is_ok());
        assert!(check_cron_secret(&headers("bearer s3cret"), Some("s3cret")).is_ok());
        assert!(check_cron_secret(&headers("Bearer wrong"), Some("s3cret")).is_err());
        assert!(check_cron_secret(&headers("Basic s3cret"), Some("s3cret")).is_err());
        assert!(check_cron_secret(&headers("s3cret"), Some("s3cret")).is_err());
        assert!(check_cron_secret(&HeaderMap::new(), Some("s3cret")).is_err());
    }

    #[test]
    fn test_no_secret_allows_all() {
        assert!(check_cron_secret(&HeaderMap::new(), None).is_ok());
    }
}

//! HTTP surface: `POST /generate-ad-copy` and `GET /health`.

use crate::agent::CampaignBrief;
use crate::fetcher::FetchError;
use crate::pipeline::{AdCopyRequest, AdCopyService, PipelineError};
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdCopyService>,
}

/// Request body; every field besides `website` belongs to the campaign brief
#[derive(Debug, Deserialize)]
pub struct GenerateAdCopyBody {
    pub website: String,
    #[serde(flatten)]
    pub brief: CampaignBrief,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateAdCopyResponse {
    pub ad_copy: String,
}

/// Error response carrying a status and a `{"detail": ...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidWebsite(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Fetch(FetchError::HttpStatus { code, .. }) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            PipelineError::Fetch(_) | PipelineError::Extract(_) | PipelineError::Generation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::response::Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Build the router around a ready service
pub fn create_app(service: Arc<AdCopyService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/generate-ad-copy", post(generate_ad_copy_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Serve until the process is stopped
pub async fn start_server(service: Arc<AdCopyService>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_app(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    axum::response::Json(json!({ "status": "ok" }))
}

async fn generate_ad_copy_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateAdCopyBody>, JsonRejection>,
) -> Result<axum::response::Json<GenerateAdCopyResponse>, ApiError> {
    let Json(body) = payload?;
    let request = AdCopyRequest {
        website: body.website,
        brief: (!body.brief.is_empty()).then_some(body.brief),
    };

    match state.service.generate(&request).await {
        Ok(ad_copy) => Ok(axum::response::Json(GenerateAdCopyResponse { ad_copy })),
        Err(e) => {
            tracing::error!("Ad copy for {} failed: {}", request.website, e);
            Err(e.into())
        }
    }
}

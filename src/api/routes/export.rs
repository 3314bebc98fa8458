//! Export Routes
//!
//! - GET /api/v1/campaigns/:id/export?format=csv|json - Ranking download

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::ExportParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::export::{render, ExportFormat};

/// GET /api/v1/campaigns/:id/export
///
/// Export the current ranking as a file download.
pub async fn export_ranking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let format = match params.format.as_deref() {
        Some(f) => f
            .parse::<ExportFormat>()
            .map_err(|e| ApiError::Validation(e.to_string()))?,
        None => ExportFormat::default(),
    };

    let ranking = state.aggregator.rank(id).await?;
    let body = render(&ranking, format).map_err(|e| ApiError::Internal(e.to_string()))?;

    let filename = format!(
        "podium_{}_{}.{}",
        id.simple(),
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    );

    tracing::info!(campaign_id = %id, format = format.extension(), "Exported ranking");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(body),
    )
        .into_response())
}

//! Screen Routes
//!
//! - GET /admin - Roster, campaigns and an empty draft
//! - GET /display/:id - Scoreboard for a campaign
//! - GET /display - Back to the admin screen
//!
//! The display screen sends the browser back to `/admin` when the
//! campaign id is missing, malformed or unknown.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::AdminResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::builder::CampaignDraft;
use crate::display::compose;
use crate::ranking::RankingError;
use crate::store::MetricType;

pub const ADMIN_PATH: &str = "/admin";

/// GET /admin
pub async fn admin(State(state): State<Arc<AppState>>) -> ApiResult<Json<AdminResponse>> {
    let sellers = state.store.list_sellers().await?;
    let campaigns = state.store.list_campaigns().await?;

    Ok(Json(AdminResponse {
        sellers,
        campaigns,
        draft: CampaignDraft::default(),
        metric_types: vec![MetricType::Monetary, MetricType::Points],
    }))
}

/// GET /display/:id
pub async fn display(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Response> {
    let Ok(id) = Uuid::parse_str(raw_id.trim()) else {
        tracing::debug!(id = %raw_id, "Malformed campaign id on display");
        return Ok(Redirect::to(ADMIN_PATH).into_response());
    };

    match state.aggregator.rank(id).await {
        Ok(ranking) => Ok(Json(compose(&ranking, None)).into_response()),
        Err(RankingError::NotFound(_)) => {
            tracing::debug!(campaign_id = %id, "Unknown campaign on display");
            Ok(Redirect::to(ADMIN_PATH).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /display
pub async fn display_without_id() -> Redirect {
    Redirect::to(ADMIN_PATH)
}

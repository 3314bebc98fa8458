//! Campaign Routes
//!
//! - GET /api/v1/campaigns - List campaigns
//! - POST /api/v1/campaigns - Submit a campaign draft
//! - GET /api/v1/campaigns/:id - Campaign and participants
//! - GET /api/v1/campaigns/:id/ranking - Ranked entries and team total
//! - GET /api/v1/campaigns/:id/board - Scoreboard view model

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::{
    CampaignDetailResponse, CampaignsResponse, CreateCampaignRequest, CreateCampaignResponse,
    RankingResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::builder::{display_path, submit};
use crate::display::{compose, Scoreboard};

/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CampaignsResponse>> {
    let campaigns = state.store.list_campaigns().await?;
    Ok(Json(CampaignsResponse { campaigns }))
}

/// POST /api/v1/campaigns
///
/// Validate the draft and write the campaign with its participants.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<CreateCampaignResponse>)> {
    let campaign = submit(state.store.as_ref(), &req.draft, req.created_by).await?;
    let display_url = display_path(campaign.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateCampaignResponse {
            campaign,
            display_url,
        }),
    ))
}

/// GET /api/v1/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CampaignDetailResponse>> {
    let campaign = state
        .store
        .get_campaign(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("campaign {}", id)))?;
    let participants = state.store.list_participants(id).await?;

    Ok(Json(CampaignDetailResponse {
        campaign,
        participants,
    }))
}

/// GET /api/v1/campaigns/:id/ranking
pub async fn get_ranking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RankingResponse>> {
    let ranking = state.aggregator.rank(id).await?;
    Ok(Json(RankingResponse::from(ranking)))
}

/// GET /api/v1/campaigns/:id/board
///
/// Scoreboard without an overlay; live overlays come over the WebSocket.
pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Scoreboard>> {
    let ranking = state.aggregator.rank(id).await?;
    Ok(Json(compose(&ranking, None)))
}

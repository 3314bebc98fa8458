//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::{CampaignDraft, DraftEdit};
use crate::ranking::{RankedEntry, Ranking};
use crate::store::{Campaign, MetricType, Participant, Seller};

// ============================================
// SELLER DTOs
// ============================================

/// Seller roster response
#[derive(Debug, Serialize, Deserialize)]
pub struct SellersResponse {
    pub sellers: Vec<Seller>,
}

/// Add seller request
#[derive(Debug, Deserialize)]
pub struct CreateSellerRequest {
    /// Display name
    pub name: String,
    /// Optional avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// ============================================
// CAMPAIGN DTOs
// ============================================

/// Campaign list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignsResponse {
    /// Newest first
    pub campaigns: Vec<Campaign>,
}

/// Builder submit request: the draft plus who submits it
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    #[serde(flatten)]
    pub draft: CampaignDraft,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Builder submit response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCampaignResponse {
    pub campaign: Campaign,
    /// Where the live display for this campaign lives
    pub display_url: String,
}

/// Campaign with its participants
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignDetailResponse {
    pub campaign: Campaign,
    /// In selection order
    pub participants: Vec<Participant>,
}

// ============================================
// BUILDER DTOs
// ============================================

/// Apply one edit to a draft
#[derive(Debug, Deserialize)]
pub struct ApplyEditRequest {
    #[serde(default)]
    pub draft: CampaignDraft,
    pub edit: DraftEdit,
}

/// Edited draft and its validation state
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyEditResponse {
    pub draft: CampaignDraft,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// One field-level validation problem
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Admin screen: roster, existing campaigns and an empty draft
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminResponse {
    pub sellers: Vec<Seller>,
    pub campaigns: Vec<Campaign>,
    pub draft: CampaignDraft,
    pub metric_types: Vec<MetricType>,
}

// ============================================
// RANKING DTOs
// ============================================

/// Ranked entries and team total of a campaign
#[derive(Debug, Serialize, Deserialize)]
pub struct RankingResponse {
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub metric_type: MetricType,
    pub entries: Vec<RankedEntry>,
    pub team_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_goal: Option<f64>,
    /// Unrounded `team_total / team_goal * 100`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_progress: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

impl From<Ranking> for RankingResponse {
    fn from(ranking: Ranking) -> Self {
        let team_progress = ranking.team_progress();
        Self {
            campaign_id: ranking.campaign.id,
            campaign_name: ranking.campaign.name,
            metric_type: ranking.campaign.metric_type,
            team_goal: ranking.campaign.team_goal,
            entries: ranking.entries,
            team_total: ranking.team_total,
            team_progress,
            computed_at: ranking.computed_at,
        }
    }
}

/// Export query parameters
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// csv or json (default: csv)
    #[serde(default)]
    pub format: Option<String>,
}

// ============================================
// SALE DTOs
// ============================================

/// Record a sale for a participant
#[derive(Debug, Deserialize)]
pub struct RecordSaleRequest {
    pub seller_id: Uuid,
    pub value: f64,
}

/// Replace a sale value
#[derive(Debug, Deserialize)]
pub struct UpdateSaleRequest {
    pub value: f64,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// Store status: "ok" or "error"
    pub store: String,
    /// Store backend name
    pub backend: String,
    /// Open WebSocket connections
    pub websocket_connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Crate version
    pub version: String,
}

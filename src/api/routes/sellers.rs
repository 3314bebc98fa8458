//! Seller Routes
//!
//! - GET /api/v1/sellers - Roster
//! - POST /api/v1/sellers - Add a seller

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{CreateSellerRequest, SellersResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::Seller;

/// GET /api/v1/sellers
pub async fn list_sellers(State(state): State<Arc<AppState>>) -> ApiResult<Json<SellersResponse>> {
    let sellers = state.store.list_sellers().await?;
    Ok(Json(SellersResponse { sellers }))
}

/// POST /api/v1/sellers
pub async fn create_seller(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSellerRequest>,
) -> ApiResult<(StatusCode, Json<Seller>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Seller name cannot be empty".to_string()));
    }
    if name.len() > 100 {
        return Err(ApiError::Validation(
            "Seller name exceeds maximum length of 100 characters".to_string(),
        ));
    }

    let avatar = req
        .avatar_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    if let Some(url) = avatar {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApiError::Validation(
                "Avatar URL must be an http(s) URL".to_string(),
            ));
        }
    }

    let seller = state.store.add_seller(name, avatar).await?;
    tracing::info!(seller_id = %seller.id, name = %seller.name, "Seller added");

    Ok((StatusCode::CREATED, Json(seller)))
}

//! Sale Routes
//!
//! Write path for external processes. Every write is announced on the
//! store's change stream, which refreshes live displays.
//!
//! - POST /api/v1/campaigns/:id/sales - Record a sale
//! - PUT /api/v1/sales/:id - Replace a sale value
//! - DELETE /api/v1/sales/:id - Remove a sale

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::{RecordSaleRequest, UpdateSaleRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{NewSale, Sale};

/// POST /api/v1/campaigns/:id/sales
pub async fn record_sale(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<RecordSaleRequest>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    validate_value(req.value)?;

    let sale = state
        .store
        .record_sale(NewSale {
            campaign_id,
            seller_id: req.seller_id,
            value: req.value,
        })
        .await?;

    tracing::info!(
        sale_id = %sale.id,
        campaign_id = %campaign_id,
        seller_id = %sale.seller_id,
        value = sale.value,
        "Sale recorded"
    );

    Ok((StatusCode::CREATED, Json(sale)))
}

/// PUT /api/v1/sales/:id
pub async fn update_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSaleRequest>,
) -> ApiResult<Json<Sale>> {
    validate_value(req.value)?;

    let sale = state.store.update_sale(id, req.value).await?;
    tracing::info!(sale_id = %id, value = sale.value, "Sale updated");

    Ok(Json(sale))
}

/// DELETE /api/v1/sales/:id
pub async fn delete_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_sale(id).await?;
    tracing::info!(sale_id = %id, "Sale deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Sale values must be finite and non-negative
fn validate_value(value: f64) -> ApiResult<()> {
    if !value.is_finite() {
        return Err(ApiError::Validation("Value must be a finite number".to_string()));
    }
    if value < 0.0 {
        return Err(ApiError::Validation("Value cannot be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_value() {
        assert!(validate_value(0.0).is_ok());
        assert!(validate_value(185_000.0).is_ok());
        assert!(validate_value(-1.0).is_err());
        assert!(validate_value(f64::INFINITY).is_err());
    }
}

//! Builder Routes
//!
//! - POST /api/v1/builder/apply - Apply one edit to a draft

use axum::Json;

use crate::api::dto::{ApplyEditRequest, ApplyEditResponse, FieldError};

/// POST /api/v1/builder/apply
///
/// Stateless: the client sends its draft and one edit and receives the
/// edited draft with its validation state. Nothing is written.
pub async fn apply_edit(Json(req): Json<ApplyEditRequest>) -> Json<ApplyEditResponse> {
    let draft = req.draft.apply(req.edit);

    let errors = match draft.validate() {
        Ok(_) => Vec::new(),
        Err(errors) => errors
            .iter()
            .map(|e| FieldError {
                field: e.field().to_string(),
                message: e.to_string(),
            })
            .collect(),
    };

    Json(ApplyEditResponse {
        valid: errors.is_empty(),
        draft,
        errors,
    })
}

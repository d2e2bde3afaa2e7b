//! # Recognition Handler
//!
//! `GET /find?url=...` runs the recognition pipeline for one image URL.

use super::{AppError, AppState, DataResponse, FindParams, FindResponse};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use finder::{FinderError, RecognitionRequest};
use tracing::debug;

/// The handler for the `/find` endpoint.
///
/// A missing `url` parameter is passed through to the pipeline, which reports
/// it like any other validation failure. A query string that cannot be read at
/// all (for example a repeated `url`) is reported as an invalid URL.
pub async fn find_handler(
    State(app_state): State<AppState>,
    params: Result<Query<FindParams>, QueryRejection>,
) -> Result<Json<DataResponse<FindResponse>>, AppError> {
    let Query(params) = params.map_err(|rejection| {
        debug!("Rejected query string: {}", rejection.body_text());
        AppError::from(FinderError::InvalidUrl)
    })?;

    let request = RecognitionRequest {
        source_url: params.url,
    };
    let result = app_state.pipeline.find(&request).await?;

    Ok(Json(DataResponse {
        data: FindResponse { name: result.label },
    }))
}

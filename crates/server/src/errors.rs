use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use finder::FinderError;
use serde::Serialize;
use tracing::error;

/// The `error` object of a failed response.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub status: String,
    pub detail: String,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// A custom error type for the server application.
///
/// Every pipeline failure is reported to the caller as a 422 carrying the
/// error's detail text; anything else is an opaque 500.
pub enum AppError {
    /// A request the pipeline could not process.
    Unprocessable(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

/// Conversion from `FinderError` to `AppError`.
impl From<FinderError> for AppError {
    fn from(err: FinderError) -> Self {
        AppError::Unprocessable(err.to_string())
    }
}

/// Conversion from `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, detail) = match self {
            AppError::Unprocessable(detail) => {
                error!("{detail}");
                (StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorBody {
                status: status_code.as_u16().to_string(),
                detail,
            },
        });

        (status_code, body).into_response()
    }
}

//! # General Route Handlers

use super::{DataResponse, ServiceInfo};
use axum::Json;

/// The handler for the root (`/`) endpoint.
pub async fn root() -> Json<DataResponse<ServiceInfo>> {
    Json(DataResponse {
        data: ServiceInfo {
            name: "Face recognition API".to_string(),
            version: "1.0.0".to_string(),
        },
    })
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

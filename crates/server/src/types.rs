use serde::{Deserialize, Serialize};

/// The envelope of every successful response: `{ "data": ... }`.
#[derive(Serialize, Deserialize, Debug)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Query parameters of `GET /find`.
#[derive(Deserialize, Debug, Default)]
pub struct FindParams {
    pub url: Option<String>,
}

/// Payload of a successful `GET /find`.
#[derive(Serialize, Deserialize, Debug)]
pub struct FindResponse {
    pub name: String,
}

/// Payload of `GET /`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
}

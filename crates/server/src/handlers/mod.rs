//! # API Route Handlers
//!
//! This module organizes the Axum route handlers for the `finder-server`.

pub mod find;
pub mod general;

pub use find::*;
pub use general::*;

// Shared items used by multiple handler modules.
use super::{
    errors::AppError,
    state::AppState,
    types::{DataResponse, FindParams, FindResponse, ServiceInfo},
};

//! Terminal front end over [`crate::AppContext`].

pub mod basket;
pub mod price;
pub mod reserve;
pub mod setup;
pub mod ui;

use crate::core::admin::ActionResponse;
use anyhow::{Result, anyhow};

/// Unwraps a handler response, turning a failure into an error for `main`.
pub(crate) fn into_result<T>(response: ActionResponse<T>) -> Result<T> {
    match response {
        ActionResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ActionResponse { error, .. } => Err(anyhow!(
            error.unwrap_or_else(|| "Request failed".to_string())
        )),
    }
}

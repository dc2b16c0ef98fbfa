use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

pub const SUCCESS_CODE: u16 = 0;
pub const SUCCESS_MESSAGE: &str = "Success";

/// Body of every response: `{ "code", "message", "data" }`.
///
/// Successful responses carry `code = 0`; failures carry the HTTP status as
/// `code` and `data: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::core::StoreError;
use crate::pagination::PageError;
use crate::web::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("referenced entity does not exist")]
    ForeignKeyViolation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage is temporarily unavailable, please retry")]
    TransientStorageFailure(String),
    #[error("storage error")]
    Storage(String),
    #[error("internal server error")]
    Internal(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ForeignKeyViolation(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TransientStorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ForeignKeyViolation(detail) => Self::ForeignKeyViolation(detail),
            StoreError::UniqueViolation(detail) => {
                debug!("unique violation: {}", detail);
                Self::Conflict("resource already exists".to_string())
            }
            StoreError::Transient(detail) => Self::TransientStorageFailure(detail),
            StoreError::Backend(detail) | StoreError::LockError(detail) => Self::Storage(detail),
        }
    }
}

impl From<PageError> for AppError {
    fn from(err: PageError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::ForeignKeyViolation(detail)
            | Self::TransientStorageFailure(detail)
            | Self::Storage(detail)
            | Self::Internal(detail) => {
                error!("request failed with {}: {}", status, detail);
            }
            _ => {}
        }

        let body = ApiResponse::<()>::failure(status.as_u16(), self.to_string());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::transient("deadlock"), StatusCode::SERVICE_UNAVAILABLE),
            (
                StoreError::ForeignKeyViolation("comments_creation_id_fkey".into()),
                StatusCode::CONFLICT,
            ),
            (StoreError::UniqueViolation("tools_name_key".into()), StatusCode::CONFLICT),
            (StoreError::backend("relation missing"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (store_error, status) in cases {
            assert_eq!(AppError::from(store_error).status(), status);
        }
    }

    #[test]
    fn storage_details_stay_out_of_the_message() {
        let err = AppError::from(StoreError::backend("password authentication failed"));
        assert_eq!(err.to_string(), "storage error");

        let err = AppError::from(StoreError::transient("pool timed out"));
        assert!(!err.to_string().contains("pool"));
    }

    #[test]
    fn paging_errors_are_invalid_arguments() {
        let err = AppError::from(PageError::ZeroPage);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "page must be greater than 0");
    }
}

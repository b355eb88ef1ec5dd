//! Handler error taxonomy and its HTTP mapping.
//!
//! Every failure is rendered as `{ "message": ..., "success": false }`.
//! Internal causes are logged and replaced by a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::handlers::MessageResponse;
use crate::{
    graph::GraphError,
    media::MediaError,
    store::{StoreError, UniqueField},
};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// Missing or invalid session.
    #[error("User not authenticated")]
    Unauthorized,
    /// Bad credentials.
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Log `err` and return a generic 500.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!("Internal error: {err}");
        Self::Internal(err.to_string())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized | Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upload(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        };
        (status, Json(MessageResponse::failure(message))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::Email) => {
                Self::Conflict("Try different email.".to_string())
            }
            StoreError::Duplicate(UniqueField::Username) => {
                Self::Conflict("Try different username.".to_string())
            }
            other => Self::internal(other),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::SelfFollow => {
                Self::Validation("You cant follow or unfollow yourself".to_string())
            }
            GraphError::NotFound => Self::NotFound("User not found".to_string()),
            GraphError::Store(err) => err.into(),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        if err.is_client_error() {
            Self::Validation(err.to_string())
        } else {
            error!("Profile picture upload failed: {err}");
            Self::Upload("Failed to upload profile picture.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    async fn render(err: ApiError) -> Result<(StatusCode, serde_json::Value)> {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn internal_errors_are_not_leaked() -> Result<()> {
        let (status, body) = render(ApiError::internal("pool timed out on 10.0.0.3")).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert_eq!(body["success"], false);
        Ok(())
    }

    #[tokio::test]
    async fn envelope_carries_message() -> Result<()> {
        let (status, body) = render(ApiError::Unauthorized).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "User not authenticated");
        assert_eq!(body["success"], false);
        Ok(())
    }

    #[test]
    fn store_duplicates_become_conflicts() {
        let err: ApiError = StoreError::Duplicate(UniqueField::Email).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Try different email.");

        let err: ApiError = StoreError::Duplicate(UniqueField::Username).into();
        assert_eq!(err.to_string(), "Try different username.");
    }

    #[test]
    fn graph_errors_map_to_client_statuses() {
        let err: ApiError = GraphError::SelfFollow.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = GraphError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn media_errors_split_by_blame() {
        let err: ApiError = MediaError::UnsupportedType("text/plain".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = MediaError::Rejected {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}

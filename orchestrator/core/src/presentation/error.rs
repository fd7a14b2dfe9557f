// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Maps application errors onto HTTP responses with an outcome-shaped body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::application::deployment::DeploymentError;
use crate::application::git_pipeline::PipelineError;
use crate::domain::callback::OutcomePayload;
use crate::domain::trigger::TriggerRejection;
use crate::infrastructure::git_http_backend::GitBackendError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(OutcomePayload::error(self.to_string()))).into_response()
    }
}

impl From<TriggerRejection> for ApiError {
    fn from(rejection: TriggerRejection) -> Self {
        match rejection {
            TriggerRejection::Unauthorized => ApiError::Unauthorized(rejection.to_string()),
            TriggerRejection::NotWhitelisted(_) | TriggerRejection::MissingIdentity => {
                ApiError::BadRequest(rejection.to_string())
            }
        }
    }
}

impl From<DeploymentError> for ApiError {
    fn from(err: DeploymentError) -> Self {
        match err {
            DeploymentError::Rejected(rejection) => rejection.into(),
            DeploymentError::Failed(report) => ApiError::Internal(report.description()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidPath(e) => ApiError::BadRequest(e.to_string()),
            PipelineError::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GitBackendError> for ApiError {
    fn from(err: GitBackendError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::RepositoryPathError;

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            ApiError::from(TriggerRejection::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TriggerRejection::NotWhitelisted("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TriggerRejection::MissingIdentity).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_pipeline_status_codes() {
        let invalid = PipelineError::InvalidPath(RepositoryPathError::TooFewSegments("/".into()));
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(PipelineError::NotFound("acme/app".into())).status(),
            StatusCode::NOT_FOUND
        );
        let io = PipelineError::Filesystem {
            path: "/srv".into(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(ApiError::from(io).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_whitelisted_message() {
        let err = ApiError::from(TriggerRejection::NotWhitelisted("x".into()));
        assert_eq!(err.to_string(), "x is not on whitelist");
    }
}

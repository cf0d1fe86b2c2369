//! Request and response bodies, and the error response mapping

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use presence_core::VerificationResult;

use crate::error::ProvisionError;
use crate::provisioner::ProvisionedSecret;
use crate::verifier::Submission;

/// Body of a secret fetch or rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretResponse {
    #[serde(rename = "secretTOTP")]
    pub secret_totp: String,
    pub generation: u32,
}

impl From<ProvisionedSecret> for SecretResponse {
    fn from(provisioned: ProvisionedSecret) -> Self {
        Self {
            secret_totp: provisioned.secret.to_base32(),
            generation: provisioned.generation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub accepted: bool,
    pub step_offset: Option<i64>,
    pub checked_at: u64,
}

impl From<Submission> for VerifyResponse {
    fn from(submission: Submission) -> Self {
        let step_offset = match submission.result {
            VerificationResult::Accepted { step_offset } => Some(step_offset),
            VerificationResult::Rejected => None,
        };
        Self {
            accepted: step_offset.is_some(),
            step_offset,
            checked_at: submission.checked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Wrapper turning a [`ProvisionError`] into an HTTP response
#[derive(Debug)]
pub struct ApiError(pub ProvisionError);

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ProvisionError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ProvisionError::Authorization(_) => StatusCode::FORBIDDEN,
            ProvisionError::NotProvisioned(_) => StatusCode::NOT_FOUND,
            ProvisionError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after_secs = match &self.0 {
            ProvisionError::LockedOut { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        // Internal details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.0);
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message,
            retry_after_secs,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

//! Errors returned by the OpenAI-compatible HTTP layer.

use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors that can occur when calling an OpenAI-compatible API
#[derive(Error, Debug)]
pub enum OpenAiApiError {
    /// Invalid request parameters or malformed request
    #[error("Invalid request ({status}): {body}")]
    InvalidRequest {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Authentication failed due to invalid or missing API key
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded, retry after waiting
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// API server encountered an internal error
    #[error("API server error ({status}): {body}")]
    ServerError {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Network error occurred during request
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Response decoded but carried no usable content
    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

impl OpenAiApiError {
    /// Rate limits, server errors and network failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError { .. } | Self::NetworkError(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthenticationFailed(body),
            429 => Self::RateLimitExceeded,
            code if status.is_server_error() => Self::ServerError { status: code, body },
            code => Self::InvalidRequest { status: code, body },
        }
    }

    /// Map to a domain error; `unavailable` wraps everything except
    /// credential problems, which are configuration errors.
    pub fn into_domain(self, unavailable: fn(String) -> DomainError) -> DomainError {
        match self {
            Self::AuthenticationFailed(body) => {
                DomainError::Configuration(format!("OpenAI rejected the API key: {body}"))
            }
            other => unavailable(other.to_string()),
        }
    }
}

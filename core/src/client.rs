//! Stateless request builder and response parser for the batch endpoint.
//!
//! # Design
//! `BatchClient` holds only the endpoint URL and carries no mutable state
//! between calls. `build_batch` produces an `HttpRequest`, `parse_batch`
//! consumes an `HttpResponse`; the caller executes the round-trip in between.

use crate::error::ApiError;
use crate::headers::HeaderSet;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{RequestSpec, ResponseSpec};

pub const DEFAULT_BATCH_PATH: &str = "/api/batch";

/// Synchronous, stateless client for the batch endpoint.
#[derive(Debug, Clone)]
pub struct BatchClient {
    base_url: String,
    path: String,
    headers: HeaderSet,
}

impl BatchClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path: DEFAULT_BATCH_PATH.to_string(),
            headers: HeaderSet::new(),
        }
    }

    /// Target a batch endpoint mounted somewhere other than `/api/batch`.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = format!("/{}", path.trim_start_matches('/'));
        self
    }

    /// Header sent on the outer request and therefore inherited by every
    /// sub-request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    pub fn build_batch(&self, requests: &[RequestSpec]) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(requests)
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut headers = self.headers.clone();
        headers.append("content-type", "application/json");
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(),
            headers,
            body: Some(body),
        })
    }

    /// Parse the batch response for `sent` sub-requests.
    pub fn parse_batch(&self, sent: usize, response: HttpResponse) -> Result<Vec<ResponseSpec>, ApiError> {
        check_status(&response, 200)?;
        let responses: Vec<ResponseSpec> = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        if responses.len() != sent {
            return Err(ApiError::LengthMismatch {
                expected: sent,
                actual: responses.len(),
            });
        }
        Ok(responses)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

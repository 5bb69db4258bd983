//! Error types for batch processing and the batch client.
//!
//! # Design
//! `BatchError` covers everything that can go wrong while serving a batch.
//! Variants carrying an `index` are per-item faults; the server decides,
//! according to its fault policy, whether they fill one slot of the response
//! array or abort the batch. The rest are fatal to the whole batch.
//!
//! `ApiError` is the client-side view: what can go wrong when parsing the
//! outer batch response.

use thiserror::Error;

/// Faults raised while parsing, executing or encoding a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The batch body is not a JSON array of sub-requests.
    #[error("malformed batch body: {0}")]
    Parse(String),

    #[error("failed to read batch body: {0}")]
    BodyRead(String),

    #[error("batch body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("batch holds {count} requests, maximum is {max}")]
    TooManyItems { count: usize, max: usize },

    /// A sub-request could not be turned into an HTTP request.
    #[error("invalid sub-request at index {index}: {message}")]
    InvalidSubRequest { index: usize, message: String },

    /// The processing pipeline failed while handling a sub-request.
    #[error("pipeline fault at index {index}: {message}")]
    Pipeline { index: usize, message: String },

    /// A sub-response declared JSON but its body does not parse.
    #[error("undecodable response body at index {index}: {message}")]
    BodyDecode { index: usize, message: String },

    #[error("batch deadline exceeded")]
    Timeout,

    #[error("failed to encode batch response: {0}")]
    Encode(String),
}

impl BatchError {
    /// HTTP status reported for this fault, either in the item's slot or for
    /// the whole batch.
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::Parse(_) | BatchError::BodyRead(_) => 400,
            BatchError::BodyTooLarge { .. } | BatchError::TooManyItems { .. } => 413,
            BatchError::InvalidSubRequest { .. } => 400,
            BatchError::Pipeline { .. } | BatchError::Encode(_) => 500,
            BatchError::BodyDecode { .. } => 502,
            BatchError::Timeout => 504,
        }
    }

    /// Index of the sub-request this fault belongs to, if it is a per-item fault.
    pub fn index(&self) -> Option<usize> {
        match self {
            BatchError::InvalidSubRequest { index, .. }
            | BatchError::Pipeline { index, .. }
            | BatchError::BodyDecode { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Errors returned by `BatchClient::parse_batch`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404; no batch endpoint is mounted at the path.
    #[error("batch endpoint not found")]
    NotFound,

    /// The batch as a whole failed (any non-200 status other than 404).
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered with a different number of sub-responses than
    /// sub-requests were sent.
    #[error("expected {expected} sub-responses, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_faults_expose_their_index() {
        let err = BatchError::Pipeline {
            index: 3,
            message: "boom".to_string(),
        };
        assert_eq!(err.index(), Some(3));
        assert_eq!(err.status_code(), 500);
        assert_eq!(BatchError::Timeout.index(), None);
    }

    #[test]
    fn parse_fault_is_a_client_error() {
        let err = BatchError::Parse("expected a sequence".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "malformed batch body: expected a sequence");
    }
}

//! Reading a completed sub-response back into a `ResponseSpec`.

use axum::body::Body;
use axum::http::{HeaderMap, Response};
use batch_core::{negotiate_body, strip_hop_by_hop, BatchError, HeaderPair, HeaderSet, ResponseSpec};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::config::BatchConfig;

/// Why collecting a body failed.
#[derive(Debug)]
pub(crate) enum CollectError {
    TooLarge,
    Read(String),
}

/// Read `body` fully into memory, failing once it grows past `limit` bytes.
pub(crate) async fn collect_limited(body: Body, limit: usize) -> Result<Bytes, CollectError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(CollectError::TooLarge),
        Err(err) => Err(CollectError::Read(err.to_string())),
    }
}

/// Header entries in map order, one pair per value, with names in canonical
/// casing (`Content-Type`). Values that are not visible ASCII are decoded
/// lossily.
pub fn header_set(headers: &HeaderMap) -> HeaderSet {
    headers
        .iter()
        .map(|(name, value)| {
            HeaderPair::new(
                canonical_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Upper-case the first letter of each `-`-separated segment and lower-case
/// the rest: `content-type` becomes `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start = true;
    for c in name.chars() {
        if start {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        start = c == '-';
    }
    out
}

/// Capture the `index`-th sub-response.
///
/// The body is buffered from its start, decoded as UTF-8 and negotiated
/// against the response's own `content-type`. Status and headers are copied
/// as the pipeline produced them.
pub async fn capture(
    response: Response<Body>,
    index: usize,
    config: &BatchConfig,
) -> Result<ResponseSpec, BatchError> {
    let (parts, body) = response.into_parts();

    let buffer = collect_limited(body, config.max_response_bytes)
        .await
        .map_err(|err| BatchError::Pipeline {
            index,
            message: match err {
                CollectError::TooLarge => {
                    format!("response body exceeds {} bytes", config.max_response_bytes)
                }
                CollectError::Read(message) => message,
            },
        })?;
    let text = String::from_utf8_lossy(&buffer).into_owned();

    let mut headers = header_set(&parts.headers);
    let body = negotiate_body(&headers, text).map_err(|e| BatchError::BodyDecode {
        index,
        message: e.to_string(),
    })?;
    if config.strip_hop_by_hop {
        strip_hop_by_hop(&mut headers);
    }

    Ok(ResponseSpec {
        status_code: parts.status.as_u16(),
        headers,
        body,
    })
}

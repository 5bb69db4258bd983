//! Content negotiation for captured sub-response bodies.
//!
//! A sub-response body is reported as structured JSON when, and only when, one
//! of its `content-type` headers mentions `application/json`. Everything else
//! is reported as the raw text the handler wrote.

use crate::headers::HeaderSet;
use crate::types::ResponseBody;

pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Connection-scoped headers that make no sense once a sub-response is
/// embedded in the batch body.
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether any `content-type` entry declares a JSON body.
pub fn declares_json(headers: &HeaderSet) -> bool {
    headers
        .get_all("content-type")
        .any(|value| value.to_ascii_lowercase().contains(JSON_MEDIA_TYPE))
}

/// Turn captured body text into a `ResponseBody` according to `headers`.
///
/// An empty body declared as JSON decodes to `null`.
pub fn negotiate_body(headers: &HeaderSet, text: String) -> Result<ResponseBody, serde_json::Error> {
    if !declares_json(headers) {
        return Ok(ResponseBody::Text(text));
    }
    if text.trim().is_empty() {
        return Ok(ResponseBody::Json(serde_json::Value::Null));
    }
    serde_json::from_str(&text).map(ResponseBody::Json)
}

pub fn strip_hop_by_hop(headers: &mut HeaderSet) {
    headers.retain(|pair| {
        !HOP_BY_HOP_HEADERS
            .iter()
            .any(|name| pair.key.eq_ignore_ascii_case(name))
    });
}

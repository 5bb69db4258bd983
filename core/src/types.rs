//! Wire records for one sub-request and one sub-response.
//!
//! # Design
//! Field names follow the batch wire format (`relativeUrl`,
//! `additionalHeaders`, `statusCode`) via `rename_all = "camelCase"`. The
//! records are plain data: parsing produces `RequestSpec` values that are never
//! mutated afterwards, and the server builds `ResponseSpec` values once per
//! captured sub-response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::headers::{HeaderPair, HeaderSet};
use crate::http::HttpMethod;

/// One sub-request inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub method: String,
    /// Path plus optional query, without scheme or host.
    pub relative_url: String,
    /// Headers appended to the outer request's headers. `null` or absent
    /// means none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_headers: HeaderSet,
    #[serde(default)]
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, relative_url: impl Into<String>) -> Self {
        Self {
            method: method.as_str().to_string(),
            relative_url: relative_url.into(),
            additional_headers: HeaderSet::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.append(key, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Body of a sub-response: parsed JSON when the sub-response declared a JSON
/// content type, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
}

impl ResponseBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(Value::String(text)) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }

    /// The body as a JSON value. Text bodies become JSON strings.
    pub fn to_value(&self) -> Value {
        match self {
            ResponseBody::Text(text) => Value::String(text.clone()),
            ResponseBody::Json(value) => value.clone(),
        }
    }
}

/// One sub-response inside a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    pub status_code: u16,
    pub headers: HeaderSet,
    pub body: ResponseBody,
}

impl ResponseSpec {
    /// Synthetic entry standing in for a sub-request that faulted.
    pub fn fault(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: HeaderSet::new(),
            body: ResponseBody::Json(serde_json::json!({ "error": message.into() })),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.first(key)
    }

    pub fn has_header(&self, key: &str, value: &str) -> bool {
        self.headers.iter().any(|pair: &HeaderPair| {
            pair.key.eq_ignore_ascii_case(key) && pair.value == value
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//! Building an isolated request for one sub-request.
//!
//! # Design
//! `synthesize` does the batch-specific work (header merge, URI, body,
//! capability split) and produces a `ContextParts`. Turning those parts into
//! the request object the pipeline consumes is delegated to a
//! `ContextFactory`, so a host that needs extra per-request extensions can
//! supply its own factory without touching the batching logic.
//!
//! Header merging is append-only: no outer value is replaced and duplicates
//! survive. Appending is per name, not positional. An additional value whose
//! name the outer request already carries lands right after that name's
//! existing values, so outer `accept`, `x-trace` plus an additional `Accept`
//! iterates as `accept`, `accept`, `x-trace`. New names go at the end.

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, Method, Request, Uri, Version};
use batch_core::{BatchError, HeaderSet, RequestSpec};
use bytes::Bytes;
use serde_json::Value;

use crate::capabilities::{Capabilities, Items};

/// Everything needed to construct one sub-request.
#[derive(Debug)]
pub struct ContextParts {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Inherited from the outer request.
    pub capabilities: Capabilities,
    /// Fresh for this sub-request.
    pub items: Items,
}

/// Constructs the request object handed to the pipeline.
pub trait ContextFactory: Send + Sync {
    fn create(&self, parts: ContextParts) -> Request<Body>;
}

/// Builds a plain in-memory `Request<Body>` with the capabilities and item bag
/// stored as extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextFactory;

impl ContextFactory for DefaultContextFactory {
    fn create(&self, parts: ContextParts) -> Request<Body> {
        let mut request = Request::new(Body::from(parts.body));
        *request.method_mut() = parts.method;
        *request.uri_mut() = parts.uri;
        *request.version_mut() = parts.version;
        *request.headers_mut() = parts.headers;
        parts.capabilities.apply(request.extensions_mut());
        request.extensions_mut().insert(parts.items);
        request
    }
}

/// Build the sub-request for `spec`, the `index`-th item of the batch whose
/// outer request is `outer`.
pub fn synthesize<F>(
    factory: &F,
    outer: &Parts,
    index: usize,
    spec: &RequestSpec,
) -> Result<Request<Body>, BatchError>
where
    F: ContextFactory + ?Sized,
{
    let invalid = |message: String| BatchError::InvalidSubRequest { index, message };

    let method = Method::from_bytes(spec.method.as_bytes())
        .map_err(|_| invalid(format!("invalid method {:?}", spec.method)))?;
    let uri = sub_request_uri(&outer.uri, &spec.relative_url).map_err(invalid)?;
    let headers = merge_headers(&outer.headers, &spec.additional_headers).map_err(invalid)?;
    let body = sub_request_body(spec.body.as_ref()).map_err(invalid)?;

    Ok(factory.create(ContextParts {
        method,
        uri,
        version: outer.version,
        headers,
        body,
        capabilities: Capabilities::inherit(&outer.extensions),
        items: Items::default(),
    }))
}

/// The outer headers with `additional` appended without replacing. Values
/// join their name's group, in `additional` order.
///
/// `content-length` and `transfer-encoding` describe the outer body and are
/// not inherited.
pub fn merge_headers(outer: &HeaderMap, additional: &HeaderSet) -> Result<HeaderMap, String> {
    let mut headers = outer.clone();
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
    for pair in additional {
        let name = HeaderName::from_bytes(pair.key.as_bytes())
            .map_err(|_| format!("invalid header name {:?}", pair.key))?;
        let value = HeaderValue::from_str(&pair.value)
            .map_err(|_| format!("invalid value for header {:?}", pair.key))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// `relative_url` as an origin-form URI. The query, if any, stays attached.
/// Scheme and authority are copied when the outer URI carries them.
fn sub_request_uri(outer: &Uri, relative_url: &str) -> Result<Uri, String> {
    if !relative_url.starts_with('/') {
        return Err(format!("relativeUrl {relative_url:?} must start with '/'"));
    }
    let path_and_query: PathAndQuery = relative_url
        .parse()
        .map_err(|_| format!("invalid relativeUrl {relative_url:?}"))?;

    match (outer.scheme(), outer.authority()) {
        (Some(scheme), Some(authority)) => Uri::builder()
            .scheme(scheme.clone())
            .authority(authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| e.to_string()),
        _ => Ok(Uri::from(path_and_query)),
    }
}

fn sub_request_body(body: Option<&Value>) -> Result<Bytes, String> {
    match body {
        None | Some(Value::Null) => Ok(Bytes::new()),
        Some(Value::String(text)) => Ok(Bytes::copy_from_slice(text.as_bytes())),
        Some(value) => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| format!("unencodable body: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{AuthState, Principal, RequestId};
    use batch_core::HttpMethod;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Arc;

    fn outer(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method("POST").uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(Arc::new(Principal::new("alice")));
        parts.extensions.insert(RequestId::new("req-42"));
        parts.extensions.insert(AuthState::authenticated("Bearer"));
        parts.extensions.insert(Items::default());
        parts
    }

    #[test]
    fn headers_are_appended_not_replaced() {
        let outer = outer("/api/batch", &[("x-trace", "abc"), ("accept", "*/*")]);
        let spec = RequestSpec::new(HttpMethod::Get, "/ping")
            .with_header("Accept", "application/json")
            .with_header("Accept", "text/plain");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &spec).unwrap();

        assert_eq!(request.headers().get("x-trace").unwrap(), "abc");
        let accepts: Vec<_> = request
            .headers()
            .get_all("accept")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(accepts, vec!["*/*", "application/json", "text/plain"]);
        assert_eq!(outer.headers.get_all("accept").iter().count(), 1);
    }

    #[test]
    fn appended_values_join_their_name_group() {
        let outer = outer("/api/batch", &[("accept", "*/*"), ("x-trace", "abc")]);
        let additional = HeaderSet::from(vec![
            batch_core::HeaderPair::new("Accept", "application/json"),
            batch_core::HeaderPair::new("X-New", "1"),
        ]);
        let merged = merge_headers(&outer.headers, &additional).unwrap();
        let order: Vec<_> = merged
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("accept", "*/*"),
                ("accept", "application/json"),
                ("x-trace", "abc"),
                ("x-new", "1"),
            ]
        );
    }

    #[test]
    fn outer_framing_headers_are_dropped() {
        let outer = outer("/api/batch", &[("content-length", "512"), ("x-trace", "abc")]);
        let spec = RequestSpec::new(HttpMethod::Get, "/ping");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &spec).unwrap();
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
        assert!(request.headers().get("x-trace").is_some());
    }

    #[test]
    fn request_view_comes_from_spec() {
        let outer = outer("/api/batch", &[]);
        let spec = RequestSpec::new(HttpMethod::Delete, "/items/7?force=true");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &spec).unwrap();
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.uri().path(), "/items/7");
        assert_eq!(request.uri().query(), Some("force=true"));
        assert_eq!(request.version(), outer.version);
    }

    #[test]
    fn absolute_outer_uri_keeps_scheme_and_authority() {
        let outer = outer("https://api.example.com/api/batch", &[]);
        let spec = RequestSpec::new(HttpMethod::Get, "/ping");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &spec).unwrap();
        assert_eq!(request.uri().to_string(), "https://api.example.com/ping");
    }

    #[test]
    fn capabilities_inherited_items_fresh() {
        let outer = outer("/api/batch", &[]);
        let spec = RequestSpec::new(HttpMethod::Get, "/ping");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &spec).unwrap();

        let ext = request.extensions();
        assert_eq!(ext.get::<Arc<Principal>>().unwrap().subject, "alice");
        assert_eq!(ext.get::<RequestId>().unwrap().as_str(), "req-42");
        assert!(ext.get::<AuthState>().unwrap().authenticated);
        let inner_items = ext.get::<Items>().unwrap();
        assert!(!inner_items.ptr_eq(outer.extensions.get::<Items>().unwrap()));
    }

    #[test]
    fn rejects_bad_method_url_and_header() {
        let outer = outer("/api/batch", &[]);

        let bad_method = RequestSpec {
            method: "GE T".to_string(),
            ..RequestSpec::new(HttpMethod::Get, "/ping")
        };
        let err = synthesize(&DefaultContextFactory, &outer, 2, &bad_method).unwrap_err();
        assert!(matches!(err, BatchError::InvalidSubRequest { index: 2, .. }));

        let absolute = RequestSpec::new(HttpMethod::Get, "http://elsewhere/ping");
        assert!(synthesize(&DefaultContextFactory, &outer, 0, &absolute).is_err());

        let bad_header = RequestSpec::new(HttpMethod::Get, "/ping").with_header("bad header", "x");
        assert!(synthesize(&DefaultContextFactory, &outer, 0, &bad_header).is_err());
    }

    #[tokio::test]
    async fn body_is_forwarded() {
        let outer = outer("/api/batch", &[]);

        let text = RequestSpec::new(HttpMethod::Post, "/echo").with_body(json!("hello"));
        let request = synthesize(&DefaultContextFactory, &outer, 0, &text).unwrap();
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");

        let structured = RequestSpec::new(HttpMethod::Post, "/echo").with_body(json!({"a": 1}));
        let request = synthesize(&DefaultContextFactory, &outer, 0, &structured).unwrap();
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"a":1}"#);

        let none = RequestSpec::new(HttpMethod::Get, "/ping");
        let request = synthesize(&DefaultContextFactory, &outer, 0, &none).unwrap();
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[test]
    fn custom_factory_is_used() {
        struct Tagging;
        impl ContextFactory for Tagging {
            fn create(&self, parts: ContextParts) -> Request<Body> {
                let mut request = DefaultContextFactory.create(parts);
                request.extensions_mut().insert("tagged");
                request
            }
        }

        let outer = outer("/api/batch", &[]);
        let spec = RequestSpec::new(HttpMethod::Get, "/ping");
        let request = synthesize(&Tagging, &outer, 0, &spec).unwrap();
        assert_eq!(request.extensions().get::<&'static str>(), Some(&"tagged"));
    }
}

//! Tower middleware that turns one path into a batch endpoint.
//!
//! Requests whose path equals the configured batch path (exact string match,
//! any method) are served by a [`BatchOrchestrator`] that runs every
//! sub-request through the wrapped service. All other requests go to the
//! wrapped service untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::BoxError;
use tower::{Layer, Service};
use tracing::debug;

use crate::config::BatchConfig;
use crate::context::{ContextFactory, DefaultContextFactory};
use crate::orchestrator::BatchOrchestrator;

/// Layer that adds a batch endpoint in front of a service.
#[derive(Debug)]
pub struct BatchLayer<F = DefaultContextFactory> {
    config: Arc<BatchConfig>,
    factory: Arc<F>,
}

impl<F> Clone for BatchLayer<F> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl BatchLayer {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(DefaultContextFactory),
        }
    }
}

impl<F> BatchLayer<F> {
    /// Build sub-requests with `factory` instead of [`DefaultContextFactory`].
    pub fn with_factory<G: ContextFactory>(self, factory: G) -> BatchLayer<G> {
        BatchLayer {
            config: self.config,
            factory: Arc::new(factory),
        }
    }
}

impl<S, F> Layer<S> for BatchLayer<F> {
    type Service = BatchService<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        BatchService {
            inner,
            config: self.config.clone(),
            factory: self.factory.clone(),
        }
    }
}

/// Service that intercepts the batch path and passes everything else through.
#[derive(Debug)]
pub struct BatchService<S, F = DefaultContextFactory> {
    inner: S,
    config: Arc<BatchConfig>,
    factory: Arc<F>,
}

impl<S: Clone, F> Clone for BatchService<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<S, F> Service<Request<Body>> for BatchService<S, F>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    F: ContextFactory + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if request.uri().path() != self.config.path {
            // The readied service handles this call; a fresh clone takes its place.
            let clone = self.inner.clone();
            let mut inner = std::mem::replace(&mut self.inner, clone);
            return Box::pin(inner.call(request));
        }

        debug!(path = %self.config.path, method = %request.method(), "batch request");
        let orchestrator =
            BatchOrchestrator::new(self.inner.clone(), self.factory.clone(), self.config.clone());
        Box::pin(async move { Ok(orchestrator.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn service() -> BatchService<Router> {
        let router = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route("/api/batch/inner", get(|| async { "not a batch" }));
        BatchLayer::new(BatchConfig::default()).layer(router)
    }

    #[tokio::test]
    async fn other_paths_pass_through() {
        let response = service()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn path_match_is_exact() {
        let response = service()
            .oneshot(
                Request::builder()
                    .uri("/api/batch/inner")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&bytes[..], b"not a batch");
    }

    #[tokio::test]
    async fn batch_path_is_intercepted() {
        let response = service()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/batch?trace=1")
                    .body(Body::from(r#"[{"method":"GET","relativeUrl":"/ping"}]"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[0]["statusCode"], 200);
        assert_eq!(value[0]["body"], "pong");
    }

    #[tokio::test]
    async fn custom_path() {
        let router = Router::new().route("/ping", get(|| async { "pong" }));
        let service = BatchLayer::new(BatchConfig::default().with_path("/_batch")).layer(router);
        let response = service
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_batch")
                    .body(Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&bytes[..], b"[]");
    }
}

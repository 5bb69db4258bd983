//! The processing pipeline that sub-requests are executed against.

use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::BoxError;
use bytes::Bytes;
use tower::{Service, ServiceExt};

pub type PipelineFuture = Pin<Box<dyn Future<Output = Result<Response<Body>, BoxError>> + Send>>;

/// Runs one request through the host's handler chain.
///
/// On success the returned response holds the status, headers and body the
/// handlers produced. The request is consumed; it is never reused.
pub trait Pipeline: Send + Sync {
    fn invoke(&self, context: Request<Body>) -> PipelineFuture;
}

/// Any cloneable tower service over `Request<Body>`, an axum `Router` for
/// instance, is a pipeline. Each invocation drives its own clone to
/// readiness and calls it once.
impl<S, B> Pipeline for S
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn invoke(&self, context: Request<Body>) -> PipelineFuture {
        let service = self.clone();
        Box::pin(async move {
            service
                .oneshot(context)
                .await
                .map(|response| response.map(Body::new))
                .map_err(Into::into)
        })
    }
}

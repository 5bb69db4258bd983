//! Drives one batch from raw body to encoded response array.
//!
//! # Design
//! Items run strictly one after another: item `i + 1` is synthesized only once
//! item `i` has been captured. Output order therefore matches input order by
//! construction, and at most one sub-request context is alive at a time.
//! Dropping the future returned by [`BatchOrchestrator::handle`] drops the
//! in-flight pipeline call and starts no further items.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use batch_core::{encode_response_list, parse_request_bytes, BatchError, RequestSpec, ResponseSpec};
use tracing::{debug, info, warn};

use crate::capture::{capture, collect_limited, CollectError};
use crate::config::{BatchConfig, FaultPolicy};
use crate::context::{synthesize, ContextFactory};
use crate::pipeline::Pipeline;

/// A batch-level failure rendered as `{"error": "..."}` with the fault's status.
#[derive(Debug)]
pub struct BatchRejection(pub BatchError);

impl IntoResponse for BatchRejection {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub struct BatchOrchestrator<P, F> {
    pipeline: P,
    factory: Arc<F>,
    config: Arc<BatchConfig>,
}

impl<P, F> BatchOrchestrator<P, F>
where
    P: Pipeline,
    F: ContextFactory,
{
    pub fn new(pipeline: P, factory: Arc<F>, config: Arc<BatchConfig>) -> Self {
        Self {
            pipeline,
            factory,
            config,
        }
    }

    /// Serve a batch request. Always produces a response: the encoded array
    /// with status 200, or a `BatchRejection` when the batch as a whole fails.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        match self.run(request).await {
            Ok(body) => {
                let mut response = Response::new(Body::from(body));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            Err(err) => {
                warn!(error = %err, status = err.status_code(), "batch failed");
                BatchRejection(err).into_response()
            }
        }
    }

    /// Read, parse, execute and encode. Returns the response array as JSON text.
    pub async fn run(&self, request: Request<Body>) -> Result<String, BatchError> {
        let (outer, body) = request.into_parts();

        let raw = collect_limited(body, self.config.max_body_bytes)
            .await
            .map_err(|err| match err {
                CollectError::TooLarge => BatchError::BodyTooLarge {
                    limit: self.config.max_body_bytes,
                },
                CollectError::Read(message) => BatchError::BodyRead(message),
            })?;
        let specs = parse_request_bytes(&raw)?;
        if specs.len() > self.config.max_items {
            return Err(BatchError::TooManyItems {
                count: specs.len(),
                max: self.config.max_items,
            });
        }

        info!(items = specs.len(), "batch started");
        let responses = match self.config.timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.execute(&outer, &specs))
                .await
                .map_err(|_| BatchError::Timeout)??,
            None => self.execute(&outer, &specs).await?,
        };
        info!(items = responses.len(), "batch completed");

        encode_response_list(&responses)
    }

    /// Execute `specs` in order against the pipeline.
    ///
    /// Per-item faults are handled according to the configured
    /// [`FaultPolicy`].
    pub async fn execute(
        &self,
        outer: &Parts,
        specs: &[RequestSpec],
    ) -> Result<Vec<ResponseSpec>, BatchError> {
        let mut responses = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            match self.execute_item(outer, index, spec).await {
                Ok(response) => responses.push(response),
                Err(err) => match self.config.fault_policy {
                    FaultPolicy::Isolate => {
                        warn!(index, error = %err, "sub-request faulted");
                        responses.push(ResponseSpec::fault(err.status_code(), err.to_string()));
                    }
                    FaultPolicy::Abort => return Err(err),
                },
            }
        }
        Ok(responses)
    }

    #[tracing::instrument(skip_all, fields(index = index, method = %spec.method, url = %spec.relative_url))]
    async fn execute_item(
        &self,
        outer: &Parts,
        index: usize,
        spec: &RequestSpec,
    ) -> Result<ResponseSpec, BatchError> {
        let context = synthesize(&*self.factory, outer, index, spec)?;
        let response = self
            .pipeline
            .invoke(context)
            .await
            .map_err(|fault| BatchError::Pipeline {
                index,
                message: fault.to_string(),
            })?;
        let captured = capture(response, index, &self.config).await?;
        debug!(status = captured.status_code, "sub-request completed");
        Ok(captured)
    }
}

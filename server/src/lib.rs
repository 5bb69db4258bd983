//! Batch endpoint middleware for axum applications.
//!
//! # Overview
//! [`BatchLayer`] intercepts one path (default `/api/batch`). A request to it
//! carries a JSON array of sub-requests; each one is turned into an isolated
//! in-memory request, run through the wrapped service, and captured into the
//! JSON array returned to the caller in the same order.
//!
//! # Design
//! - [`context`] builds each sub-request: outer headers plus the item's
//!   additional headers, inherited [`Capabilities`], a fresh [`Items`] bag.
//! - [`pipeline`] is the seam to the host application; any tower service is
//!   a [`Pipeline`].
//! - [`capture`] buffers and negotiates each sub-response.
//! - [`orchestrator`] runs the items strictly in sequence and applies the
//!   [`FaultPolicy`].
//! - [`demo`] is a sample host used by the binary and the tests.

pub mod capabilities;
pub mod capture;
pub mod config;
pub mod context;
pub mod demo;
pub mod layer;
pub mod orchestrator;
pub mod pipeline;

pub use capabilities::{AuthState, Capabilities, Items, Principal, RequestId, ServiceScope};
pub use config::{BatchConfig, ConfigError, FaultPolicy};
pub use context::{ContextFactory, ContextParts, DefaultContextFactory};
pub use layer::{BatchLayer, BatchService};
pub use orchestrator::{BatchOrchestrator, BatchRejection};
pub use pipeline::Pipeline;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

/// The demo application with the batch endpoint mounted according to `config`.
pub fn app(config: BatchConfig) -> Router {
    let service = ServiceBuilder::new()
        .layer(axum::middleware::from_fn(demo::attach_ambient))
        .layer(BatchLayer::new(config))
        .service(demo::routes());
    Router::new().fallback_service(service)
}

pub async fn run(listener: TcpListener, config: BatchConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

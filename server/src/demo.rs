//! A small host application to put behind the batch layer.
//!
//! `attach_ambient` plays the part of the host's authentication and
//! correlation middleware: it runs once for the outer request, and the batch
//! layer hands what it attached down to every sub-request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Extensions, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use batch_core::HeaderPair;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::capabilities::{AuthState, Items, Principal, RequestId, ServiceScope};
use crate::capture::header_set;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Service registered in every request's `ServiceScope`.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct DemoState {
    counter: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
pub struct Greet {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    pub subject: Option<String>,
    pub request_id: Option<String>,
    pub authenticated: bool,
    pub service: Option<String>,
}

pub fn routes() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/json", get(json_body))
        .route("/echo", post(echo))
        .route("/greet", get(greet))
        .route("/headers", get(headers))
        .route("/whoami", get(whoami))
        .route("/items", get(items))
        .route("/counter", post(increment))
        .route("/broken", get(broken))
        .with_state(DemoState::default())
}

/// Attach request id, identity, auth state, services and a fresh item bag.
///
/// A `Bearer <name>` authorization header authenticates the caller as `<name>`.
pub async fn attach_ambient(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let subject = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    let mut services = Extensions::new();
    services.insert(AppInfo { name: "batch-demo" });

    let extensions = request.extensions_mut();
    extensions.insert(RequestId::new(&request_id));
    extensions.insert(ServiceScope::new(services));
    extensions.insert(Items::default());
    match subject {
        Some(subject) => {
            extensions.insert(Arc::new(Principal::new(subject)));
            extensions.insert(AuthState::authenticated("Bearer"));
        }
        None => {
            extensions.insert(AuthState::anonymous());
        }
    }

    next.run(request).await
}

async fn ping() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "pong")
}

async fn json_body() -> Json<serde_json::Value> {
    Json(json!({ "a": 1 }))
}

async fn echo(body: Bytes) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], body)
}

async fn greet(Query(query): Query<Greet>) -> String {
    format!("hello {}", query.name.as_deref().unwrap_or("stranger"))
}

async fn headers(headers: HeaderMap) -> Json<Vec<HeaderPair>> {
    Json(header_set(&headers).into_iter().collect())
}

async fn whoami(
    principal: Option<Extension<Arc<Principal>>>,
    request_id: Option<Extension<RequestId>>,
    auth: Option<Extension<AuthState>>,
    services: Option<Extension<ServiceScope>>,
) -> Json<WhoAmI> {
    Json(WhoAmI {
        subject: principal.map(|Extension(p)| p.subject.clone()),
        request_id: request_id.map(|Extension(id)| id.as_str().to_string()),
        authenticated: auth.is_some_and(|Extension(a)| a.authenticated),
        service: services
            .and_then(|Extension(s)| s.get::<AppInfo>().map(|info| info.name.to_string())),
    })
}

/// Records a visit in the request's item bag and reports how many entries
/// the bag holds afterwards.
async fn items(Extension(items): Extension<Items>) -> Json<serde_json::Value> {
    let previous = items.get("visits").await.and_then(|v| v.as_u64()).unwrap_or(0);
    items.insert("visits", json!(previous + 1)).await;
    Json(json!({ "visits": previous + 1 }))
}

async fn increment(State(state): State<DemoState>) -> Json<serde_json::Value> {
    let value = state.counter.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "value": value }))
}

async fn broken() -> impl IntoResponse {
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], "{not json")
}

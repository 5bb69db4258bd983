//! Ambient request capabilities and the split between inherited and fresh.
//!
//! # Design
//! A host application attaches cross-cutting request state (who is calling,
//! the correlation id, shared services, authentication outcome) as typed
//! request extensions. A synthesized sub-request must see the same values as
//! the outer batch request, so `Capabilities` names exactly those four and
//! copies them across by `Arc` clone. The per-request `Items` bag is the one
//! piece of ambient state that is never inherited: each sub-request gets its
//! own, so handlers cannot leak mutable state into one another.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Extensions;
use serde_json::Value;
use tokio::sync::RwLock;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
        }
    }
}

/// Correlation id shared by a request and everything it fans out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read-only services registered by the host for the lifetime of a request.
#[derive(Debug, Clone, Default)]
pub struct ServiceScope(Arc<Extensions>);

impl ServiceScope {
    pub fn new(services: Extensions) -> Self {
        Self(Arc::new(services))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.0.get::<T>()
    }
}

/// Outcome of authentication for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub scheme: Option<String>,
    pub authenticated: bool,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self {
            scheme: None,
            authenticated: false,
        }
    }

    pub fn authenticated(scheme: impl Into<String>) -> Self {
        Self {
            scheme: Some(scheme.into()),
            authenticated: true,
        }
    }
}

/// Request-local scratch space for handlers and middleware.
#[derive(Debug, Clone, Default)]
pub struct Items(Arc<RwLock<HashMap<String, Value>>>);

impl Items {
    pub async fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.write().await.insert(key.into(), value)
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.0.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.0.read().await.len()
    }

    pub fn ptr_eq(&self, other: &Items) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The ambient capabilities a sub-request inherits from its batch request.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub identity: Option<Arc<Principal>>,
    pub request_id: Option<RequestId>,
    pub services: Option<ServiceScope>,
    pub auth: Option<AuthState>,
}

impl Capabilities {
    /// Pick the inheritable capabilities out of the outer request's extensions.
    pub fn inherit(extensions: &Extensions) -> Self {
        Self {
            identity: extensions.get::<Arc<Principal>>().cloned(),
            request_id: extensions.get::<RequestId>().cloned(),
            services: extensions.get::<ServiceScope>().cloned(),
            auth: extensions.get::<AuthState>().cloned(),
        }
    }

    pub fn apply(self, extensions: &mut Extensions) {
        if let Some(identity) = self.identity {
            extensions.insert(identity);
        }
        if let Some(request_id) = self.request_id {
            extensions.insert(request_id);
        }
        if let Some(services) = self.services {
            extensions.insert(services);
        }
        if let Some(auth) = self.auth {
            extensions.insert(auth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherit_picks_named_capabilities_only() {
        let mut outer = Extensions::new();
        outer.insert(Arc::new(Principal::new("alice")));
        outer.insert(RequestId::new("req-1"));
        outer.insert(AuthState::authenticated("Bearer"));
        outer.insert(Items::default());

        let caps = Capabilities::inherit(&outer);
        assert_eq!(caps.identity.as_ref().map(|p| p.subject.as_str()), Some("alice"));
        assert_eq!(caps.request_id, Some(RequestId::new("req-1")));
        assert_eq!(caps.auth, Some(AuthState::authenticated("Bearer")));
        assert!(caps.services.is_none());

        let mut inner = Extensions::new();
        caps.apply(&mut inner);
        assert!(inner.get::<Items>().is_none());
        assert!(inner.get::<Arc<Principal>>().is_some());
    }

    #[test]
    fn identity_is_shared_not_copied() {
        let principal = Arc::new(Principal::new("bob"));
        let mut outer = Extensions::new();
        outer.insert(principal.clone());
        let caps = Capabilities::inherit(&outer);
        assert!(Arc::ptr_eq(caps.identity.as_ref().unwrap(), &principal));
    }

    #[test]
    fn service_scope_lookup_by_type() {
        #[derive(Clone, Debug, PartialEq)]
        struct Greeting(&'static str);

        let mut services = Extensions::new();
        services.insert(Greeting("hi"));
        let scope = ServiceScope::new(services);
        assert_eq!(scope.get::<Greeting>(), Some(&Greeting("hi")));
        assert!(scope.get::<u32>().is_none());
    }

    #[tokio::test]
    async fn items_are_independent_bags() {
        let a = Items::default();
        let b = Items::default();
        a.insert("k", Value::from(1)).await;
        assert_eq!(a.len().await, 1);
        assert_eq!(b.len().await, 0);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }
}

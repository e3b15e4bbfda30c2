//! In-memory control-plane source.
//!
//! Useful for tests and for embedding the proxy without a cluster. Mutations
//! emit the same change events a real watch subscription would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tokio::sync::broadcast;

use super::{
    ChangeEvent, ChangeOp, ControlPlaneSource, ResourceKind, RouteSpec, SecretSpec, ServiceSpec,
    SourceError,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct MemoryState {
    routes: HashMap<(String, String), RouteSpec>,
    services: HashMap<(String, String), ServiceSpec>,
    secrets: HashMap<(String, String), SecretSpec>,
}

/// A mutable in-process control plane.
pub struct MemorySource {
    state: RwLock<MemoryState>,
    fail_listings: AtomicBool,
    routes_tx: broadcast::Sender<ChangeEvent>,
    services_tx: broadcast::Sender<ChangeEvent>,
    secrets_tx: broadcast::Sender<ChangeEvent>,
}

impl MemorySource {
    pub fn new() -> Self {
        let (routes_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (services_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (secrets_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(MemoryState::default()),
            fail_listings: AtomicBool::new(false),
            routes_tx,
            services_tx,
            secrets_tx,
        }
    }

    /// Insert or replace a route object.
    pub fn upsert_route(&self, spec: RouteSpec) {
        let key = (spec.namespace.clone(), spec.name.clone());
        let op = {
            let mut state = self.state.write().expect("state lock poisoned");
            match state.routes.insert(key, spec) {
                Some(_) => ChangeOp::Updated,
                None => ChangeOp::Added,
            }
        };
        self.emit(ResourceKind::Route, op);
    }

    pub fn remove_route(&self, namespace: &str, name: &str) {
        let removed = {
            let mut state = self.state.write().expect("state lock poisoned");
            state
                .routes
                .remove(&(namespace.to_string(), name.to_string()))
                .is_some()
        };
        if removed {
            self.emit(ResourceKind::Route, ChangeOp::Deleted);
        }
    }

    pub fn upsert_service(&self, spec: ServiceSpec) {
        let key = (spec.namespace.clone(), spec.name.clone());
        let op = {
            let mut state = self.state.write().expect("state lock poisoned");
            match state.services.insert(key, spec) {
                Some(_) => ChangeOp::Updated,
                None => ChangeOp::Added,
            }
        };
        self.emit(ResourceKind::Service, op);
    }

    pub fn remove_service(&self, namespace: &str, name: &str) {
        let removed = {
            let mut state = self.state.write().expect("state lock poisoned");
            state
                .services
                .remove(&(namespace.to_string(), name.to_string()))
                .is_some()
        };
        if removed {
            self.emit(ResourceKind::Service, ChangeOp::Deleted);
        }
    }

    pub fn upsert_secret(&self, spec: SecretSpec) {
        let key = (spec.namespace.clone(), spec.name.clone());
        let op = {
            let mut state = self.state.write().expect("state lock poisoned");
            match state.secrets.insert(key, spec) {
                Some(_) => ChangeOp::Updated,
                None => ChangeOp::Added,
            }
        };
        self.emit(ResourceKind::Secret, op);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        let removed = {
            let mut state = self.state.write().expect("state lock poisoned");
            state
                .secrets
                .remove(&(namespace.to_string(), name.to_string()))
                .is_some()
        };
        if removed {
            self.emit(ResourceKind::Secret, ChangeOp::Deleted);
        }
    }

    /// Make subsequent listings fail, simulating an unreachable control plane.
    pub fn fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    fn emit(&self, kind: ResourceKind, op: ChangeOp) {
        let tx = match kind {
            ResourceKind::Route => &self.routes_tx,
            ResourceKind::Service => &self.services_tx,
            ResourceKind::Secret => &self.secrets_tx,
        };
        // No subscribers yet is fine; the next full listing covers it.
        let _ = tx.send(ChangeEvent { kind, op });
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlaneSource for MemorySource {
    fn list_routes(&self) -> Result<Vec<RouteSpec>, SourceError> {
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(SourceError::ListUnavailable(
                "in-memory listing disabled".to_string(),
            ));
        }
        let state = self.state.read().expect("state lock poisoned");
        Ok(state.routes.values().cloned().collect())
    }

    fn service(&self, namespace: &str, name: &str) -> Option<ServiceSpec> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn secret(&self, namespace: &str, name: &str) -> Option<SecretSpec> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn events(&self, kind: ResourceKind) -> broadcast::Receiver<ChangeEvent> {
        match kind {
            ResourceKind::Route => self.routes_tx.subscribe(),
            ResourceKind::Service => self.services_tx.subscribe(),
            ResourceKind::Secret => self.secrets_tx.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str) -> RouteSpec {
        RouteSpec {
            name: name.to_string(),
            namespace: "default".to_string(),
            annotations: HashMap::new(),
            rules: Vec::new(),
            tls: Vec::new(),
        }
    }

    #[test]
    fn upsert_emits_added_then_updated() {
        let source = MemorySource::new();
        let mut rx = source.events(ResourceKind::Route);

        source.upsert_route(route("a"));
        source.upsert_route(route("a"));

        assert_eq!(rx.try_recv().unwrap().op, ChangeOp::Added);
        assert_eq!(rx.try_recv().unwrap().op, ChangeOp::Updated);
    }

    #[test]
    fn remove_of_absent_route_is_silent() {
        let source = MemorySource::new();
        let mut rx = source.events(ResourceKind::Route);

        source.remove_route("default", "missing");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listing_failure_is_switchable() {
        let source = MemorySource::new();
        source.upsert_route(route("a"));

        source.fail_listings(true);
        assert!(source.list_routes().is_err());

        source.fail_listings(false);
        assert_eq!(source.list_routes().unwrap().len(), 1);
    }
}

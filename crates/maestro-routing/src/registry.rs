use crate::budget::{optimize_request, TrimStrategy};
use crate::router::{dispatch_streaming_with_fallback, dispatch_with_fallback, select_service, RoutingStrategy};
use crate::service::{ModelService, StreamChunkHandler};
use maestro_core::{ChatRequest, ChatResponse, MaestroError, MaestroResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A registered service handle plus its routing tags.
///
/// Token-limit eligibility is structural (the service reports its own
/// limit); domain eligibility is the explicit `domains` list, matched
/// case-insensitively.
#[derive(Clone)]
pub struct ServiceEntry {
    /// The service handle.
    pub service: Arc<dyn ModelService>,
    /// Domains this service is eligible for.
    pub domains: Vec<String>,
}

/// A point-in-time copy of the registry used for one routing decision.
///
/// Selection and dispatch operate on the snapshot's cloned `Arc` handles,
/// so a service unregistered mid-flight still completes its dispatch while
/// later selections see the updated registry.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    /// Entries sorted by service name.
    pub entries: Vec<(String, ServiceEntry)>,
    /// Name of the active service, if any.
    pub active: Option<String>,
    /// The fallback handle, if registered.
    pub fallback: Option<Arc<dyn ModelService>>,
}

impl RegistrySnapshot {
    /// The largest token limit across registered services.
    pub fn max_token_limit(&self) -> Option<usize> {
        self.entries
            .iter()
            .map(|(_, entry)| entry.service.max_token_limit())
            .max()
    }
}

#[derive(Default)]
struct RegistryInner {
    services: HashMap<String, ServiceEntry>,
    active: Option<String>,
    fallback: Option<Arc<dyn ModelService>>,
}

/// Named backend-service handles with one active service and at most one
/// fallback.
///
/// A long-lived, process-wide object: services may be registered, replaced,
/// or unregistered at any time, including concurrently with in-flight
/// routing decisions.
#[derive(Default)]
pub struct ServiceRegistry {
    inner: RwLock<RegistryInner>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under its own name, overwriting any existing
    /// entry with that name. Becomes the active service if none is.
    pub async fn register_service(&self, service: Arc<dyn ModelService>, domains: Vec<String>) {
        let name = service.name().to_string();
        let mut inner = self.inner.write().await;
        inner.services.insert(
            name.clone(),
            ServiceEntry { service, domains },
        );
        if inner.active.is_none() {
            inner.active = Some(name.clone());
        }
        info!(service = %name, "service registered");
    }

    /// Registers the fallback service. Single slot; last write wins.
    pub async fn register_fallback_service(&self, service: Arc<dyn ModelService>) {
        let mut inner = self.inner.write().await;
        info!(service = %service.name(), "fallback service registered");
        inner.fallback = Some(service);
    }

    /// Removes a service by name; returns whether an entry was removed.
    ///
    /// If the removed service was active, the lexicographically smallest
    /// remaining name is promoted.
    pub async fn unregister_service(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.services.remove(name).is_none() {
            return false;
        }
        if inner.active.as_deref() == Some(name) {
            inner.active = inner.services.keys().min().cloned();
            info!(
                service = %name,
                promoted = inner.active.as_deref().unwrap_or("none"),
                "active service unregistered"
            );
        } else {
            info!(service = %name, "service unregistered");
        }
        true
    }

    /// Makes the named service active. Errors if the name is not registered.
    pub async fn set_active_service(&self, name: &str) -> MaestroResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.services.contains_key(name) {
            return Err(MaestroError::Routing(format!(
                "cannot activate unknown service '{name}'"
            )));
        }
        inner.active = Some(name.to_string());
        Ok(())
    }

    /// Name of the active service, if any.
    pub async fn active_service_name(&self) -> Option<String> {
        self.inner.read().await.active.clone()
    }

    /// Names of all registered services, sorted.
    pub async fn service_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// The largest token limit across registered services.
    pub async fn max_token_limit(&self) -> Option<usize> {
        self.inner
            .read()
            .await
            .services
            .values()
            .map(|entry| entry.service.max_token_limit())
            .max()
    }

    /// Takes a point-in-time copy of the registry for one routing decision.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read().await;
        let mut entries: Vec<(String, ServiceEntry)> = inner
            .services
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        RegistrySnapshot {
            entries,
            active: inner.active.clone(),
            fallback: inner.fallback.clone(),
        }
    }

    /// The send-request entry point: optimize, select, dispatch.
    ///
    /// The request is trimmed to the fleet budget per `trim`/`buffer`, a
    /// service is selected per `strategy`, and the dispatch is retried at
    /// most once against the fallback. `None` means no eligible service or
    /// every attempt failed — an absence, never a propagated error.
    pub async fn send_request(
        &self,
        request: ChatRequest,
        strategy: RoutingStrategy,
        trim: TrimStrategy,
        buffer_fraction: f64,
    ) -> Option<ChatResponse> {
        let snapshot = self.snapshot().await;
        let optimized = match snapshot.max_token_limit() {
            Some(limit) => optimize_request(request, trim, buffer_fraction, limit),
            None => request,
        };

        let Some(service) = select_service(&snapshot, &strategy, &optimized) else {
            warn!("no service satisfies the routing strategy and no fallback is registered");
            return None;
        };
        dispatch_with_fallback(service, snapshot.fallback, &optimized).await
    }

    /// Streaming variant of [`send_request`](Self::send_request) with the
    /// same selection and fallback discipline.
    pub async fn send_streaming_request(
        &self,
        request: ChatRequest,
        strategy: RoutingStrategy,
        trim: TrimStrategy,
        buffer_fraction: f64,
        on_chunk: StreamChunkHandler<'_>,
    ) -> Option<ChatResponse> {
        let snapshot = self.snapshot().await;
        let optimized = match snapshot.max_token_limit() {
            Some(limit) => optimize_request(request, trim, buffer_fraction, limit),
            None => request,
        };

        let Some(service) = select_service(&snapshot, &strategy, &optimized) else {
            warn!("no service satisfies the routing strategy and no fallback is registered");
            return None;
        };
        dispatch_streaming_with_fallback(service, snapshot.fallback, &optimized, on_chunk).await
    }
}

use crate::budget::estimate_tokens;
use crate::registry::{RegistrySnapshot, ServiceEntry};
use crate::service::{ModelService, StreamChunkHandler};
use maestro_core::{ChatRequest, ChatResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The criterion used to pick a backend service for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// The service's token limit must fit the optimized request.
    TokenLimit,
    /// The service must carry every requested domain tag
    /// (case-insensitive).
    Domain {
        /// Domains the service must cover.
        domains: Vec<String>,
    },
}

/// Whether an entry satisfies the strategy for the given request size.
fn meets(entry: &ServiceEntry, strategy: &RoutingStrategy, request_tokens: usize) -> bool {
    let service = &entry.service;
    if service.requires_api_key() && !service.has_api_key() {
        return false;
    }
    match strategy {
        RoutingStrategy::TokenLimit => service.max_token_limit() >= request_tokens,
        RoutingStrategy::Domain { domains } => domains.iter().all(|wanted| {
            entry
                .domains
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(wanted))
        }),
    }
}

/// Selects a service from the snapshot for an already-optimized request.
///
/// Preference order: the active service when it qualifies, then the
/// lexicographically-first eligible service (deterministic tie-break), then
/// the fallback service regardless of eligibility, then nothing. A `None`
/// result is an absence, not an error.
pub fn select_service(
    snapshot: &RegistrySnapshot,
    strategy: &RoutingStrategy,
    request: &ChatRequest,
) -> Option<Arc<dyn ModelService>> {
    let request_tokens = estimate_tokens(&request.text());

    if let Some(active) = &snapshot.active {
        let entry = snapshot
            .entries
            .iter()
            .find(|(name, _)| name == active)
            .map(|(_, entry)| entry);
        if let Some(entry) = entry {
            if meets(entry, strategy, request_tokens) {
                info!(service = %active, "selected active service");
                return Some(Arc::clone(&entry.service));
            }
        }
    }

    // Snapshot entries are sorted by name, so the first match is the
    // lexicographic winner.
    for (name, entry) in &snapshot.entries {
        if meets(entry, strategy, request_tokens) {
            info!(service = %name, "selected eligible service");
            return Some(Arc::clone(&entry.service));
        }
    }

    if let Some(fallback) = &snapshot.fallback {
        warn!(service = %fallback.name(), "no eligible service, selecting fallback");
        return Some(Arc::clone(fallback));
    }

    None
}

/// Dispatches to `service`; on failure retries exactly once against the
/// fallback. A second failure, or a failure with no fallback, yields `None`.
pub async fn dispatch_with_fallback(
    service: Arc<dyn ModelService>,
    fallback: Option<Arc<dyn ModelService>>,
    request: &ChatRequest,
) -> Option<ChatResponse> {
    match service.send_request(request).await {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(service = %service.name(), error = %e, "dispatch failed");
            let fallback = fallback?;
            match fallback.send_request(request).await {
                Ok(response) => {
                    info!(service = %fallback.name(), "fallback dispatch succeeded");
                    Some(response)
                }
                Err(e) => {
                    error!(service = %fallback.name(), error = %e, "fallback dispatch failed");
                    None
                }
            }
        }
    }
}

/// Streaming twin of [`dispatch_with_fallback`].
pub async fn dispatch_streaming_with_fallback(
    service: Arc<dyn ModelService>,
    fallback: Option<Arc<dyn ModelService>>,
    request: &ChatRequest,
    on_chunk: StreamChunkHandler<'_>,
) -> Option<ChatResponse> {
    match service.send_streaming_request(request, on_chunk).await {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(service = %service.name(), error = %e, "streaming dispatch failed");
            let fallback = fallback?;
            match fallback.send_streaming_request(request, on_chunk).await {
                Ok(response) => {
                    info!(service = %fallback.name(), "fallback streaming dispatch succeeded");
                    Some(response)
                }
                Err(e) => {
                    error!(service = %fallback.name(), error = %e, "fallback streaming dispatch failed");
                    None
                }
            }
        }
    }
}

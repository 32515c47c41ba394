//! Backend service routing with automatic fallback and domain arbitration.
//!
//! Holds a registry of interchangeable LLM backend services and dispatches
//! each request to one of them, selected by token-budget fit or domain
//! match. Oversized requests are trimmed to the fleet's token budget before
//! dispatch, and a failed dispatch is retried exactly once against a
//! designated fallback service. Domain disambiguation between two
//! independent classifiers is arbitrated by [`DualDomainRouter`].
//!
//! # Main types
//!
//! - [`ModelService`] — The backend service contract (consumed).
//! - [`ServiceRegistry`] — Named service handles, one active service, and at
//!   most one fallback; the send-request entry point.
//! - [`RoutingStrategy`] — Token-limit fit or domain match.
//! - [`TrimStrategy`] — How oversized request content is cut to budget.
//! - [`DomainRouter`] — A domain classifier (consumed), optionally
//!   confidence-bearing.
//! - [`DualDomainRouter`] — Two-classifier conflict arbitration.
//! - [`ConflictLog`] — Console or append-only CSV sink for classifier
//!   conflicts.

/// Token estimation and request trimming.
pub mod budget;
/// Classifier-conflict log sinks.
pub mod conflict;
/// Domain classification and dual-classifier arbitration.
pub mod domain;
/// Service registry and the send-request entry points.
pub mod registry;
/// Service selection and dispatch with fallback.
pub mod router;
/// Backend service contract.
pub mod service;

pub use budget::{estimate_tokens, optimize_request, TrimStrategy};
pub use conflict::ConflictLog;
pub use domain::{ConflictResolver, DomainRouter, DualDomainRouter, DualRouterConfig, Prediction};
pub use registry::{RegistrySnapshot, ServiceEntry, ServiceRegistry};
pub use router::{
    dispatch_streaming_with_fallback, dispatch_with_fallback, select_service, RoutingStrategy,
};
pub use service::{ModelService, StreamChunkHandler};

use crate::conflict::ConflictLog;
use async_trait::async_trait;
use maestro_core::ChatRequest;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A domain prediction with its confidence. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted domain label.
    pub domain: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// A classifier mapping a request to a topical domain.
///
/// Routers without a confidence capability get a confidence of 1.0 via the
/// provided
/// [`determine_domain_with_confidence`](DomainRouter::determine_domain_with_confidence)
/// method.
#[async_trait]
pub trait DomainRouter: Send + Sync {
    /// Predicts the domain of a request, if any.
    async fn determine_domain(&self, request: &ChatRequest) -> Option<String>;

    /// Confidence-bearing variant; defaults to confidence 1.0.
    async fn determine_domain_with_confidence(
        &self,
        request: &ChatRequest,
    ) -> Option<Prediction> {
        self.determine_domain(request).await.map(|domain| Prediction {
            domain,
            confidence: 1.0,
        })
    }
}

/// Thresholds and fallback for dual-classifier arbitration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DualRouterConfig {
    /// Minimum confidence gap for the higher-confidence prediction to win a
    /// conflict outright.
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    /// When both confidences fall below this, the conflict resolves to
    /// `fallback_domain`.
    #[serde(default)]
    pub fallback_confidence_threshold: Option<f64>,
    /// Domain returned when both classifiers are below the fallback
    /// threshold.
    #[serde(default)]
    pub fallback_domain: Option<String>,
}

/// Caller-supplied tie-break consulted when thresholds cannot settle a
/// conflict.
pub type ConflictResolver = Box<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Arbitrates between two independent domain classifiers.
///
/// Conflicts are settled in a fixed order: agreement, then the
/// both-below-fallback-threshold rule, then the confidence-gap rule, then
/// the caller-supplied resolver (validated against the supported-domain
/// set). Every conflict is recorded to the [`ConflictLog`] before
/// arbitration.
pub struct DualDomainRouter {
    primary: Box<dyn DomainRouter>,
    secondary: Box<dyn DomainRouter>,
    supported_domains: Vec<String>,
    config: DualRouterConfig,
    resolver: Option<ConflictResolver>,
    log: ConflictLog,
}

impl DualDomainRouter {
    /// Creates a router over a primary and secondary classifier.
    pub fn new(
        primary: Box<dyn DomainRouter>,
        secondary: Box<dyn DomainRouter>,
        supported_domains: Vec<String>,
        config: DualRouterConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            supported_domains,
            config,
            resolver: None,
            log: ConflictLog::default(),
        }
    }

    /// Installs the caller-supplied conflict resolver.
    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Routes conflict records to the given sink.
    pub fn with_conflict_log(mut self, log: ConflictLog) -> Self {
        self.log = log;
        self
    }

    /// True iff `domain` is in the supported set (case-insensitive).
    pub fn supports(&self, domain: &str) -> bool {
        self.supported_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }

    /// Arbitrates one request.
    async fn arbitrate(&self, request: &ChatRequest) -> Option<String> {
        let primary = self.primary.determine_domain_with_confidence(request).await;
        let secondary = self
            .secondary
            .determine_domain_with_confidence(request)
            .await;

        let (p, s) = match (primary, secondary) {
            (Some(p), Some(s)) => (p, s),
            // With a single prediction there is nothing to arbitrate.
            (Some(p), None) => return Some(p.domain),
            (None, Some(s)) => return Some(s.domain),
            (None, None) => return None,
        };

        if p.domain.eq_ignore_ascii_case(&s.domain) {
            return Some(p.domain);
        }

        self.log.record(&request.text(), &p, &s);

        if let Some(threshold) = self.config.fallback_confidence_threshold {
            if p.confidence < threshold && s.confidence < threshold {
                info!(
                    fallback = self.config.fallback_domain.as_deref().unwrap_or("none"),
                    "both classifiers below fallback threshold"
                );
                return self.config.fallback_domain.clone();
            }
        }

        if let Some(threshold) = self.config.confidence_threshold {
            if (p.confidence - s.confidence).abs() >= threshold {
                let winner = if p.confidence >= s.confidence { p } else { s };
                info!(domain = %winner.domain, "conflict settled by confidence gap");
                return Some(winner.domain);
            }
        }

        let resolved = self.resolver.as_ref().and_then(|r| r(&p.domain, &s.domain))?;
        if self.supports(&resolved) {
            info!(domain = %resolved, "conflict settled by resolver");
            Some(resolved)
        } else {
            info!(domain = %resolved, "resolver returned unsupported domain");
            None
        }
    }
}

#[async_trait]
impl DomainRouter for DualDomainRouter {
    async fn determine_domain(&self, request: &ChatRequest) -> Option<String> {
        self.arbitrate(request).await
    }
}

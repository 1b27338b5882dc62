// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Pricing Pipeline

//! Orchestrates one pricing request:
//!
//! ```text
//! RECEIVED -> INFERRING_SIGNAL -> SIMULATING -> NORMALIZING -> COMPLETE
//!        \              \
//!         INVALID_INPUT  ORACLE_FAILED
//! ```
//!
//! A pipeline owns its configuration, oracle and anchor table; nothing is
//! shared mutably between requests, so one pipeline may serve many threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::anchors::{AnchorMatch, AnchorNormalizer, AnchorTable};
use crate::config::PipelineConfig;
use crate::error::{ErrorKind, PricingError};
use crate::estimator::MonteCarloEstimator;
use crate::oracle::{infer_with_retry, RetryPolicy, SignalOracle};
use crate::sampler::SeedStreams;
use crate::types::{PriceEstimate, PriceFlag, Provenance};

pub const MODEL_VERSION: &str = "voi-bergemann-v1.0";

/// Estimates below this overall confidence are flagged.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Signals older than this many days are flagged as stale.
pub const STALE_AFTER_DAYS: f64 = 30.0;

// ─── Stage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Received,
    InferringSignal,
    Simulating,
    Normalizing,
    Complete,
    OracleFailed,
    InvalidInput,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::OracleFailed | Self::InvalidInput)
    }
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Cooperative cancellation flag, checked at every stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ─── Request metadata ────────────────────────────────────────────────────────

/// Optional per-request context. Absent fields fall back to the pipeline's
/// defaults (`freshness_days` 0, configured data type and region, a fresh UUID).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestMetadata {
    pub freshness_days: Option<f64>,
    pub data_type: Option<String>,
    pub region: Option<String>,
    pub query_id: Option<String>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_freshness_days(mut self, days: f64) -> Self {
        self.freshness_days = Some(days);
        self
    }

    pub fn with_data_type(mut self, data_type: &str) -> Self {
        self.data_type = Some(data_type.to_string());
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_query_id(mut self, query_id: &str) -> Self {
        self.query_id = Some(query_id.to_string());
        self
    }
}

struct ResolvedRequest {
    query_id: String,
    freshness_days: f64,
    data_type: String,
    region: String,
}

// ─── Batch ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub signal: Value,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl BatchItem {
    pub fn new(signal: Value, metadata: RequestMetadata) -> Self {
        Self { signal, metadata }
    }
}

/// Result of one batch item, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Priced(Box<PriceEstimate>),
    Failed {
        index: usize,
        query_id: Option<String>,
        error_kind: ErrorKind,
        message: String,
    },
}

impl BatchOutcome {
    pub fn is_priced(&self) -> bool {
        matches!(self, Self::Priced(_))
    }

    pub fn estimate(&self) -> Option<&PriceEstimate> {
        match self {
            Self::Priced(e) => Some(e),
            Self::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Priced(_) => None,
            Self::Failed { error_kind, .. } => Some(*error_kind),
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct PricingPipeline<O: ?Sized> {
    oracle: Arc<O>,
    config: PipelineConfig,
    estimator: MonteCarloEstimator,
    normalizer: AnchorNormalizer,
}

impl<O: SignalOracle + 'static> PricingPipeline<O> {
    pub fn new(oracle: O, config: PipelineConfig, anchors: AnchorTable) -> Result<Self, PricingError> {
        Self::with_shared_oracle(Arc::new(oracle), config, anchors)
    }
}

impl<O: SignalOracle + ?Sized + 'static> PricingPipeline<O> {
    /// Build a pipeline around an oracle that is already shared, e.g. an
    /// `Arc<dyn SignalOracle>` serving several pipelines.
    pub fn with_shared_oracle(
        oracle: Arc<O>,
        config: PipelineConfig,
        anchors: AnchorTable,
    ) -> Result<Self, PricingError> {
        config.validate()?;
        let estimator = MonteCarloEstimator::new(&config.model)?;
        Ok(Self { oracle, config, estimator, normalizer: AnchorNormalizer::new(anchors) })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn estimate_price(
        &self,
        signal: &Value,
        metadata: &RequestMetadata,
    ) -> Result<PriceEstimate, PricingError> {
        self.estimate_price_cancellable(signal, metadata, &CancellationToken::new())
    }

    /// Like [`estimate_price`](Self::estimate_price), abandoning the request at
    /// the next stage boundary once `token` is cancelled.
    pub fn estimate_price_cancellable(
        &self,
        signal: &Value,
        metadata: &RequestMetadata,
        token: &CancellationToken,
    ) -> Result<PriceEstimate, PricingError> {
        let request = self.resolve(metadata)?;
        let query_id = request.query_id.as_str();
        debug!(query_id, stage = ?PipelineStage::Received, "pricing request");

        enter(token, query_id, PipelineStage::InferringSignal)?;
        let ex_post_params =
            infer_with_retry(&self.oracle, signal, RetryPolicy::from(&self.config.oracle))?;

        enter(token, query_id, PipelineStage::Simulating)?;
        let streams = self.config.seed.map(SeedStreams::new).unwrap_or_else(SeedStreams::from_entropy);
        let sim = self.estimator.estimate(&ex_post_params, request.freshness_days, &streams);

        enter(token, query_id, PipelineStage::Normalizing)?;
        let calibration = self.normalizer.normalize(sim.v_ex_ante, &request.data_type);

        let confidence = sim.confidence.min(calibration.confidence);
        let mut flags = Vec::new();
        if sim.v_ex_ante == 0.0 {
            flags.push(PriceFlag::NonPositiveVoiZeroPrice);
        }
        if confidence < LOW_CONFIDENCE_THRESHOLD {
            flags.push(PriceFlag::LowConfidenceEstimate);
        }
        if request.freshness_days > STALE_AFTER_DAYS {
            flags.push(PriceFlag::StaleDataSignificantDecay);
        }
        if calibration.matched == AnchorMatch::None {
            flags.push(PriceFlag::NoMarketAnchorsRuleOfThumbPricing);
        }

        let model = &self.config.model;
        let estimate = PriceEstimate {
            query_id: request.query_id.clone(),
            estimated_at: Utc::now(),
            model_version: MODEL_VERSION.to_string(),
            v_ex_ante: sim.v_ex_ante,
            usd_estimate: calibration.usd_estimate,
            confidence,
            ex_post_params,
            optimal_action_ex_ante: sim.optimal_action_ex_ante,
            optimal_action_ex_post: sim.optimal_action_ex_post,
            anchors_used: calibration.anchors_used,
            simulation_stats: sim.stats,
            flags,
            data_type: request.data_type,
            region: request.region,
            freshness_days: request.freshness_days,
            freshness_factor: sim.freshness_factor,
            provenance: Provenance {
                n_simulations: model.n_simulations,
                risk_aversion: model.risk_aversion,
                detection_penalty: model.detection_penalty,
                freshness_decay_lambda: model.freshness_decay_lambda,
                signal_strength: model.signal_strength,
                seed: streams.seed(),
            },
        };

        info!(
            query_id = %estimate.query_id,
            stage = ?PipelineStage::Complete,
            v_ex_ante = estimate.v_ex_ante,
            usd = estimate.usd_estimate,
            confidence = estimate.confidence,
            action = %estimate.optimal_action_ex_post,
            "price estimated"
        );
        Ok(estimate)
    }

    /// Price items one after another. A failing item becomes a `Failed` marker
    /// at its index; the rest of the batch still runs.
    pub fn batch_estimate(&self, items: &[BatchItem]) -> Vec<BatchOutcome> {
        let total = items.len();
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                info!(item = index + 1, total, "pricing batch item");
                match self.estimate_price(&item.signal, &item.metadata) {
                    Ok(estimate) => BatchOutcome::Priced(Box::new(estimate)),
                    Err(err) => {
                        info!(item = index + 1, stage = ?err.terminal_stage(), error = %err, "batch item failed");
                        BatchOutcome::Failed {
                            index,
                            query_id: item.metadata.query_id.clone(),
                            error_kind: err.kind(),
                            message: err.to_string(),
                        }
                    }
                }
            })
            .collect()
    }

    fn resolve(&self, metadata: &RequestMetadata) -> Result<ResolvedRequest, PricingError> {
        let freshness_days = metadata.freshness_days.unwrap_or(0.0);
        if !(freshness_days.is_finite() && freshness_days >= 0.0) {
            return Err(PricingError::InvalidInput(format!(
                "freshness_days must be finite and >= 0, got {}",
                freshness_days
            )));
        }
        let non_blank = |field: &str, value: &Option<String>, default: &str| match value {
            Some(v) if v.trim().is_empty() => {
                Err(PricingError::InvalidInput(format!("{} must not be blank", field)))
            }
            Some(v) => Ok(v.clone()),
            None => Ok(default.to_string()),
        };
        let data_type = non_blank("data_type", &metadata.data_type, &self.config.default_data_type)?;
        let region = non_blank("region", &metadata.region, &self.config.default_region)?;
        let query_id = match metadata.query_id {
            Some(_) => non_blank("query_id", &metadata.query_id, "")?,
            None => Uuid::new_v4().to_string(),
        };
        Ok(ResolvedRequest { query_id, freshness_days, data_type, region })
    }
}

fn enter(token: &CancellationToken, query_id: &str, stage: PipelineStage) -> Result<(), PricingError> {
    if token.is_cancelled() {
        debug!(query_id, stage = ?stage, "request cancelled");
        return Err(PricingError::Cancelled(stage));
    }
    debug!(query_id, stage = ?stage, "entering stage");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::ex_post::{ActionParams, ExPostParams};
    use crate::oracle::{FnOracle, OracleError, StaticOracle};
    use serde_json::json;

    fn config() -> PipelineConfig {
        PipelineConfig {
            model: ModelConfig { n_simulations: 800, ..ModelConfig::default() },
            seed: Some(42),
            ..PipelineConfig::default()
        }
    }

    fn params() -> ExPostParams {
        ExPostParams::uniform(ActionParams::new(0.8, 1200.0, 40.0, 0.05)).unwrap()
    }

    fn pipeline() -> PricingPipeline<StaticOracle> {
        PricingPipeline::new(StaticOracle::new(params()), config(), AnchorTable::default()).unwrap()
    }

    #[test]
    fn defaults_are_echoed() {
        let est = pipeline().estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        assert_eq!(est.data_type, "telecom_profile");
        assert_eq!(est.region, "unknown");
        assert_eq!(est.freshness_days, 0.0);
        assert_eq!(est.model_version, MODEL_VERSION);
        assert_eq!(est.provenance.seed, 42);
        assert!(Uuid::parse_str(&est.query_id).is_ok(), "query id {}", est.query_id);
        assert!(est.anchors_used.len() <= 5);
    }

    #[test]
    fn confidence_is_the_minimum_of_both_sources() {
        let p = pipeline();
        let est = p.estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        let sim = p.estimator.estimate(&params(), 0.0, &SeedStreams::new(42));
        let cal = p.normalizer.normalize(sim.v_ex_ante, "telecom_profile");
        assert_eq!(est.confidence, sim.confidence.min(cal.confidence));
        assert_eq!(est.usd_estimate, cal.usd_estimate);
    }

    #[test]
    fn stale_signal_is_flagged() {
        let meta = RequestMetadata::new().with_freshness_days(45.0).with_query_id("q-stale");
        let est = pipeline().estimate_price(&json!({}), &meta).unwrap();
        assert!(est.has_flag(PriceFlag::StaleDataSignificantDecay));
        assert_eq!(est.query_id, "q-stale");
        assert!(est.freshness_factor < 0.02);
    }

    #[test]
    fn empty_anchor_table_is_flagged() {
        let p = PricingPipeline::new(StaticOracle::new(params()), config(), AnchorTable::empty()).unwrap();
        let est = p.estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        assert!(est.has_flag(PriceFlag::NoMarketAnchorsRuleOfThumbPricing));
        assert!(est.has_flag(PriceFlag::LowConfidenceEstimate), "confidence capped at 0.3");
        assert!((est.usd_estimate - est.v_ex_ante * 0.1).abs() < 1e-9);
    }

    #[test]
    fn invalid_metadata_is_rejected_before_the_oracle() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let oracle = FnOracle::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(params())
        });
        let p = PricingPipeline::new(oracle, config(), AnchorTable::default()).unwrap();

        let err = p
            .estimate_price(&json!({}), &RequestMetadata::new().with_freshness_days(-1.0))
            .unwrap_err();
        assert_eq!(err.terminal_stage(), PipelineStage::InvalidInput);

        let err = p
            .estimate_price(&json!({}), &RequestMetadata::new().with_data_type("  "))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn oracle_failure_ends_in_oracle_failed() {
        let oracle = FnOracle::new(|_: &Value| Err(OracleError::Unavailable("down".into())));
        let p = PricingPipeline::new(oracle, config(), AnchorTable::default()).unwrap();
        let err = p.estimate_price(&json!({}), &RequestMetadata::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OracleUnavailable);
        assert_eq!(err.terminal_stage(), PipelineStage::OracleFailed);
    }

    #[test]
    fn cancelled_token_stops_at_first_boundary() {
        let token = CancellationToken::new();
        token.cancel();
        let err = pipeline()
            .estimate_price_cancellable(&json!({}), &RequestMetadata::new(), &token)
            .unwrap_err();
        assert!(matches!(err, PricingError::Cancelled(PipelineStage::InferringSignal)));
    }

    #[test]
    fn cancelling_during_inference_stops_before_simulating() {
        let token = CancellationToken::new();
        let from_oracle = token.clone();
        let oracle = FnOracle::new(move |_: &Value| {
            from_oracle.cancel();
            Ok(params())
        });
        let p = PricingPipeline::new(oracle, config(), AnchorTable::default()).unwrap();

        let err = p
            .estimate_price_cancellable(&json!({}), &RequestMetadata::new(), &token)
            .unwrap_err();
        assert!(matches!(err, PricingError::Cancelled(PipelineStage::Simulating)), "{:?}", err);
        assert_eq!(err.terminal_stage(), PipelineStage::Simulating);
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn normalizing_boundary_honours_cancellation() {
        let token = CancellationToken::new();
        let request = pipeline()
            .resolve(&RequestMetadata::new().with_query_id("q-cancel"))
            .unwrap();

        enter(&token, &request.query_id, PipelineStage::Simulating).unwrap();
        token.cancel();

        let err = enter(&token, &request.query_id, PipelineStage::Normalizing).unwrap_err();
        assert!(matches!(err, PricingError::Cancelled(PipelineStage::Normalizing)));
        assert_eq!(err.terminal_stage(), PipelineStage::Normalizing);
    }

    #[test]
    fn shared_oracle_serves_several_pipelines() {
        let shared: Arc<dyn SignalOracle> = Arc::new(StaticOracle::new(params()));
        let a = PricingPipeline::with_shared_oracle(Arc::clone(&shared), config(), AnchorTable::default())
            .unwrap();
        let b = PricingPipeline::with_shared_oracle(shared, config(), AnchorTable::empty()).unwrap();
        let ea = a.estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        let eb = b.estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        assert_eq!(ea.v_ex_ante, eb.v_ex_ante);
        assert!(eb.has_flag(PriceFlag::NoMarketAnchorsRuleOfThumbPricing));
    }

    #[test]
    fn invalid_configuration_is_rejected_at_construction() {
        let mut cfg = config();
        cfg.model.detection_penalty = 1.0;
        let err = PricingPipeline::new(StaticOracle::new(params()), cfg, AnchorTable::default());
        assert!(matches!(err, Err(PricingError::InvalidConfiguration(_))));
    }

    #[test]
    fn batch_outcome_serializes_with_status_tag() {
        let failed = BatchOutcome::Failed {
            index: 1,
            query_id: Some("q2".into()),
            error_kind: ErrorKind::OracleInvalidOutput,
            message: "bad".into(),
        };
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["error_kind"], "oracle_invalid_output");

        let est = pipeline().estimate_price(&json!({}), &RequestMetadata::new()).unwrap();
        let v = serde_json::to_value(BatchOutcome::Priced(Box::new(est))).unwrap();
        assert_eq!(v["status"], "priced");
        assert!(v["V_ex_ante"].is_number());
    }

    #[test]
    fn stage_serializes_screaming_case() {
        let s = serde_json::to_string(&PipelineStage::InferringSignal).unwrap();
        assert_eq!(s, "\"INFERRING_SIGNAL\"");
        assert!(PipelineStage::OracleFailed.is_terminal());
        assert!(!PipelineStage::Simulating.is_terminal());
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine

//! Prices exposed personal data by the value of information it gives a
//! rational attacker.
//!
//! A [`PricingPipeline`] asks a [`SignalOracle`] for signal-conditioned action
//! parameters, runs the [`MonteCarloEstimator`] to measure the attacker's
//! expected utility gain, and converts that gain to USD against curated
//! market anchors.

pub mod types;
pub mod ex_post;
pub mod utility;
pub mod sampler;
pub mod stats;
pub mod estimator;
pub mod anchors;
pub mod oracle;
pub mod pipeline;
pub mod config;
pub mod error;
pub mod money;

pub use types::*;
pub use anchors::{default_anchors, AnchorCalibration, AnchorNormalizer, AnchorTable};
pub use config::{ModelConfig, OracleConfig, PipelineConfig, PriorConfig};
pub use error::{ConfigError, ErrorKind, PricingError};
pub use estimator::{MonteCarloEstimator, SimulationResult};
pub use ex_post::{ActionParams, ExPostParams, ParamError};
pub use money::Usd;
pub use oracle::{FnOracle, OracleError, ReplyOracle, RetryPolicy, SignalOracle, StaticOracle};
pub use pipeline::{
    BatchItem, BatchOutcome, CancellationToken, PipelineStage, PricingPipeline, RequestMetadata,
};
pub use sampler::{SeedStreams, StateSampler};
pub use utility::AttackerUtility;

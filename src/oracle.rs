// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Signal Oracle Capability

//! The signal oracle turns an opaque observation into [`ExPostParams`].
//!
//! In production it is a remote model call; the pricing core only sees the
//! [`SignalOracle`] trait, so tests run against deterministic stubs. The call is
//! blocking and happens once per request, outside the Monte Carlo loop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::error::PricingError;
use crate::ex_post::{ExPostParams, ParamError};
use crate::types::Action;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single oracle attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("invalid oracle output: {0}")]
    InvalidOutput(#[from] ParamError),

    #[error("oracle attempt took {elapsed:?}, limit {limit:?}")]
    Timeout { elapsed: Duration, limit: Duration },
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

pub trait SignalOracle: Send + Sync {
    /// Infer posterior decision parameters for `signal`. Implementations may use
    /// `timeout` for their own transport deadline; the caller stops waiting
    /// after it regardless.
    fn infer(&self, signal: &Value, timeout: Duration) -> Result<ExPostParams, OracleError>;
}

impl<T: SignalOracle + ?Sized> SignalOracle for Arc<T> {
    fn infer(&self, signal: &Value, timeout: Duration) -> Result<ExPostParams, OracleError> {
        (**self).infer(signal, timeout)
    }
}

impl<T: SignalOracle + ?Sized> SignalOracle for Box<T> {
    fn infer(&self, signal: &Value, timeout: Duration) -> Result<ExPostParams, OracleError> {
        (**self).infer(signal, timeout)
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl From<&OracleConfig> for RetryPolicy {
    fn from(cfg: &OracleConfig) -> Self {
        Self { max_attempts: cfg.max_attempts, timeout: cfg.timeout() }
    }
}

/// Call the oracle until it returns a complete parameter set or the attempt
/// budget runs out. Transport failures, invalid output and timeouts all consume
/// an attempt. The last failure decides the error kind surfaced.
///
/// Each attempt runs on its own worker thread and is abandoned once
/// `policy.timeout` has passed, so a hung oracle costs at most
/// `max_attempts * timeout` of wall time. An abandoned worker's reply is dropped.
pub fn infer_with_retry<O>(
    oracle: &Arc<O>,
    signal: &Value,
    policy: RetryPolicy,
) -> Result<ExPostParams, PricingError>
where
    O: SignalOracle + ?Sized + 'static,
{
    let mut last = OracleError::Unavailable("no attempts made".to_string());
    for attempt in 1..=policy.max_attempts {
        let outcome = attempt_once(oracle, signal, policy.timeout).and_then(|params| {
            match Action::ALL.iter().find(|a| params.get(**a).is_none()) {
                Some(missing) => Err(ParamError::MissingAction(*missing).into()),
                None => Ok(params),
            }
        });
        match outcome {
            Ok(params) => {
                debug!(attempt, "oracle returned parameters");
                return Ok(params);
            }
            Err(err) => {
                warn!(attempt, max_attempts = policy.max_attempts, error = %err, "oracle attempt failed");
                last = err;
            }
        }
    }

    let attempts = policy.max_attempts;
    Err(match last {
        OracleError::InvalidOutput(e) => {
            PricingError::OracleInvalidOutput { attempts, reason: e.to_string() }
        }
        other => PricingError::OracleUnavailable { attempts, reason: other.to_string() },
    })
}

fn attempt_once<O>(oracle: &Arc<O>, signal: &Value, limit: Duration) -> Result<ExPostParams, OracleError>
where
    O: SignalOracle + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(oracle);
    let signal = signal.clone();
    let started = Instant::now();

    thread::Builder::new()
        .name("voi-oracle".to_string())
        .spawn(move || {
            // receiver is gone if the attempt already timed out
            let _ = tx.send(worker.infer(&signal, limit));
        })
        .map_err(|e| OracleError::Unavailable(format!("cannot spawn oracle worker: {}", e)))?;

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Err(OracleError::Timeout { elapsed: started.elapsed(), limit }),
        Err(RecvTimeoutError::Disconnected) => {
            Err(OracleError::Unavailable("oracle worker exited without a reply".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Stub & adapter oracles
// ---------------------------------------------------------------------------

/// Always answers with the same parameters, whatever the signal.
#[derive(Debug, Clone)]
pub struct StaticOracle {
    params: ExPostParams,
}

impl StaticOracle {
    pub fn new(params: ExPostParams) -> Self {
        Self { params }
    }
}

impl SignalOracle for StaticOracle {
    fn infer(&self, _signal: &Value, _timeout: Duration) -> Result<ExPostParams, OracleError> {
        Ok(self.params.clone())
    }
}

/// Oracle backed by a closure over the signal.
pub struct FnOracle<F> {
    f: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&Value) -> Result<ExPostParams, OracleError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> SignalOracle for FnOracle<F>
where
    F: Fn(&Value) -> Result<ExPostParams, OracleError> + Send + Sync,
{
    fn infer(&self, signal: &Value, _timeout: Duration) -> Result<ExPostParams, OracleError> {
        (self.f)(signal)
    }
}

/// Oracle over a raw JSON transport, e.g. a model endpoint returning the
/// `{"do_nothing": {...}, "guess_address": {...}, ...}` reply format.
pub struct ReplyOracle<T> {
    transport: T,
}

impl<T> ReplyOracle<T>
where
    T: Fn(&Value, Duration) -> Result<Value, OracleError> + Send + Sync,
{
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T> SignalOracle for ReplyOracle<T>
where
    T: Fn(&Value, Duration) -> Result<Value, OracleError> + Send + Sync,
{
    fn infer(&self, signal: &Value, timeout: Duration) -> Result<ExPostParams, OracleError> {
        let reply = (self.transport)(signal, timeout)?;
        Ok(ExPostParams::from_oracle_reply(&reply)?)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

//! Per-host probe cycle: generation-2 endpoint first, generation-1 on timeout.

use async_trait::async_trait;
use healthfetch_core::{EndpointSpec, FetchError, Generation, ProbeOutcome, Target, CLASSIC_ENDPOINT, NEXT_ENDPOINT};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

use crate::transport::Transport;

/// When a failed generation-2 attempt moves on to the generation-1 endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Only a timeout is ambiguous enough to try the other port.
    #[default]
    TimeoutOnly,
    /// Any failure on port 8888 moves on to port 443.
    AnyFailure,
}

/// Runs one full probe cycle for a target and always yields exactly one outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

enum ProbeState {
    AttemptingNext,
    AttemptingClassic { next_error: FetchError },
    Done(ProbeOutcome),
}

pub struct EndpointProber<T> {
    transport: T,
    timeout: Duration,
    policy: FallbackPolicy,
}

impl<T: Transport> EndpointProber<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        EndpointProber { transport, timeout, policy: FallbackPolicy::default() }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    async fn attempt(&self, endpoint: &EndpointSpec, target: &Target) -> Result<Value, FetchError> {
        let started = Instant::now();
        let res = match timeout(self.timeout, self.transport.fetch(endpoint, target, self.timeout)).await {
            Ok(r) => r,
            Err(_) => Err(FetchError::Timeout),
        };
        debug!(
            address = %target,
            stage = %endpoint.generation,
            port = endpoint.port,
            outcome = res.as_ref().map(|_| "ok").unwrap_or_else(|e| e.kind()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "endpoint attempt"
        );
        res
    }

    fn falls_back_on(&self, e: &FetchError) -> bool {
        e.is_timeout() || self.policy == FallbackPolicy::AnyFailure
    }
}

#[async_trait]
impl<T: Transport> Probe for EndpointProber<T> {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let address = target.clone();
        let mut state = ProbeState::AttemptingNext;
        loop {
            state = match state {
                ProbeState::AttemptingNext => match self.attempt(&NEXT_ENDPOINT, target).await {
                    Ok(payload) => ProbeState::Done(ProbeOutcome::Success { address: address.clone(), generation: Generation::Next, payload }),
                    Err(e) if self.falls_back_on(&e) => ProbeState::AttemptingClassic { next_error: e },
                    Err(cause) => ProbeState::Done(ProbeOutcome::Error { address: address.clone(), generation: Some(Generation::Next), cause }),
                },
                ProbeState::AttemptingClassic { next_error } => match self.attempt(&CLASSIC_ENDPOINT, target).await {
                    Ok(payload) => ProbeState::Done(ProbeOutcome::Success { address: address.clone(), generation: Generation::Classic, payload }),
                    Err(FetchError::Timeout) => ProbeState::Done(ProbeOutcome::Timeout { address: address.clone(), generation: Generation::Classic }),
                    // port 8888 timed out and port 443 has no listener
                    Err(FetchError::Connection(_)) if next_error.is_timeout() => {
                        ProbeState::Done(ProbeOutcome::Timeout { address: address.clone(), generation: Generation::Classic })
                    }
                    Err(cause) => ProbeState::Done(ProbeOutcome::Error { address: address.clone(), generation: Some(Generation::Classic), cause }),
                },
                ProbeState::Done(outcome) => {
                    debug!(
                        address = %target,
                        generation = outcome.generation().map(|g| g.as_str()).unwrap_or("-"),
                        outcome = outcome.status(),
                        "probe finished"
                    );
                    return outcome;
                }
            };
        }
    }
}

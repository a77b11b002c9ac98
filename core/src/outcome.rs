use serde_json::Value;

use crate::{FetchError, Generation, Target};

/// The single result of a full probe cycle for one target.
///
/// Every variant carries the originating address so outcomes can be
/// collected in completion order without losing correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success {
        address: Target,
        generation: Generation,
        payload: Value,
    },
    /// `generation` is the last generation attempted.
    Timeout {
        address: Target,
        generation: Generation,
    },
    /// `generation` is `None` only when the worker died before an attempt was attributed.
    Error {
        address: Target,
        generation: Option<Generation>,
        cause: FetchError,
    },
}

impl ProbeOutcome {
    pub fn address(&self) -> &Target {
        match self {
            ProbeOutcome::Success { address, .. }
            | ProbeOutcome::Timeout { address, .. }
            | ProbeOutcome::Error { address, .. } => address,
        }
    }

    pub fn generation(&self) -> Option<Generation> {
        match self {
            ProbeOutcome::Success { generation, .. } | ProbeOutcome::Timeout { generation, .. } => {
                Some(*generation)
            }
            ProbeOutcome::Error { generation, .. } => *generation,
        }
    }

    /// Port of the endpoint the outcome refers to, when known.
    pub fn port(&self) -> Option<u16> {
        self.generation().map(|g| g.endpoint().port)
    }

    pub fn status(&self) -> &'static str {
        match self {
            ProbeOutcome::Success { .. } => "success",
            ProbeOutcome::Timeout { .. } => "timeout",
            ProbeOutcome::Error { .. } => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ProbeOutcome::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// The failure cause; `Timeout` outcomes report [`FetchError::Timeout`].
    pub fn error(&self) -> Option<FetchError> {
        match self {
            ProbeOutcome::Success { .. } => None,
            ProbeOutcome::Timeout { .. } => Some(FetchError::Timeout),
            ProbeOutcome::Error { cause, .. } => Some(cause.clone()),
        }
    }
}

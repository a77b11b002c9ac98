//! Health/hardware retrieval from generation-1 and generation-2 devices.
//!
//! [`EndpointProber`] runs the per-host cycle (port 8888 first, port 443 after a
//! timeout) over a [`Transport`]; [`FetchOrchestrator`] fans it out over a target
//! set with a bounded number of probes in flight.

pub mod orchestrator;
pub mod prober;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use orchestrator::FetchOrchestrator;
pub use prober::{EndpointProber, FallbackPolicy, Probe};
pub use transport::{Credentials, HttpOptions, HttpTransport, Transport};

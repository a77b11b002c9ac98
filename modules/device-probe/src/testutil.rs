//! Simulated endpoints for prober and orchestrator tests.

use async_trait::async_trait;
use healthfetch_core::{EndpointSpec, FetchError, Generation, Target};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::transport::{decode_payload, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Respond,
    Hang,
    Refuse,
    Status(u16),
    EmptyBody,
}

type Script = dyn Fn(&Target, Generation) -> Behavior + Send + Sync;

#[derive(Clone)]
pub struct SimTransport {
    script: Arc<Script>,
    calls: Arc<Mutex<Vec<(String, Generation)>>>,
}

impl SimTransport {
    pub fn scripted(script: impl Fn(&Target, Generation) -> Behavior + Send + Sync + 'static) -> Self {
        SimTransport { script: Arc::new(script), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Same behavior for every target.
    pub fn uniform(next: Behavior, classic: Behavior) -> Self {
        Self::scripted(move |_, generation| match generation {
            Generation::Next => next,
            Generation::Classic => classic,
        })
    }

    pub fn calls(&self) -> Vec<(String, Generation)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn fetch(&self, endpoint: &EndpointSpec, target: &Target, _timeout: Duration) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push((target.to_string(), endpoint.generation));
        match (self.script)(target, endpoint.generation) {
            Behavior::Respond => Ok(json!({
                "address": target.as_str(),
                "generation": endpoint.generation.as_str(),
                "port": endpoint.port,
            })),
            Behavior::Hang => std::future::pending().await,
            Behavior::Refuse => Err(FetchError::Connection("connection refused".into())),
            Behavior::Status(code) => Err(FetchError::HttpStatus(code)),
            Behavior::EmptyBody => decode_payload(b""),
        }
    }
}

use std::time::Duration;

use crate::Target;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Run-scoped inputs, fixed once probing starts.
#[derive(Debug, Clone)]
pub struct FetchSession {
    timeout: Duration,
    concurrency: usize,
    targets: Vec<Target>,
}

impl FetchSession {
    pub fn new(targets: Vec<Target>) -> Self {
        FetchSession { timeout: DEFAULT_TIMEOUT, concurrency: DEFAULT_CONCURRENCY, targets }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A limit of zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
}

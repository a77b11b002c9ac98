//! Bounded fan-out of probe cycles over a target set.

use futures::FutureExt;
use healthfetch_core::{FetchError, FetchSession, ProbeOutcome, Target};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

use crate::prober::Probe;

pub struct FetchOrchestrator<P> {
    prober: Arc<P>,
}

impl<P: Probe + 'static> FetchOrchestrator<P> {
    pub fn new(prober: P) -> Self {
        FetchOrchestrator { prober: Arc::new(prober) }
    }

    /// Start probing every target of the session and stream outcomes in completion order.
    ///
    /// At most `session.concurrency()` probes are in flight at once. The receiver yields
    /// exactly one outcome per target and closes once all of them have reported.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, session: &FetchSession) -> mpsc::Receiver<ProbeOutcome> {
        let targets = session.targets().to_vec();
        let concurrency = session.concurrency();
        let (tx, rx) = mpsc::channel::<ProbeOutcome>(targets.len().max(1));
        let sem = Arc::new(Semaphore::new(permit_count(concurrency, targets.len())));
        let prober = self.prober.clone();
        info!(targets = targets.len(), concurrency, timeout_ms = session.timeout().as_millis() as u64, "dispatching probes");

        tokio::spawn(async move {
            for t in targets {
                // the semaphore is never closed, a missing permit only means no throttling
                let permit = sem.clone().acquire_owned().await.ok();
                let txc = tx.clone();
                let prober = prober.clone();
                tokio::spawn(async move {
                    let outcome = probe_guarded(prober.as_ref(), t).await;
                    drop(permit);
                    let _ = txc.send(outcome).await;
                });
            }
        });
        rx
    }

    /// Probe every target and collect all outcomes.
    pub async fn run(&self, session: &FetchSession) -> Vec<ProbeOutcome> {
        let mut rx = self.dispatch(session);
        let mut out = Vec::with_capacity(session.targets().len());
        while let Some(o) = rx.recv().await {
            out.push(o);
        }
        info!(outcomes = out.len(), "all probes finished");
        out
    }
}

/// Permits never exceed the target count or what a tokio semaphore can hold.
fn permit_count(concurrency: usize, targets: usize) -> usize {
    concurrency.min(targets.max(1)).min(Semaphore::MAX_PERMITS)
}

/// Run one probe cycle; a panic inside the prober becomes an error outcome for that target.
async fn probe_guarded<P: Probe + ?Sized>(prober: &P, target: Target) -> ProbeOutcome {
    let result = AssertUnwindSafe(prober.probe(&target)).catch_unwind().await;
    match result {
        Ok(outcome) => outcome,
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(address = %target, error = %msg, "probe worker panicked");
            ProbeOutcome::Error { address: target, generation: None, cause: FetchError::Worker(msg) }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::EndpointProber;
    use crate::testutil::{Behavior, SimTransport};
    use async_trait::async_trait;
    use healthfetch_core::Generation;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BUDGET: Duration = Duration::from_secs(3);

    fn targets(n: usize) -> Vec<Target> {
        (1..=n).map(|i| Target(format!("10.0.0.{}", i))).collect()
    }

    fn sorted(mut v: Vec<ProbeOutcome>) -> Vec<ProbeOutcome> {
        v.sort_by(|a, b| a.address().cmp(b.address()));
        v
    }

    #[tokio::test(start_paused = true)]
    async fn one_outcome_per_target_for_every_limit() {
        let n = 6;
        for limit in 1..=n {
            let sim = SimTransport::scripted(|t, g| match (t.as_str(), g) {
                ("10.0.0.2", _) => Behavior::Refuse,
                ("10.0.0.3", Generation::Next) => Behavior::Hang,
                ("10.0.0.4", _) => Behavior::Hang,
                _ => Behavior::Respond,
            });
            let orch = FetchOrchestrator::new(EndpointProber::new(sim, BUDGET));
            let session = FetchSession::new(targets(n)).with_concurrency(limit).with_timeout(BUDGET);
            let out = orch.run(&session).await;
            assert_eq!(out.len(), n, "limit {}", limit);
            let mut per_addr: HashMap<String, usize> = HashMap::new();
            for o in &out {
                *per_addr.entry(o.address().to_string()).or_default() += 1;
            }
            assert_eq!(per_addr.len(), n);
            assert!(per_addr.values().all(|&c| c == 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn classic_everywhere_when_next_times_out() {
        let sim = SimTransport::uniform(Behavior::Hang, Behavior::Respond);
        let orch = FetchOrchestrator::new(EndpointProber::new(sim, BUDGET));
        let out = orch.run(&FetchSession::new(targets(5)).with_concurrency(2).with_timeout(BUDGET)).await;
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|o| matches!(o, ProbeOutcome::Success { generation: Generation::Classic, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn both_timeouts_keep_per_target_order() {
        let sim = SimTransport::uniform(Behavior::Hang, Behavior::Hang);
        let orch = FetchOrchestrator::new(EndpointProber::new(sim.clone(), BUDGET));
        let out = orch.run(&FetchSession::new(targets(4)).with_concurrency(4).with_timeout(BUDGET)).await;
        assert!(out.iter().all(|o| matches!(o, ProbeOutcome::Timeout { .. })));

        let calls = sim.calls();
        assert_eq!(calls.len(), 8);
        for t in targets(4) {
            let seq: Vec<Generation> = calls.iter().filter(|(a, _)| a == t.as_str()).map(|(_, g)| *g).collect();
            assert_eq!(seq, vec![Generation::Next, Generation::Classic]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refused_next_never_reaches_classic() {
        let sim = SimTransport::uniform(Behavior::Refuse, Behavior::Respond);
        let orch = FetchOrchestrator::new(EndpointProber::new(sim.clone(), BUDGET));
        let out = orch.run(&FetchSession::new(targets(3)).with_timeout(BUDGET)).await;
        assert!(out.iter().all(|o| o.error().map(|e| e.kind()) == Some("connection")));
        assert!(sim.calls().iter().all(|(_, g)| *g == Generation::Next));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_target_does_not_delay_others() {
        let sim = SimTransport::scripted(|t, _| if t.as_str() == "10.0.0.1" { Behavior::Hang } else { Behavior::Respond });
        let orch = FetchOrchestrator::new(EndpointProber::new(sim, BUDGET));
        let session = FetchSession::new(targets(4)).with_concurrency(4).with_timeout(BUDGET);
        let started = tokio::time::Instant::now();
        let mut rx = orch.dispatch(&session);
        let mut seen = 0;
        while let Some(o) = rx.recv().await {
            seen += 1;
            if o.address().as_str() == "10.0.0.1" {
                assert!(matches!(o, ProbeOutcome::Timeout { .. }));
            } else {
                assert!(o.is_success());
                assert!(started.elapsed() <= BUDGET, "{} took {:?}", o.address(), started.elapsed());
            }
        }
        assert_eq!(seen, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_runs_agree() {
        let script = |t: &Target, g: Generation| match (t.as_str(), g) {
            ("10.0.0.1", _) => Behavior::Status(503),
            ("10.0.0.2", Generation::Next) => Behavior::Hang,
            ("10.0.0.3", _) => Behavior::Hang,
            _ => Behavior::Respond,
        };
        let session = FetchSession::new(targets(5)).with_concurrency(3).with_timeout(BUDGET);
        let first = FetchOrchestrator::new(EndpointProber::new(SimTransport::scripted(script), BUDGET)).run(&session).await;
        let second = FetchOrchestrator::new(EndpointProber::new(SimTransport::scripted(script), BUDGET)).run(&session).await;
        assert_eq!(sorted(first), sorted(second));
    }

    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        async fn probe(&self, target: &Target) -> ProbeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeOutcome::Timeout { address: target.clone(), generation: Generation::Classic }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_ceiling_is_exact() {
        for limit in [1usize, 3, 7] {
            let orch = FetchOrchestrator::new(CountingProbe { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
            let out = orch.run(&FetchSession::new(targets(20)).with_concurrency(limit)).await;
            assert_eq!(out.len(), 20);
            assert_eq!(orch.prober.peak.load(Ordering::SeqCst), limit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_limit_runs_everything_at_once() {
        assert_eq!(permit_count(usize::MAX, 20), 20);
        assert_eq!(permit_count(usize::MAX, 0), 1);
        assert_eq!(permit_count(3, 20), 3);

        let orch = FetchOrchestrator::new(CountingProbe { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
        let out = orch.run(&FetchSession::new(targets(5)).with_concurrency(usize::MAX)).await;
        assert_eq!(out.len(), 5);
        assert_eq!(orch.prober.peak.load(Ordering::SeqCst), 5);
    }

    struct PanickyProbe;

    #[async_trait]
    impl Probe for PanickyProbe {
        async fn probe(&self, target: &Target) -> ProbeOutcome {
            if target.as_str() == "10.0.0.2" {
                panic!("worker blew up");
            }
            ProbeOutcome::Timeout { address: target.clone(), generation: Generation::Classic }
        }
    }

    #[tokio::test]
    async fn panicking_worker_becomes_error_outcome() {
        let orch = FetchOrchestrator::new(PanickyProbe);
        let out = sorted(orch.run(&FetchSession::new(targets(3)).with_concurrency(2)).await);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[1],
            ProbeOutcome::Error {
                address: Target::from("10.0.0.2"),
                generation: None,
                cause: FetchError::Worker("worker blew up".into()),
            }
        );
        assert!(matches!(out[0], ProbeOutcome::Timeout { .. }));
        assert!(matches!(out[2], ProbeOutcome::Timeout { .. }));
    }
}

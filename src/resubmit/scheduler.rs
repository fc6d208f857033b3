//! Periodic scheduling of submission attempts.
//!
//! The first attempt runs immediately, then one per interval until the
//! shutdown signal fires. Each outcome is logged here; attempts never stop
//! the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{OverlapPolicy, ScheduleConfig};
use crate::observability::metrics;
use crate::resubmit::attempt::{AttemptError, Confirmation, Resubmitter};
use crate::resubmit::explorer::ExplorerLinks;
use crate::solana::LedgerClient;

/// Counters accumulated over the life of a [`Scheduler::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub struct Scheduler<C> {
    resubmitter: Arc<Resubmitter<C>>,
    interval: Duration,
    overlap: OverlapPolicy,
    explorer: ExplorerLinks,
}

impl<C: LedgerClient + 'static> Scheduler<C> {
    pub fn new(
        resubmitter: Arc<Resubmitter<C>>,
        schedule: &ScheduleConfig,
        explorer: ExplorerLinks,
    ) -> Self {
        Self {
            resubmitter,
            interval: schedule.interval(),
            overlap: schedule.overlap,
            explorer,
        }
    }

    /// Tick until `shutdown` fires, then wait for in-flight attempts.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> SchedulerStats {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            overlap = ?self.overlap,
            "Scheduler starting"
        );

        let mut stats = SchedulerStats::default();
        let mut in_flight: JoinSet<bool> = JoinSet::new();
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.overlap == OverlapPolicy::Skip {
                        reap_finished(&mut in_flight, &mut stats);
                        if !in_flight.is_empty() {
                            stats.skipped += 1;
                            metrics::record_skipped_tick();
                            tracing::warn!("Previous attempt still running, skipping tick");
                            continue;
                        }
                    }
                    stats.started += 1;
                    let resubmitter = self.resubmitter.clone();
                    let explorer = self.explorer.clone();
                    in_flight.spawn(async move { run_attempt(&resubmitter, &explorer).await });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    tally(&mut stats, joined);
                }
                _ = shutdown.recv() => {
                    tracing::info!(in_flight = in_flight.len(), "Scheduler received shutdown signal");
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            tally(&mut stats, joined);
        }

        tracing::info!(
            started = stats.started,
            confirmed = stats.confirmed,
            failed = stats.failed,
            skipped = stats.skipped,
            "Scheduler stopped"
        );
        stats
    }
}

/// Collect attempts that have finished but not yet been joined.
fn reap_finished(in_flight: &mut JoinSet<bool>, stats: &mut SchedulerStats) {
    while let Some(joined) = in_flight.try_join_next() {
        tally(stats, joined);
    }
}

fn tally(stats: &mut SchedulerStats, joined: Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(true) => stats.confirmed += 1,
        Ok(false) => stats.failed += 1,
        Err(e) => {
            stats.failed += 1;
            tracing::error!(error = %e, "Attempt task aborted");
        }
    }
}

/// Run one attempt inside its own span, log and record the outcome.
/// Returns whether the transaction was confirmed.
pub async fn run_attempt<C: LedgerClient>(
    resubmitter: &Resubmitter<C>,
    explorer: &ExplorerLinks,
) -> bool {
    let span = tracing::info_span!("attempt", id = %Uuid::new_v4());
    async {
        let started = Instant::now();
        let outcome = resubmitter.attempt_submission().await;
        let elapsed = started.elapsed();

        report(&outcome, explorer);
        match &outcome {
            Ok(_) => metrics::record_attempt("confirmed", elapsed),
            Err(e) => metrics::record_attempt(e.kind(), elapsed),
        }
        outcome.is_ok()
    }
    .instrument(span)
    .await
}

/// Emit the single log line describing an attempt's outcome.
pub fn report(outcome: &Result<Confirmation, AttemptError>, explorer: &ExplorerLinks) {
    match outcome {
        Ok(confirmation) => tracing::info!(
            signature = %confirmation.signature,
            explorer = %explorer.transaction_url(&confirmation.signature),
            "Transaction confirmed"
        ),
        Err(e) => tracing::error!(error = %e, "Error signing and sending transaction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resubmit::attempt::tests::{latest, resubmitter, StubLedger};
    use std::io;
    use std::sync::Mutex;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }
    }

    fn schedule(interval_secs: u64, overlap: OverlapPolicy) -> ScheduleConfig {
        ScheduleConfig {
            interval_secs,
            overlap,
        }
    }

    #[tokio::test]
    async fn test_success_logs_one_confirmation_line() {
        let logs = Captured::default();
        let _guard = logs.install();

        let job = resubmitter(StubLedger::with_blockhashes(vec![Ok(latest(3))]));
        assert!(run_attempt(&job, &ExplorerLinks::default()).await);

        let signature = job.client().sent.lock().unwrap()[0].signature().copied().unwrap();
        let lines = logs.lines();
        let with_signature: Vec<_> = lines.iter().filter(|l| l.contains(&signature.to_string())).collect();
        assert_eq!(with_signature.len(), 1);
        assert!(with_signature[0].contains("explorer.solana.com"));
        assert!(lines.iter().all(|l| !l.contains("ERROR")));
    }

    #[tokio::test]
    async fn test_failure_logs_one_error_line() {
        let logs = Captured::default();
        let _guard = logs.install();

        let job = resubmitter(StubLedger::default());
        assert!(!run_attempt(&job, &ExplorerLinks::default()).await);

        let lines = logs.lines();
        assert_eq!(lines.iter().filter(|l| l.contains("ERROR")).count(), 1);
        assert!(lines.iter().all(|l| !l.contains("Transaction confirmed")));
        assert!(lines.iter().any(|l| l.contains("failed to fetch recent blockhash")));
    }

    #[tokio::test]
    async fn test_finished_attempts_are_reaped_before_overlap_check() {
        let mut in_flight = JoinSet::new();
        in_flight.spawn(async { true });
        in_flight.spawn(async { false });
        time::sleep(Duration::from_millis(20)).await;

        let mut stats = SchedulerStats::default();
        reap_finished(&mut in_flight, &mut stats);

        assert!(in_flight.is_empty());
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failures() {
        let job = Arc::new(resubmitter(StubLedger::default()));
        let shutdown = broadcast::channel::<()>(1);
        let scheduler = Scheduler::new(job.clone(), &schedule(2220, OverlapPolicy::Skip), ExplorerLinks::default());
        let handle = tokio::spawn(scheduler.run(shutdown.0.subscribe()));

        time::sleep(Duration::from_secs(2220 + 1)).await;
        shutdown.0.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.started, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(*job.client().blockhash_calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_skips_overlapping_tick() {
        let ledger = StubLedger {
            blockhash_delay: Some(Duration::from_secs(90)),
            ..StubLedger::default()
        };
        let scheduler = Scheduler::new(
            Arc::new(resubmitter(ledger)),
            &schedule(60, OverlapPolicy::Skip),
            ExplorerLinks::default(),
        );
        let shutdown = broadcast::channel::<()>(1);
        let handle = tokio::spawn(scheduler.run(shutdown.0.subscribe()));

        // Ticks at 0s, 60s (attempt still running until 90s), 120s.
        time::sleep(Duration::from_secs(150)).await;
        shutdown.0.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.started, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_policy_overlaps_attempts() {
        let ledger = StubLedger {
            blockhash_delay: Some(Duration::from_secs(90)),
            ..StubLedger::default()
        };
        let scheduler = Scheduler::new(
            Arc::new(resubmitter(ledger)),
            &schedule(60, OverlapPolicy::Concurrent),
            ExplorerLinks::default(),
        );
        let shutdown = broadcast::channel::<()>(1);
        let handle = tokio::spawn(scheduler.run(shutdown.0.subscribe()));

        time::sleep(Duration::from_secs(150)).await;
        shutdown.0.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.started, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failed, 3);
    }
}

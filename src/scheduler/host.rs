use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::constraints::{Constraints, DeviceState};
use super::job::PeriodicJob;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Scheduling host has been shut down")]
    ShutDown,

    #[error("Invalid periodic request: {0}")]
    InvalidRequest(&'static str),
}

/// How often a job runs and under what conditions.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicRequest {
    pub interval: Duration,
    pub constraints: Constraints,
    /// How often unmet constraints are re-checked
    pub constraint_poll: Duration,
}

struct Registration {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs periodic jobs on the tokio runtime, at most one registration per key.
///
/// Each registration runs its job once right away and then every
/// `interval`, waiting first until its constraints hold. Re-registering a
/// key replaces the old registration: its pending and in-flight runs are
/// abandoned, and the new one starts only after the old task has stopped.
pub struct SchedulingHost {
    device: Arc<dyn DeviceState>,
    shutdown: CancellationToken,
    jobs: Mutex<HashMap<String, Registration>>,
}

impl SchedulingHost {
    pub fn new(device: Arc<dyn DeviceState>) -> Self {
        Self {
            device,
            shutdown: CancellationToken::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `job` under `key`, replacing any existing registration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue_unique_periodic<J: PeriodicJob>(
        &self,
        key: &str,
        request: PeriodicRequest,
        job: J,
    ) -> Result<(), HostError> {
        if request.interval.is_zero() {
            return Err(HostError::InvalidRequest("interval must be non-zero"));
        }
        if request.constraint_poll.is_zero() {
            return Err(HostError::InvalidRequest("constraint poll must be non-zero"));
        }

        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shutdown.is_cancelled() {
            return Err(HostError::ShutDown);
        }

        let previous = jobs.remove(key).map(|old| {
            old.cancel.cancel();
            tracing::debug!(key = %key, "Replacing periodic job");
            old.handle
        });

        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(run_periodic(
            key.to_string(),
            request,
            Arc::new(job),
            Arc::clone(&self.device),
            cancel.clone(),
            previous,
        ));
        jobs.insert(key.to_string(), Registration { cancel, handle });

        tracing::info!(
            key = %key,
            interval_secs = request.interval.as_secs(),
            require_network = request.constraints.require_network,
            require_charging = request.constraints.require_charging,
            "Periodic job registered"
        );
        Ok(())
    }

    /// Stops the registration under `key`. Returns whether one existed.
    pub fn cancel_unique(&self, key: &str) -> bool {
        let removed = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(registration) => {
                registration.cancel.cancel();
                tracing::info!(key = %key, "Periodic job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Cancels every registration and waits for their tasks to stop.
    /// Later registrations are refused.
    pub async fn shutdown(&self) {
        let registrations: Vec<Registration> = {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            self.shutdown.cancel();
            jobs.drain().map(|(_, registration)| registration).collect()
        };
        for registration in registrations {
            if let Err(e) = registration.handle.await {
                tracing::warn!(error = %e, "Periodic job task ended abnormally");
            }
        }
        tracing::debug!("Scheduling host stopped");
    }
}

async fn run_periodic<J: PeriodicJob>(
    key: String,
    request: PeriodicRequest,
    job: Arc<J>,
    device: Arc<dyn DeviceState>,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        // Runs of one key never overlap
        let _ = previous.await;
    }

    let mut due = Instant::now();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(due) => {}
        }

        while !request.constraints.is_satisfied(device.as_ref()) {
            tracing::debug!(key = %key, "Constraints not met, waiting");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(request.constraint_poll) => {}
            }
        }

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(key = %key, "Periodic job abandoned mid-run");
                break;
            }
            result = job.run() => {
                if let Err(e) = result {
                    tracing::warn!(key = %key, error = %format!("{e:#}"), "Periodic job failed");
                }
            }
        }
        due = started + request.interval;
    }
    tracing::debug!(key = %key, "Periodic job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::scheduler::AlwaysReady;

    const HOUR: Duration = Duration::from_secs(3600);

    #[derive(Clone, Default)]
    struct CountingJob {
        runs: Arc<AtomicUsize>,
    }

    impl PeriodicJob for CountingJob {
        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Never finishes; records whether its run was dropped.
    struct HangingJob {
        started: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl PeriodicJob for HangingJob {
        async fn run(&self) -> anyhow::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let _guard = SetOnDrop(Arc::clone(&self.dropped));
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Switchable {
        network: AtomicBool,
    }

    impl DeviceState for Switchable {
        fn network_available(&self) -> bool {
            self.network.load(Ordering::SeqCst)
        }
        fn charging(&self) -> bool {
            true
        }
    }

    fn hourly(constraints: Constraints) -> PeriodicRequest {
        PeriodicRequest {
            interval: HOUR,
            constraints,
            constraint_poll: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let host = SchedulingHost::new(Arc::new(AlwaysReady));
        let job = CountingJob::default();
        let runs = Arc::clone(&job.runs);

        host.enqueue_unique_periodic("k", hourly(Constraints::none()), job)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(HOUR).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(HOUR * 2).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);

        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistering_replaces_previous_job() {
        let host = SchedulingHost::new(Arc::new(AlwaysReady));
        let first = CountingJob::default();
        let second = CountingJob::default();
        let (first_runs, second_runs) = (Arc::clone(&first.runs), Arc::clone(&second.runs));

        host.enqueue_unique_periodic("k", hourly(Constraints::none()), first)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        host.enqueue_unique_periodic("k", hourly(Constraints::none()), second)
            .unwrap();
        tokio::time::sleep(HOUR * 3).await;

        assert_eq!(first_runs.load(Ordering::SeqCst), 1);
        assert!(second_runs.load(Ordering::SeqCst) >= 3);
        assert!(host.is_registered("k"));

        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_abandons_in_flight_run() {
        let host = SchedulingHost::new(Arc::new(AlwaysReady));
        let started = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        host.enqueue_unique_periodic(
            "k",
            hourly(Constraints::none()),
            HangingJob {
                started: Arc::clone(&started),
                dropped: Arc::clone(&dropped),
            },
        )
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!dropped.load(Ordering::SeqCst));

        let replacement = CountingJob::default();
        let runs = Arc::clone(&replacement.runs);
        host.enqueue_unique_periodic("k", hourly(Constraints::none()), replacement)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_constraints() {
        let device = Arc::new(Switchable {
            network: AtomicBool::new(false),
        });
        let host = SchedulingHost::new(device.clone());
        let job = CountingJob::default();
        let runs = Arc::clone(&job.runs);

        let constraints = Constraints {
            require_network: true,
            require_charging: true,
        };
        host.enqueue_unique_periodic("k", hourly(constraints), job).unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        device.network.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unique_stops_job() {
        let host = SchedulingHost::new(Arc::new(AlwaysReady));
        let job = CountingJob::default();
        let runs = Arc::clone(&job.runs);

        host.enqueue_unique_periodic("k", hourly(Constraints::none()), job)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(host.cancel_unique("k"));
        assert!(!host.cancel_unique("k"));
        tokio::time::sleep(HOUR * 3).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown_and_bad_requests() {
        let host = SchedulingHost::new(Arc::new(AlwaysReady));

        let zero = PeriodicRequest {
            interval: Duration::ZERO,
            ..hourly(Constraints::none())
        };
        assert!(matches!(
            host.enqueue_unique_periodic("k", zero, CountingJob::default()),
            Err(HostError::InvalidRequest(_))
        ));

        host.shutdown().await;
        assert!(matches!(
            host.enqueue_unique_periodic("k", hourly(Constraints::none()), CountingJob::default()),
            Err(HostError::ShutDown)
        ));
    }
}

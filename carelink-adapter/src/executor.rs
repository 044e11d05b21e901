use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, instrument, warn};

use carelink_core::{
    AdapterCommand, AdapterFailure, AdapterJob, AdapterKind, AdapterResponse, DeviceId,
    JobOutcome, JobPriority, SceneStep,
};
use carelink_policy::PolicySnapshot;

use crate::error::AdapterError;
use crate::registry::AdapterRegistry;
use crate::retry::Backoff;

struct Lane {
    semaphore: Arc<Semaphore>,
    queue_bound: usize,
    waiting: AtomicUsize,
}

/// Bounded-concurrency job executor.
///
/// One lane per adapter kind with a concurrency cap and a queue bound.
/// Normal jobs that find the queue full get [`JobOutcome::Busy`]; emergency
/// jobs are never dropped and skip the bound. Per-device in-flight caps
/// prevent conflicting smart-home commands, and idempotency keys make
/// replayed emergency steps no-ops.
pub struct JobExecutor {
    registry: AdapterRegistry,
    lanes: HashMap<AdapterKind, Lane>,
    device_locks: DashMap<DeviceId, Arc<Mutex<()>>>,
    completed: DashMap<String, JobOutcome>,
    scene_min_success_ratio: f64,
}

impl JobExecutor {
    /// Build an executor with lane caps and the scene ratio from policy.
    #[must_use]
    pub fn new(registry: AdapterRegistry, policy: &PolicySnapshot) -> Self {
        let caps = policy.concurrency;
        let lane = |permits: usize| Lane {
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
            queue_bound: caps.queue_bound,
            waiting: AtomicUsize::new(0),
        };
        let lanes = HashMap::from([
            (AdapterKind::SmartHome, lane(caps.smart_home)),
            (AdapterKind::Call, lane(caps.call)),
            (AdapterKind::Notify, lane(caps.notify)),
            (AdapterKind::Tts, lane(caps.tts)),
            (AdapterKind::Video, lane(caps.video)),
        ]);
        Self {
            registry,
            lanes,
            device_locks: DashMap::new(),
            completed: DashMap::new(),
            scene_min_success_ratio: policy.emergency.scene_min_success_ratio,
        }
    }

    /// The registry this executor dispatches against.
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Execute one job to a terminal outcome.
    #[instrument(skip(self, job, policy), fields(job = %job.id, kind = %job.command.kind()))]
    pub async fn submit(&self, job: AdapterJob, policy: &PolicySnapshot) -> JobOutcome {
        if let Some(key) = &job.idempotency_key {
            if self.completed.contains_key(key) {
                debug!(key = %key, "duplicate emergency step, skipping");
                return JobOutcome::Duplicate;
            }
        }

        let lane = &self.lanes[&job.command.kind()];
        let _permit = match job.priority {
            JobPriority::Emergency => lane
                .semaphore
                .acquire()
                .await
                .expect("lane semaphore never closes"),
            JobPriority::Normal => {
                // Approximate bound: racing submitters may overshoot by a
                // few slots, which is acceptable for backpressure.
                if lane.waiting.load(Ordering::SeqCst) >= lane.queue_bound {
                    warn!(kind = %job.command.kind(), "lane saturated");
                    return JobOutcome::Busy;
                }
                lane.waiting.fetch_add(1, Ordering::SeqCst);
                let permit = lane.semaphore.acquire().await;
                lane.waiting.fetch_sub(1, Ordering::SeqCst);
                permit.expect("lane semaphore never closes")
            }
        };

        let _device_guard = match job.command.device() {
            Some(device) => Some(self.device_lock(device).lock_owned().await),
            None => None,
        };

        let outcome = match &job.command {
            AdapterCommand::ApplyScene { name, steps } => {
                self.run_scene(name, steps, &job, policy).await
            }
            command => self.run_with_retries(command, &job, policy).await,
        };

        if let Some(key) = &job.idempotency_key {
            self.completed.insert(key.clone(), outcome.clone());
        }
        outcome
    }

    fn device_lock(&self, device: &DeviceId) -> Arc<Mutex<()>> {
        self.device_locks
            .entry(device.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Retry loop for a single command, bounded by the job deadline.
    #[allow(clippy::cast_possible_truncation)]
    async fn run_with_retries(
        &self,
        command: &AdapterCommand,
        job: &AdapterJob,
        policy: &PolicySnapshot,
    ) -> JobOutcome {
        let kind = command.kind();
        let backoff = Backoff::new(policy.retry_params(kind.as_str()));
        let deadline = tokio::time::Instant::from_std(job.deadline);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result =
                tokio::time::timeout_at(deadline, self.registry.execute(command)).await;

            match result {
                Ok(Ok(response)) => {
                    debug!(attempts, "job executed");
                    return JobOutcome::Completed { response };
                }
                Ok(Err(err)) => {
                    let retries_left = attempts <= backoff.max_retries();
                    if err.is_retryable() && retries_left {
                        let delay = backoff.delay_for(attempts - 1);
                        if tokio::time::Instant::now() + delay >= deadline {
                            return failed(&err, attempts);
                        }
                        warn!(attempts, error = %err, delay_ms = delay.as_millis() as u64, "retrying job");
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(attempts, error = %err, "job failed");
                        return failed(&err, attempts);
                    }
                }
                Err(_elapsed) => {
                    warn!(attempts, "job deadline exceeded");
                    return failed(
                        &AdapterError::Timeout(
                            job.deadline.saturating_duration_since(std::time::Instant::now()),
                        ),
                        attempts,
                    );
                }
            }
        }
    }

    /// Best-effort scene batch: steps run concurrently (the per-device cap
    /// still serializes same-device steps) and the scene counts as applied
    /// iff the success ratio meets policy.
    async fn run_scene(
        &self,
        name: &str,
        steps: &[SceneStep],
        job: &AdapterJob,
        policy: &PolicySnapshot,
    ) -> JobOutcome {
        if steps.is_empty() {
            return JobOutcome::Completed {
                response: AdapterResponse::success(serde_json::json!({"scene": name, "steps": 0})),
            };
        }

        let results = join_all(steps.iter().map(|step| {
            let command = AdapterCommand::SmartHome {
                device: step.device.clone(),
                action: step.action.clone(),
                params: step.params.clone(),
            };
            async move {
                let _guard = self.device_lock(&step.device).lock_owned().await;
                let outcome = self.run_with_retries(&command, job, policy).await;
                (step.device.clone(), outcome)
            }
        }))
        .await;

        let succeeded: Vec<String> = results
            .iter()
            .filter(|(_, o)| o.succeeded())
            .map(|(d, _)| d.to_string())
            .collect();
        let failed_devices: Vec<String> = results
            .iter()
            .filter(|(_, o)| !o.succeeded())
            .map(|(d, _)| d.to_string())
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let ratio = succeeded.len() as f64 / steps.len() as f64;
        let body = serde_json::json!({
            "scene": name,
            "succeeded": succeeded,
            "failed": failed_devices,
            "ratio": ratio,
        });

        if ratio >= self.scene_min_success_ratio {
            let response = if failed_devices.is_empty() {
                AdapterResponse::success(body)
            } else {
                warn!(scene = name, ?failed_devices, "scene applied partially");
                AdapterResponse::partial(body)
            };
            JobOutcome::Completed { response }
        } else {
            warn!(scene = name, ratio, "scene failed below success ratio");
            JobOutcome::Failed {
                error: AdapterFailure {
                    code: "SCENE_FAILED".into(),
                    message: format!("scene {name:?} succeeded on {ratio:.2} of devices"),
                    retryable: false,
                    attempts: 1,
                },
            }
        }
    }
}

fn failed(err: &AdapterError, attempts: u32) -> JobOutcome {
    JobOutcome::Failed {
        error: AdapterFailure {
            code: err.code().into(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            attempts,
        },
    }
}

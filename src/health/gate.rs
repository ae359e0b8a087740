// ABOUTME: Bounded health polling for the services of one phase.
// ABOUTME: One task per service, all cancelled together when the phase deadline fires.

use super::probe::{HealthProbe, Observation, observe};
use super::status::{ContainerStatus, HealthStatus, ServiceResult};
use crate::phase::Service;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

/// Polls services until they are healthy or the timeout elapses.
#[derive(Clone)]
pub struct HealthGate {
    probe: Arc<dyn HealthProbe>,
    poll_interval: Duration,
}

impl std::fmt::Debug for HealthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthGate")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl HealthGate {
    pub fn new(probe: Arc<dyn HealthProbe>, poll_interval: Duration) -> Self {
        Self {
            probe,
            poll_interval,
        }
    }

    /// Wait until every service is healthy, `timeout` elapses or `cancel` fires.
    ///
    /// Services unresolved at that point get `HealthStatus::Timeout` and keep
    /// the container status of their last probe. Results follow `services` order.
    pub async fn wait_for_healthy(
        &self,
        services: &[Service],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Vec<ServiceResult> {
        let deadline = Instant::now() + timeout;
        let gate = cancel.child_token();
        let last_seen: Arc<Mutex<Vec<Option<Observation>>>> =
            Arc::new(Mutex::new(vec![None; services.len()]));

        let mut tasks = JoinSet::new();
        for (idx, service) in services.iter().cloned().enumerate() {
            let probe = Arc::clone(&self.probe);
            let token = gate.child_token();
            let last_seen = Arc::clone(&last_seen);
            let interval = self.poll_interval;
            let span = info_span!("health", service = %service.name);
            tasks.spawn(
                async move {
                    let record = |obs: &Observation| last_seen.lock()[idx] = Some(obs.clone());
                    let result =
                        poll_until_healthy(&*probe, &service, interval, &token, record).await;
                    (idx, result)
                }
                .instrument(span),
            );
        }

        let mut resolved: Vec<Option<ServiceResult>> = vec![None; services.len()];
        let expired = sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((idx, Some(result)))) => resolved[idx] = Some(result),
                    Some(Ok((_, None))) => {}
                    Some(Err(e)) => warn!(error = %e, "health task ended abnormally"),
                },
                _ = &mut expired => {
                    debug!(?timeout, "health deadline reached");
                    break;
                }
                _ = cancel.cancelled() => {
                    debug!("health gate cancelled");
                    break;
                }
            }
        }

        gate.cancel();
        tasks.abort_all();

        let last_seen = last_seen.lock();
        services
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(idx, (service, result))| {
                result.unwrap_or_else(|| timed_out(service, last_seen[idx].as_ref()))
            })
            .collect()
    }

    /// A single probe round per service, without waiting for anything to recover.
    pub async fn verify_once(
        &self,
        services: &[Service],
        cancel: &CancellationToken,
    ) -> Vec<ServiceResult> {
        let rounds = futures::future::join_all(
            services.iter().map(|service| observe(&*self.probe, service)),
        );

        let observations = tokio::select! {
            observations = rounds => observations,
            _ = cancel.cancelled() => {
                return services.iter().map(cancelled).collect();
            }
        };

        services
            .iter()
            .zip(observations)
            .map(|(service, obs)| {
                ServiceResult::new(service, obs.container, obs.health, obs.detail)
            })
            .collect()
    }
}

async fn poll_until_healthy(
    probe: &dyn HealthProbe,
    service: &Service,
    interval: Duration,
    token: &CancellationToken,
    record: impl Fn(&Observation),
) -> Option<ServiceResult> {
    let mut round = 0u32;
    loop {
        round += 1;
        let obs = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            obs = observe(probe, service) => obs,
        };
        record(&obs);

        if obs.is_healthy() {
            debug!(round, health = ?obs.health, "service healthy");
            return Some(ServiceResult::new(service, obs.container, obs.health, obs.detail));
        }
        debug!(
            round,
            container = ?obs.container,
            detail = ?obs.detail,
            "service not healthy yet"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = sleep(interval) => {}
        }
    }
}

fn timed_out(service: &Service, last: Option<&Observation>) -> ServiceResult {
    let container = last.map_or(ContainerStatus::Unknown, |o| o.container);
    let detail = last
        .and_then(|o| o.detail.clone())
        .or_else(|| Some("no probe completed before the deadline".to_string()));
    ServiceResult::new(service, container, HealthStatus::Timeout, detail)
}

fn cancelled(service: &Service) -> ServiceResult {
    ServiceResult::new(
        service,
        ContainerStatus::Unknown,
        HealthStatus::Timeout,
        Some("cancelled".to_string()),
    )
}

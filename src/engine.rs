use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::checker::Checker;
use crate::config::MonitorConfig;
use crate::escalation::AlertEscalator;
use crate::models::{EndpointKey, PrevStatus, ProbeVerdict};
use crate::notifier::{Notification, Notifier};
use crate::state::StateStore;

/// Orchestrates the repeating sweep: probe every configured endpoint,
/// run the verdicts through the escalator, deliver notifications, and
/// persist the fresh snapshot for the next cycle (and the next process).
pub struct Monitor {
    config: MonitorConfig,
    checker: Arc<Checker>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
    escalator: AlertEscalator,
    last_status: HashMap<EndpointKey, bool>,
    limiter: Arc<Semaphore>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let checker = Arc::new(Checker::new()?);
        let store = StateStore::new(config.state_file.clone());
        let escalator = AlertEscalator::new(
            config.second_alert_delay(),
            config.subsequent_alert_delay(),
        );
        let last_status = store.load();
        let limiter = Arc::new(Semaphore::new(config.max_concurrency));
        Ok(Self {
            config,
            checker,
            notifier,
            store,
            escalator,
            last_status,
            limiter,
        })
    }

    pub async fn run(mut self) {
        info!(
            "monitoring {} host(s) every {}s",
            self.config.hosts.len(),
            self.config.check_interval_seconds
        );
        loop {
            let started = std::time::Instant::now();
            let checked = self.sweep().await;
            info!(
                "sweep finished: {checked} endpoint(s) in {:.2}s",
                started.elapsed().as_secs_f64()
            );
            tokio::time::sleep(self.config.check_interval()).await;
        }
    }

    /// One full pass over the configured topology. Returns the number of
    /// endpoints checked.
    pub(crate) async fn sweep(&mut self) -> usize {
        let mut probes = FuturesUnordered::new();

        for host in &self.config.hosts {
            for service_name in &host.services {
                let Some(endpoints) = self.config.services.get(service_name) else {
                    warn!("service {service_name} not defined in config, skipping");
                    continue;
                };
                for endpoint in endpoints {
                    let key = EndpointKey::new(&host.address, service_name, endpoint.port);
                    let checker = Arc::clone(&self.checker);
                    let limiter = Arc::clone(&self.limiter);
                    let path = endpoint.path.clone();
                    let retry_count = self.config.retry_count;
                    let retry_delay = self.config.retry_delay();
                    let timeout = self.config.timeout();

                    probes.push(tokio::spawn(async move {
                        let _permit = limiter.acquire().await.ok();
                        let verdict = checker
                            .check_with_retry(&key.host, key.port, &path, retry_count, retry_delay, timeout)
                            .await;
                        (key, verdict)
                    }));
                }
            }
        }

        let mut results: Vec<(EndpointKey, ProbeVerdict)> = Vec::with_capacity(probes.len());
        while let Some(joined) = probes.next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => error!("probe task panicked: {err}"),
            }
        }
        // Deterministic processing order, independent of completion order.
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let now = Utc::now();
        let checked = results.len();
        let mut current: HashMap<EndpointKey, bool> = HashMap::with_capacity(checked);

        for (key, verdict) in results {
            debug!(
                "probe {key}: up={} protocol={:?} at {}",
                verdict.up, verdict.protocol, verdict.observed_at
            );
            let prev = PrevStatus::from(self.last_status.get(&key).copied());
            let decision = self.escalator.evaluate(&key, verdict.up, prev, now);
            current.insert(key.clone(), verdict.up);

            if !decision.notify {
                continue;
            }
            let reason = verdict
                .protocol
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| "unreachable".to_string());
            let note = Notification {
                endpoint: key.clone(),
                status: decision.status,
                reason,
                tier: decision.tier,
            };
            match self.notifier.notify(&note).await {
                Ok(()) => info!(
                    "notified {key} [{}] tier {}",
                    decision.status.label(),
                    decision.tier
                ),
                Err(err) => error!("notification failed for {key}: {err}"),
            }
        }

        self.escalator.prune(&current);
        self.store.save(&current);
        self.last_status = current;
        checked
    }
}

//! Runtime wiring
//!
//! ```text
//! RuntimeConfig ──→ TableRegistry ──→ VoltageAdjuster
//!                                         │
//!        AvsAgent (one per device) ───────┤ adjust / enable / disable
//!                                         │
//!                      TracingObserver ←──┼──→ EventBridge ──→ consumer task
//! ```

use anyhow::{Context, Result};
use opp_core::{
    EventBridge, MetricsSnapshot, OppEvent, OppEventStream, Subscription, TableRegistry,
    TracingObserver, VoltageAdjuster,
};
use shared_types::DeviceId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::agent::{AgentReport, AvsAgent};
use crate::config::RuntimeConfig;

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub agents: Vec<AgentReport>,
    /// Notifications seen by the event consumer, per event kind.
    pub notifications: HashMap<OppEvent, u64>,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn notifications_total(&self) -> u64 {
        self.notifications.values().sum()
    }
}

/// Owns the registry, the adjuster and the observers wired to every table.
pub struct OppRuntime {
    config: RuntimeConfig,
    adjuster: Arc<VoltageAdjuster>,
    bridge: EventBridge,
    /// Dropped with the runtime, which unsubscribes every observer.
    subscriptions: Vec<Subscription>,
    shutdown_tx: watch::Sender<bool>,
}

impl OppRuntime {
    /// Register every configured table and subscribe the observers.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        info!("Creating OPP runtime");

        let tables = config.load_tables()?;
        let registry = Arc::new(TableRegistry::new());
        for table in tables.tables {
            let opps = table.opps.len();
            registry
                .register_table(
                    table.device.clone(),
                    table.opps.into_iter().map(|opp| (opp.frequency, opp.voltages)),
                )
                .with_context(|| format!("Failed to register OPP table for {}", table.device))?;
            info!(device = %table.device, opps, "OPP table ready");
        }

        let adjuster = Arc::new(VoltageAdjuster::with_config(registry, config.core.clone()));
        let bridge = EventBridge::new(config.core.event_stream_capacity);

        let mut subscriptions = Vec::new();
        for device in adjuster.registry().devices() {
            subscriptions.push(adjuster.subscribe(&device, TracingObserver::new(device.clone()))?);
            subscriptions.push(adjuster.subscribe(&device, bridge.observer_for(device.clone()))?);
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            adjuster,
            bridge,
            subscriptions,
            shutdown_tx,
        })
    }

    pub fn adjuster(&self) -> &Arc<VoltageAdjuster> {
        &self.adjuster
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        self.adjuster.registry().devices()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Run the agents to completion, or until `shutdown` resolves.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<RunReport>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        info!("===========================================");
        info!("  OPP Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Devices: {}", self.devices().len());
        info!("===========================================");

        let consumer = tokio::spawn(consume(self.bridge.stream(), self.shutdown_tx.subscribe()));

        let agents: Vec<_> = self
            .devices()
            .into_iter()
            .map(|device| {
                let agent = AvsAgent::new(device, self.adjuster.clone(), self.config.avs.clone());
                tokio::spawn(agent.run(self.shutdown_tx.subscribe()))
            })
            .collect();

        let signal = {
            let shutdown_tx = self.shutdown_tx.clone();
            tokio::spawn(async move {
                shutdown.await;
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            })
        };

        let reports = join_agents(agents, &self.shutdown_tx).await;

        // Agents are done; let the consumer drain and stop.
        signal.abort();
        self.shutdown();
        let notifications = consumer.await.context("Event consumer task failed")?;
        let reports = reports?;

        let metrics = self.adjuster.metrics().snapshot();
        info!(
            requests = metrics.requests,
            changed = metrics.changed,
            unchanged = metrics.unchanged,
            failures = metrics.failures(),
            availability_changes = metrics.availability_changes,
            notifications = metrics.notifications_dispatched,
            slow_dispatches = metrics.slow_dispatches,
            "OPP runtime finished"
        );

        Ok(RunReport {
            agents: reports,
            notifications,
            metrics,
        })
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("No tasks listening for shutdown");
        }
    }
}

/// Wait for every agent. The first failure signals shutdown so the others
/// stop too; it is returned once all of them are done.
async fn join_agents(
    agents: Vec<JoinHandle<AgentReport>>,
    shutdown_tx: &watch::Sender<bool>,
) -> Result<Vec<AgentReport>> {
    let mut reports = Vec::with_capacity(agents.len());
    let mut failure = None;

    for agent in agents {
        match agent.await {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!(%err, "AVS agent task failed");
                if failure.is_none() {
                    let _ = shutdown_tx.send(true);
                    failure = Some(err);
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err).context("AVS agent task failed"),
        None => Ok(reports),
    }
}

/// Count notifications until shutdown, then drain what is buffered.
async fn consume(
    mut stream: OppEventStream,
    mut shutdown: watch::Receiver<bool>,
) -> HashMap<OppEvent, u64> {
    let mut counts: HashMap<OppEvent, u64> = HashMap::new();

    loop {
        tokio::select! {
            notification = stream.recv() => match notification {
                Some(notification) => {
                    debug!(
                        device = %notification.device,
                        event = %notification.event,
                        target = %notification.snapshot.voltages.target,
                        "Notification received"
                    );
                    *counts.entry(notification.event).or_default() += 1;
                }
                None => return counts,
            },
            _ = shutdown.changed() => break,
        }
    }

    loop {
        match stream.try_recv() {
            Ok(Some(notification)) => *counts.entry(notification.event).or_default() += 1,
            Ok(None) => break,
            Err(err) => {
                error!(%err, "Event stream failed while draining");
                break;
            }
        }
    }
    counts
}

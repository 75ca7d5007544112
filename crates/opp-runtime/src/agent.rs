//! Simulated adaptive voltage scaling agent
//!
//! Each tick picks an OPP of its device and nudges the target voltage by a
//! random step, keeping the min/max margins around it. Now and then it
//! disables an OPP for a tick to exercise availability changes.

use opp_core::{AdjustError, ChangeOutcome, OppVoltageApi, VoltageAdjuster};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{DeviceId, Hertz, MicroVolt, Voltages};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::AvsConfig;

/// One in this many ticks also toggles availability.
const TOGGLE_ODDS: u32 = 10;

/// What an agent did over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub device: DeviceId,
    pub rounds: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub missing: u64,
    pub toggles: u64,
}

impl AgentReport {
    fn new(device: DeviceId) -> Self {
        Self {
            device,
            rounds: 0,
            changed: 0,
            unchanged: 0,
            missing: 0,
            toggles: 0,
        }
    }
}

/// Drives voltage adjustments for one device.
pub struct AvsAgent {
    device: DeviceId,
    adjuster: Arc<VoltageAdjuster>,
    config: AvsConfig,
    rng: StdRng,
}

impl AvsAgent {
    pub fn new(device: DeviceId, adjuster: Arc<VoltageAdjuster>, config: AvsConfig) -> Self {
        Self {
            device,
            adjuster,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic agent for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Tick until the configured rounds are done, the device disappears, or
    /// shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AgentReport {
        let mut report = AgentReport::new(self.device.clone());
        let mut ticker = tokio::time::interval(self.config.interval());
        info!(device = %self.device, rounds = self.config.rounds, "AVS agent started");

        loop {
            if self.config.rounds != 0 && report.rounds >= self.config.rounds {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            report.rounds += 1;
            if let Err(AdjustError::DeviceNotFound { .. }) = self.tick(&mut report) {
                warn!(device = %self.device, "Device has no OPP table, stopping agent");
                break;
            }
        }

        info!(
            device = %self.device,
            rounds = report.rounds,
            changed = report.changed,
            unchanged = report.unchanged,
            "AVS agent stopped"
        );
        report
    }

    fn tick(&mut self, report: &mut AgentReport) -> Result<(), AdjustError> {
        let Some((frequency, current)) = self.pick_opp()? else {
            debug!(device = %self.device, "Table is empty, nothing to adjust");
            return Ok(());
        };

        let next = self.step(current);
        match self
            .adjuster
            .adjust_voltage(&self.device, frequency, next.target, next.min, next.max)
        {
            Ok(ChangeOutcome::Changed) => report.changed += 1,
            Ok(ChangeOutcome::Unchanged) => report.unchanged += 1,
            Err(AdjustError::FrequencyNotFound { .. }) => {
                // Raced with a removal; the next tick picks again.
                warn!(
                    device = %self.device,
                    frequency = %frequency,
                    "OPP vanished before adjustment"
                );
                report.missing += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        if self.rng.gen_ratio(1, TOGGLE_ODDS) {
            self.toggle(frequency, report)?;
        }
        Ok(())
    }

    /// A random listed OPP and its current triplet.
    fn pick_opp(&mut self) -> Result<Option<(Hertz, Voltages)>, AdjustError> {
        let table = self
            .adjuster
            .registry()
            .acquire(&self.device)
            .map_err(|_| AdjustError::DeviceNotFound {
                device: self.device.clone(),
            })?;

        let snapshots = table.snapshots();
        if snapshots.is_empty() {
            return Ok(None);
        }
        let pick = &snapshots[self.rng.gen_range(0..snapshots.len())];
        Ok(Some((pick.frequency, pick.voltages)))
    }

    /// Move the target by a random step, keeping both margins.
    fn step(&mut self, current: Voltages) -> Voltages {
        let max_step = i64::try_from(self.config.max_step_uv).unwrap_or(i64::MAX);
        let delta = if max_step == 0 {
            0
        } else {
            self.rng.gen_range(-max_step..=max_step)
        };

        let below = current.target.as_uv().saturating_sub(current.min.as_uv());
        let above = current.max.as_uv().saturating_sub(current.target.as_uv());
        let target = current.target.saturating_offset(delta);

        Voltages {
            target,
            min: MicroVolt(target.as_uv().saturating_sub(below)),
            max: MicroVolt(target.as_uv().saturating_add(above)),
        }
    }

    /// Disable then re-enable `frequency`.
    fn toggle(&mut self, frequency: Hertz, report: &mut AgentReport) -> Result<(), AdjustError> {
        for result in [
            self.adjuster.disable_opp(&self.device, frequency),
            self.adjuster.enable_opp(&self.device, frequency),
        ] {
            match result {
                Ok(_) => {}
                Err(AdjustError::FrequencyNotFound { .. }) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        report.toggles += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opp_core::TableRegistry;

    fn adjuster() -> Arc<VoltageAdjuster> {
        let registry = Arc::new(TableRegistry::new());
        registry
            .register_table(
                DeviceId::from("cpu0"),
                [
                    (Hertz::from_mhz(500), Voltages::new(800_000, 750_000, 850_000)),
                    (Hertz::from_mhz(1_000), Voltages::new(900_000, 850_000, 950_000)),
                ],
            )
            .unwrap();
        Arc::new(VoltageAdjuster::new(registry))
    }

    fn fast(rounds: u64, max_step_uv: u64) -> AvsConfig {
        AvsConfig {
            rounds,
            interval_ms: 1,
            max_step_uv,
        }
    }

    #[test]
    fn test_step_keeps_margins() {
        let mut agent =
            AvsAgent::new(DeviceId::from("cpu0"), adjuster(), fast(1, 5_000)).with_seed(7);
        let current = Voltages::new(900_000, 850_000, 950_000);

        for _ in 0..100 {
            let next = agent.step(current);
            let delta = next.target.as_uv() as i64 - 900_000;
            assert!(delta.abs() <= 5_000);
            assert_eq!(next.target.as_uv() - next.min.as_uv(), 50_000);
            assert_eq!(next.max.as_uv() - next.target.as_uv(), 50_000);
        }
    }

    #[test]
    fn test_oversized_step_is_clamped() {
        let mut agent = AvsAgent::new(DeviceId::from("cpu0"), adjuster(), fast(1, u64::MAX))
            .with_seed(3);
        let current = Voltages::new(900_000, 850_000, 950_000);

        for _ in 0..20 {
            let next = agent.step(current);
            assert!(next.min <= next.target && next.target <= next.max);
        }
    }

    #[test]
    fn test_zero_step_never_changes() {
        let mut agent = AvsAgent::new(DeviceId::from("cpu0"), adjuster(), fast(1, 0));
        let current = Voltages::new(900_000, 850_000, 950_000);
        assert_eq!(agent.step(current), current);
    }

    #[tokio::test]
    async fn test_agent_runs_configured_rounds() {
        let adjuster = adjuster();
        let (_tx, rx) = watch::channel(false);

        let report = AvsAgent::new(DeviceId::from("cpu0"), adjuster.clone(), fast(25, 5_000))
            .with_seed(42)
            .run(rx)
            .await;

        assert_eq!(report.rounds, 25);
        assert_eq!(report.changed + report.unchanged, 25);
        assert_eq!(report.missing, 0);

        let metrics = adjuster.metrics().snapshot();
        assert_eq!(metrics.changed, report.changed);
        assert_eq!(metrics.availability_changes, report.toggles * 2);
    }

    #[tokio::test]
    async fn test_zero_step_reports_unchanged() {
        let adjuster = adjuster();
        let (_tx, rx) = watch::channel(false);

        let report = AvsAgent::new(DeviceId::from("cpu0"), adjuster, fast(5, 0))
            .run(rx)
            .await;

        assert_eq!(report.changed, 0);
        assert_eq!(report.unchanged, 5);
    }

    #[tokio::test]
    async fn test_agent_stops_when_device_missing() {
        let adjuster = adjuster();
        let (_tx, rx) = watch::channel(false);

        let report = AvsAgent::new(DeviceId::from("npu"), adjuster, fast(10, 1_000))
            .run(rx)
            .await;

        assert_eq!(report.rounds, 1);
        assert_eq!(report.changed, 0);
    }

    #[tokio::test]
    async fn test_agent_stops_on_shutdown() {
        let adjuster = adjuster();
        let (tx, rx) = watch::channel(false);
        let config = AvsConfig {
            rounds: 0,
            interval_ms: 5,
            max_step_uv: 1_000,
        };

        let handle = tokio::spawn(AvsAgent::new(DeviceId::from("cpu0"), adjuster, config).run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let report = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("agent did not stop")
            .unwrap();
        assert!(report.rounds >= 1);
    }
}

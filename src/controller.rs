// Polling loop: fetch -> decide -> budget -> reconcile -> persist -> sleep.
// One cycle at a time; shutdown is only observed between cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tracing::{Instrument, info, warn};

use crate::budget;
use crate::config::{AppConfig, ScalingPolicy};
use crate::fleet::{FleetController, FleetReport};
use crate::metrics_repo::MetricsSource;
use crate::models::{GameState, GamesDocument, Observation, PriorState};
use crate::observation_repo::{ObservationRepo, should_persist};
use crate::scaling::{ScalingEngine, TimeBucket};

/// Collaborators the loop drives.
pub struct ControllerDeps {
    pub metrics: Arc<dyn MetricsSource>,
    pub repo: Arc<ObservationRepo>,
    pub fleet: FleetController,
    pub engine: ScalingEngine,
    pub policy: ScalingPolicy,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Stored as every title's developer.
    pub developer: String,
    pub managed_title: String,
    pub hourly_price: f64,
    pub poll_interval: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            developer: config.metrics.filter_value.clone(),
            managed_title: config.fleet.managed_title.clone(),
            hourly_price: config.fleet.hourly_price,
            poll_interval: Duration::from_secs(config.metrics.poll_interval_secs),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub titles: usize,
    pub persisted: bool,
    /// Present when the managed title was reconciled.
    pub fleet: Option<FleetReport>,
}

pub struct Controller {
    metrics: Arc<dyn MetricsSource>,
    repo: Arc<ObservationRepo>,
    fleet: FleetController,
    engine: ScalingEngine,
    policy: ScalingPolicy,
    settings: ControllerSettings,
}

impl Controller {
    pub fn new(deps: ControllerDeps, settings: ControllerSettings) -> Self {
        let ControllerDeps {
            metrics,
            repo,
            fleet,
            engine,
            policy,
        } = deps;
        Self {
            metrics,
            repo,
            fleet,
            engine,
            policy,
            settings,
        }
    }

    /// One full poll. A feed failure skips the cycle; a fleet failure only
    /// affects the managed title's detail.
    pub async fn run_cycle(&mut self, now: DateTime<Local>) -> anyhow::Result<CycleReport> {
        let readings = self.metrics.fetch().await?;
        let previous = self.repo.load().await;
        let prior_by_name = previous.by_name();
        let timestamp = now.with_timezone(&Utc);
        let bucket = TimeBucket::at(&now);

        let mut report = CycleReport::default();
        let mut games = Vec::with_capacity(readings.len());

        for reading in &readings {
            let prior = prior_by_name.get(reading.title.as_str()).copied();
            let observation = Observation::merge(reading, prior, timestamp);
            let config = self.policy.resolve(&observation.title);
            let decision = self
                .engine
                .decide(&observation, config, &PriorState::from(prior), bucket)
                .await;
            let guarded = budget::enforce(
                decision.vm_count,
                self.settings.hourly_price,
                config.max_hourly_budget,
            );

            let mut vm_count = guarded.vm_count;
            let mut vms = Vec::new();
            if observation.title == self.settings.managed_title {
                match self.fleet.reconcile(vm_count, timestamp).await {
                    Ok(fleet) => {
                        vm_count = fleet.vm_count;
                        vms = fleet.vms.clone();
                        report.fleet = Some(fleet);
                    }
                    Err(e) => warn!(
                        title = %observation.title,
                        error = %e,
                        "fleet unavailable; keeping desired count"
                    ),
                }
            }

            let (hourly_cost, daily_cost) = GameState::costs(vm_count, self.settings.hourly_price);
            games.push(GameState {
                name: observation.title,
                developer: self.settings.developer.clone(),
                player_count: observation.player_count,
                expected_players: decision.expected_players,
                deviation: decision.deviation,
                vm_count,
                scaling_strategy: config.strategy,
                vms,
                hourly_cost,
                daily_cost,
                budget_clamped_from: guarded.clamped_from,
                last_updated: timestamp,
            });
        }

        report.titles = games.len();
        if should_persist(&games, &previous.games) {
            match self.repo.save(&GamesDocument::new(games)).await {
                Ok(()) => report.persisted = true,
                Err(e) => warn!(
                    path = %self.repo.path().display(),
                    error = %e,
                    "failed to write games document"
                ),
            }
        }

        let next_poll = now
            + chrono::TimeDelta::from_std(self.settings.poll_interval)
                .unwrap_or_else(|_| chrono::TimeDelta::zero());
        info!(
            titles = report.titles,
            persisted = report.persisted,
            next_poll = %next_poll.format("%Y-%m-%d %H:%M:%S"),
            "cycle complete"
        );
        Ok(report)
    }
}

pub fn spawn(
    mut controller: Controller,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let poll_interval = controller.settings.poll_interval;
    let span = tracing::info_span!("controller", poll_interval_secs = poll_interval.as_secs());
    tokio::spawn(
        async move {
            loop {
                if let Err(e) = controller.run_cycle(Local::now()).await {
                    warn!(error = %e, "cycle skipped");
                }
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Controller shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span),
    )
}

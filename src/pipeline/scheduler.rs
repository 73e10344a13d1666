use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, FixedOffset, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::{BatchSummary, RunResult};

use super::batch::run_sequence;
use super::Orchestrator;

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub interval: Duration,
    /// Days before today that are re-run when still incomplete.
    pub trailing_days: u32,
    pub inter_date_delay: Duration,
    /// Offset of the broadcast's local calendar.
    pub utc_offset: FixedOffset,
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    settings: ScheduleSettings,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, settings: ScheduleSettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.settings.utc_offset).date_naive()
    }

    /// One scheduling pass: today unconditionally, then the trailing window newest first.
    pub async fn tick(&self, today: NaiveDate) -> Vec<RunResult> {
        let trailing = (1..=self.settings.trailing_days)
            .filter_map(|back| today.checked_sub_days(Days::new(back.into())))
            .map(|date| (date, true));
        let dates = std::iter::once((today, false)).chain(trailing);
        run_sequence(&self.orchestrator, dates, self.settings.inter_date_delay).await
    }

    /// Runs a pass immediately and then once per interval until shut down. A pass that overruns
    /// the interval delays the next one instead of triggering a burst.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = self.settings.interval.as_secs(),
                trailing_days = self.settings.trailing_days,
                "scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                let today = self.today();
                let results = self.tick(today).await;
                let summary = BatchSummary::from_results(&results);
                tracing::info!(%today, %summary, "scheduled pass finished");

                if *shutdown_rx.borrow() {
                    break;
                }
            }
            tracing::info!("scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops scheduling new passes and waits for the one in flight to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "scheduler task ended abnormally");
        }
    }
}

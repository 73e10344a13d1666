use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{BatchSummary, RunResult};

use super::Orchestrator;

/// Runs `dates` strictly one after another. Dates flagged `skip_complete` are skipped when already
/// fully stored; `delay` separates consecutive runs that actually touched the network.
pub(crate) async fn run_sequence<I>(
    orchestrator: &Orchestrator,
    dates: I,
    delay: Duration,
) -> Vec<RunResult>
where
    I: IntoIterator<Item = (NaiveDate, bool)>,
{
    let mut results = Vec::new();
    let mut ran_before = false;
    for (date, skip_complete) in dates {
        if skip_complete && orchestrator.is_complete(date).await {
            tracing::info!(%date, "already complete, skipping");
            results.push(RunResult::skipped(date));
            continue;
        }
        if ran_before {
            tokio::time::sleep(delay).await;
        }
        results.push(orchestrator.run(date).await);
        ran_before = true;
    }
    results
}

pub struct BatchController {
    orchestrator: Arc<Orchestrator>,
}

impl BatchController {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Processes every date in `start..=end` in ascending order, skipping complete ones.
    pub async fn run_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        inter_date_delay: Duration,
    ) -> Result<Vec<RunResult>> {
        if start > end {
            return Err(AppError::Precondition(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let days = (end - start).num_days() + 1;
        tracing::info!(%start, %end, days, "starting batch");

        let dates = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| (date, true));
        let results = run_sequence(&self.orchestrator, dates, inter_date_delay).await;

        let summary = BatchSummary::from_results(&results);
        tracing::info!(%start, %end, %summary, "batch finished");
        Ok(results)
    }
}

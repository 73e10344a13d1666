use std::path::Path;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::RunResult;
use crate::pipeline::{BatchController, Orchestrator, Scheduler, SchedulerHandle};
use crate::scrape::PageFetcher;

pub struct App {
    config: Config,
    pub repository: Repository,
    orchestrator: Arc<Orchestrator>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repository = Repository::new(&config.db_path).await?;
        let fetcher = PageFetcher::new(&config.fetch_settings())?;
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(fetcher),
            repository.clone(),
            config.run_settings(),
        ));

        Ok(Self {
            config,
            repository,
            orchestrator,
        })
    }

    /// Today on the broadcast's calendar.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.utc_offset()).date_naive()
    }

    pub async fn run_date(&self, date: NaiveDate, force: bool) -> RunResult {
        if force {
            self.orchestrator.run(date).await
        } else {
            self.orchestrator.run_if_incomplete(date).await
        }
    }

    /// Backfills `start..=end`, defaulting to the configured start date through yesterday.
    pub async fn run_batch(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RunResult>> {
        let start = start.unwrap_or(self.config.batch.default_start_date);
        let end = end.unwrap_or_else(|| {
            let today = self.today();
            today.checked_sub_days(Days::new(1)).unwrap_or(today)
        });
        BatchController::new(Arc::clone(&self.orchestrator))
            .run_range(start, end, self.config.inter_date_delay())
            .await
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(Arc::clone(&self.orchestrator), self.config.schedule_settings()).start()
    }
}

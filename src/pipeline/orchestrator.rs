use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};

use crate::db::{Repository, StoreConflict};
use crate::models::{ItemFailure, NewsItem, RunResult, RunStatus};
use crate::scrape::{
    extract_detail, extract_listing, FetchFailure, Listing, ListingEntry, PageSource, RawPage,
};

use super::locks::DateLocks;

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Listing URL templates, `{date}` expands to `YYYYMMDD`. Tried in order.
    pub listing_urls: Vec<String>,
    pub detail_workers: usize,
    pub request_delay: Duration,
}

impl RunSettings {
    pub fn listing_urls_for(&self, date: NaiveDate) -> Vec<String> {
        let stamp = date.format("%Y%m%d").to_string();
        self.listing_urls
            .iter()
            .map(|template| template.replace("{date}", &stamp))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pending,
    Fetching,
    Extracting,
    Storing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct DateRun {
    date: NaiveDate,
    stage: Stage,
}

impl DateRun {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            stage: Stage::Pending,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(date = %self.date, from = %self.stage, to = %next, "date run stage");
        self.stage = next;
    }

    fn fail(&self, status: RunStatus, reason: String) -> RunResult {
        tracing::error!(date = %self.date, stage = %self.stage, %status, %reason, "date run failed");
        RunResult::terminal(self.date, status, Some(reason))
    }
}

/// Fetch, extract and store one date. Never returns an error: every failure ends up in the
/// `RunResult` so callers can retry the date on their own cadence.
pub struct Orchestrator {
    source: Arc<dyn PageSource>,
    repository: Repository,
    settings: RunSettings,
    locks: DateLocks,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn PageSource>, repository: Repository, settings: RunSettings) -> Self {
        Self {
            source,
            repository,
            settings,
            locks: DateLocks::new(),
        }
    }

    pub async fn run(&self, date: NaiveDate) -> RunResult {
        let _guard = self.locks.lock(date).await;
        let result = self.run_locked(date).await;
        tracing::info!(
            %date,
            status = %result.status,
            stored = result.stored_count,
            failed = result.failed_count,
            "date run finished"
        );
        result
    }

    /// Whether `date` is already fully stored. Lookup errors count as incomplete.
    pub async fn is_complete(&self, date: NaiveDate) -> bool {
        match self.repository.has_complete_date(date).await {
            Ok(complete) => complete,
            Err(e) => {
                tracing::warn!(%date, error = %e, "completeness check failed, treating as incomplete");
                false
            }
        }
    }

    pub async fn run_if_incomplete(&self, date: NaiveDate) -> RunResult {
        if self.is_complete(date).await {
            tracing::info!(%date, "already complete, skipping");
            return RunResult::skipped(date);
        }
        self.run(date).await
    }

    async fn run_locked(&self, date: NaiveDate) -> RunResult {
        let mut run = DateRun::new(date);

        run.advance(Stage::Fetching);
        let page = match self.fetch_listing(date).await {
            Ok(page) => page,
            Err(failure) => return run.fail(RunStatus::FailedFetch, failure.to_string()),
        };

        run.advance(Stage::Extracting);
        let listing = match extract_listing(&page) {
            Ok(listing) => listing,
            Err(e) => return run.fail(RunStatus::FailedExtract, e.to_string()),
        };
        if listing.is_empty() {
            tracing::info!(%date, url = %page.url, "listing has no items");
            run.advance(Stage::Done);
            return RunResult::from_items(date, 0, Vec::new());
        }

        run.advance(Stage::Storing);
        if let Err(reason) = self.check_stored_total(date, &listing).await {
            return run.fail(RunStatus::FailedStore, reason);
        }

        let mut failures: Vec<ItemFailure> = listing
            .rejected
            .iter()
            .map(|rejected| ItemFailure {
                link: rejected.link.clone(),
                reason: rejected.error.to_string(),
            })
            .collect();

        let outcomes: Vec<_> = stream::iter(listing.entries)
            .map(|entry| self.process_entry(date, entry))
            .buffer_unordered(self.settings.detail_workers.max(1))
            .collect()
            .await;

        let mut stored = 0;
        for outcome in outcomes {
            match outcome {
                Ok(_) => stored += 1,
                Err(failure) => failures.push(failure),
            }
        }

        run.advance(Stage::Done);
        RunResult::from_items(date, stored, failures)
    }

    async fn fetch_listing(&self, date: NaiveDate) -> Result<RawPage, FetchFailure> {
        let mut last_failure = None;
        for (i, url) in self.settings.listing_urls_for(date).into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            match self.source.fetch(&url).await {
                Ok(page) => return Ok(page),
                Err(failure) => {
                    tracing::warn!(%date, %failure, "listing URL failed");
                    last_failure = Some(failure);
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| FetchFailure {
            url: String::new(),
            reason: "no listing URL configured".to_string(),
            attempts: 0,
        }))
    }

    /// A listing whose total disagrees with what is already stored for the day cannot be merged.
    async fn check_stored_total(&self, date: NaiveDate, listing: &Listing) -> Result<(), String> {
        let Some(incoming) = listing.total() else {
            return Ok(());
        };
        match self.repository.stored_total(date).await {
            Ok(Some(stored)) if stored != incoming => Err(StoreConflict::TotalMismatch {
                date,
                stored,
                incoming,
            }
            .to_string()),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn process_entry(
        &self,
        date: NaiveDate,
        entry: ListingEntry,
    ) -> Result<NewsItem, ItemFailure> {
        let link = entry.link.clone();
        let fail = |reason: String| {
            tracing::warn!(%date, link = %link, %reason, "item failed");
            ItemFailure {
                link: link.clone(),
                reason,
            }
        };

        let fetched = self.source.fetch(&entry.link).await;
        tokio::time::sleep(self.settings.request_delay).await;
        let page = fetched.map_err(|e| fail(e.to_string()))?;

        let content = extract_detail(&page).map_err(|e| fail(e.to_string()))?;
        let stored = self
            .repository
            .upsert(entry.into_item(date, Some(content)))
            .await
            .map_err(|e| fail(e.to_string()))?;

        tracing::debug!(%date, id = stored.id, ordinal = %stored.ordinal, "stored item");
        Ok(stored)
    }
}

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Success,
    PartialSuccess,
    /// The listing container was present but held no items.
    NoItems,
    /// Every attempted item failed.
    Failed,
    FailedFetch,
    FailedExtract,
    FailedStore,
    Skipped,
}

impl RunStatus {
    /// Whether the date should be attempted again by a later batch or tick.
    pub fn needs_retry(self) -> bool {
        !matches!(self, RunStatus::Success | RunStatus::NoItems | RunStatus::Skipped)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::PartialSuccess => "partial",
            RunStatus::NoItems => "no-items",
            RunStatus::Failed => "failed",
            RunStatus::FailedFetch => "failed-fetch",
            RunStatus::FailedExtract => "failed-extract",
            RunStatus::FailedStore => "failed-store",
            RunStatus::Skipped => "skipped",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub link: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub date: NaiveDate,
    pub stored_count: usize,
    pub failed_count: usize,
    pub status: RunStatus,
    /// Per-item failures; always `failed_count` long.
    pub failures: Vec<ItemFailure>,
    /// Why the run stopped before attempting items, for the listing-level failure statuses.
    pub reason: Option<String>,
}

impl RunResult {
    pub fn skipped(date: NaiveDate) -> Self {
        Self::terminal(date, RunStatus::Skipped, None)
    }

    /// A run that ended before any item was attempted.
    pub fn terminal(date: NaiveDate, status: RunStatus, reason: Option<String>) -> Self {
        Self {
            date,
            stored_count: 0,
            failed_count: 0,
            status,
            failures: Vec::new(),
            reason,
        }
    }

    pub fn from_items(date: NaiveDate, stored_count: usize, failures: Vec<ItemFailure>) -> Self {
        let failed_count = failures.len();
        let status = match (stored_count, failed_count) {
            (0, 0) => RunStatus::NoItems,
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Failed,
            _ => RunStatus::PartialSuccess,
        };
        Self {
            date,
            stored_count,
            failed_count,
            status,
            failures,
            reason: None,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<14} stored={} failed={}",
            self.date, self.status, self.stored_count, self.failed_count
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Totals over a batch of per-date results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_days: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[RunResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.total_days += 1;
            match r.status {
                RunStatus::Skipped => acc.skipped += 1,
                status if status.needs_retry() => acc.failed += 1,
                _ => acc.succeeded += 1,
            }
            acc
        })
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_days == 0 {
            return 0.0;
        }
        (self.succeeded + self.skipped) as f64 / self.total_days as f64 * 100.0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "days={} succeeded={} failed={} skipped={} success_rate={:.2}%",
            self.total_days,
            self.succeeded,
            self.failed,
            self.skipped,
            self.success_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
    }

    fn failure(link: &str) -> ItemFailure {
        ItemFailure {
            link: link.to_string(),
            reason: "boom".to_string(),
        }
    }

    #[test]
    fn status_follows_item_counts() {
        assert_eq!(RunResult::from_items(date(), 3, vec![]).status, RunStatus::Success);
        assert_eq!(
            RunResult::from_items(date(), 2, vec![failure("b")]).status,
            RunStatus::PartialSuccess
        );
        assert_eq!(
            RunResult::from_items(date(), 0, vec![failure("a")]).status,
            RunStatus::Failed
        );
        assert_eq!(RunResult::from_items(date(), 0, vec![]).status, RunStatus::NoItems);
    }

    #[test]
    fn failures_always_match_failed_count() {
        let results = [
            RunResult::terminal(date(), RunStatus::FailedExtract, Some("no container".into())),
            RunResult::from_items(date(), 1, vec![failure("a"), failure("b")]),
            RunResult::skipped(date()),
        ];
        for result in &results {
            assert_eq!(result.failures.len(), result.failed_count);
        }
        assert_eq!(results[0].reason.as_deref(), Some("no container"));
        assert!(results[1].reason.is_none());
    }

    #[test]
    fn display_includes_listing_reason() {
        let result = RunResult::terminal(date(), RunStatus::FailedFetch, Some("timed out".into()));
        assert_eq!(
            result.to_string(),
            "2022-01-01 failed-fetch   stored=0 failed=0 (timed out)"
        );
    }

    #[test]
    fn summary_counts_skips_as_done() {
        let results = vec![
            RunResult::from_items(date(), 3, vec![]),
            RunResult::skipped(date()),
            RunResult::terminal(date(), RunStatus::FailedFetch, Some("timeout".into())),
            RunResult::from_items(date(), 1, vec![failure("x")]),
        ];
        let summary = BatchSummary::from_results(&results);
        assert_eq!(
            summary,
            BatchSummary {
                total_days: 4,
                succeeded: 1,
                failed: 2,
                skipped: 1,
            }
        );
        assert!((summary.success_rate() - 50.0).abs() < f64::EPSILON);
    }
}

mod news_item;
mod run;

pub use news_item::{NewNewsItem, NewsItem, Ordinal};
pub use run::{BatchSummary, ItemFailure, RunResult, RunStatus};

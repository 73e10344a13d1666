use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::db::Repository;
use crate::scrape::fake::FakeSource;

use super::RunSettings;

pub const LISTING_TEMPLATE: &str = "https://news.test/day/{date}.shtml";

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
}

pub fn listing_url(date: NaiveDate) -> String {
    LISTING_TEMPLATE.replace("{date}", &date.format("%Y%m%d").to_string())
}

pub fn detail_url(date: NaiveDate, n: u32) -> String {
    format!("https://news.test/{}/item{n}.shtml", date.format("%Y%m%d"))
}

pub fn listing_html(date: NaiveDate, total: u32) -> String {
    let items: String = (1..=total)
        .map(|n| {
            format!(
                r#"<li data-ordinal="{n}/{total}"><a href="{}">Item {n}</a></li>"#,
                detail_url(date, n)
            )
        })
        .collect();
    format!(r#"<html><body><ul class="rililist">{items}</ul></body></html>"#)
}

pub fn detail_html(date: NaiveDate, n: u32) -> String {
    format!(r#"<div class="cnt_bd"><p>Body of item {n} for {date}.</p></div>"#)
}

/// Registers a listing and every detail page for `date`.
pub fn with_day(source: FakeSource, date: NaiveDate, total: u32) -> FakeSource {
    let source = source.page(&listing_url(date), &listing_html(date, total));
    (1..=total).fold(source, |source, n| {
        source.page(&detail_url(date, n), &detail_html(date, n))
    })
}

pub fn settings() -> RunSettings {
    RunSettings {
        listing_urls: vec![LISTING_TEMPLATE.to_string()],
        detail_workers: 2,
        request_delay: Duration::ZERO,
    }
}

pub async fn repository() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("news.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, repo)
}

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{NewNewsItem, NewsItem, Ordinal};

use super::schema::SCHEMA;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ITEM_COLUMNS: &str =
    "id, date, title, link, position, total_items, content, created_at, updated_at";

/// A write that would break a stored invariant. Only maintenance (`purge`) resolves these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreConflict {
    #[error("{link} is already stored under {stored}, refusing to move it to {incoming}")]
    DateChanged {
        link: String,
        stored: NaiveDate,
        incoming: NaiveDate,
    },
    #[error("{date} already holds items out of {stored}, incoming item claims {incoming}")]
    TotalMismatch {
        date: NaiveDate,
        stored: u32,
        incoming: u32,
    },
}

/// SQLite-backed store of news items. Cloning shares the same connection.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Inserts by `link`, or updates title/ordinal of the existing row. Stored content is only
    /// replaced by non-empty content. Runs in one transaction, so concurrent upserts of the same
    /// link serialize on the connection.
    pub async fn upsert(&self, item: NewNewsItem) -> Result<NewsItem> {
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let date = format_date(item.date);

                let stored_date: Option<String> = tx
                    .query_row(
                        "SELECT date FROM news_items WHERE link = ?1",
                        params![item.link],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(stored) = stored_date.filter(|stored| *stored != date) {
                    return Ok(Err(StoreConflict::DateChanged {
                        link: item.link,
                        stored: parse_date(&stored).unwrap_or(item.date),
                        incoming: item.date,
                    }));
                }

                let other_total: Option<u32> = tx
                    .query_row(
                        "SELECT total_items FROM news_items
                         WHERE date = ?1 AND link <> ?2 AND total_items <> ?3
                         LIMIT 1",
                        params![date, item.link, item.ordinal.total],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(stored) = other_total {
                    return Ok(Err(StoreConflict::TotalMismatch {
                        date: item.date,
                        stored,
                        incoming: item.ordinal.total,
                    }));
                }

                let content = item.content.filter(|c| !c.is_empty());
                tx.execute(
                    r#"INSERT INTO news_items (date, title, link, position, total_items, content)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(link) DO UPDATE SET
                           title = excluded.title,
                           position = excluded.position,
                           total_items = excluded.total_items,
                           content = COALESCE(NULLIF(excluded.content, ''), news_items.content),
                           updated_at = datetime('now')"#,
                    params![
                        date,
                        item.title,
                        item.link,
                        item.ordinal.position,
                        item.ordinal.total,
                        content,
                    ],
                )?;

                let stored = tx.query_row(
                    &format!("SELECT {ITEM_COLUMNS} FROM news_items WHERE link = ?1"),
                    params![item.link],
                    item_from_row,
                )?;
                tx.commit()?;
                Ok(Ok(stored))
            })
            .await?;

        Ok(outcome?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<NewsItem>> {
        let item = self
            .conn
            .call(move |conn| {
                let item = conn
                    .query_row(
                        &format!("SELECT {ITEM_COLUMNS} FROM news_items WHERE id = ?1"),
                        params![id],
                        item_from_row,
                    )
                    .optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<NewsItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM news_items WHERE date = ?1 ORDER BY position, id"
                ))?;
                let items = stmt
                    .query_map(params![format_date(date)], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// True when the rows for `date` all agree on a total and there are exactly that many.
    pub async fn has_complete_date(&self, date: NaiveDate) -> Result<bool> {
        let complete = self
            .conn
            .call(move |conn| {
                let (count, min_total, max_total): (i64, Option<i64>, Option<i64>) = conn
                    .query_row(
                        "SELECT COUNT(*), MIN(total_items), MAX(total_items)
                         FROM news_items WHERE date = ?1",
                        params![format_date(date)],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )?;
                Ok(match (min_total, max_total) {
                    (Some(min), Some(max)) => min == max && count == min,
                    _ => false,
                })
            })
            .await?;
        Ok(complete)
    }

    /// The day's total already agreed on by stored rows, if any are stored.
    pub async fn stored_total(&self, date: NaiveDate) -> Result<Option<u32>> {
        let total = self
            .conn
            .call(move |conn| {
                let total = conn
                    .query_row(
                        "SELECT total_items FROM news_items WHERE date = ?1 LIMIT 1",
                        params![format_date(date)],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(total)
            })
            .await?;
        Ok(total)
    }

    /// Maintenance only: removes every row for `date` so it can be fetched again from scratch.
    pub async fn delete_date(&self, date: NaiveDate) -> Result<usize> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM news_items WHERE date = ?1",
                    params![format_date(date)],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // SQLite datetime('now') format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn item_from_row(row: &Row) -> rusqlite::Result<NewsItem> {
    let raw_date: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(NewsItem {
        id: row.get(0)?,
        date,
        title: row.get(2)?,
        link: row.get(3)?,
        ordinal: Ordinal {
            position: row.get(4)?,
            total: row.get(5)?,
        },
        content: row.get(6)?,
        created_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

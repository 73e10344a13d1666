use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::scrape::ExtractionError;

/// Position of an item within its day's broadcast, parsed from the source's `k/N` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ordinal {
    pub position: u32,
    pub total: u32,
}

impl Ordinal {
    pub fn new(position: u32, total: u32) -> Option<Self> {
        (position >= 1 && position <= total).then_some(Self { position, total })
    }
}

impl FromStr for Ordinal {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ExtractionError::MalformedOrdinal(s.to_string());

        let (position, total) = s.trim().split_once('/').ok_or_else(malformed)?;
        let position: u32 = position.trim().parse().map_err(|_| malformed())?;
        let total: u32 = total.trim().parse().map_err(|_| malformed())?;

        Ordinal::new(position, total).ok_or_else(malformed)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.position, self.total)
    }
}

/// An item ready to be written. `content` is `None` for listing-only rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsItem {
    pub date: NaiveDate,
    pub title: String,
    pub link: String,
    pub ordinal: Ordinal,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub link: String,
    pub ordinal: Ordinal,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewsItem {
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_composite_ordinal() {
        let ordinal: Ordinal = "3/10".parse().unwrap();
        assert_eq!(ordinal, Ordinal { position: 3, total: 10 });
        assert_eq!(ordinal.to_string(), "3/10");
    }

    #[test]
    fn tolerates_whitespace_around_parts() {
        let ordinal: Ordinal = " 2 / 7 ".parse().unwrap();
        assert_eq!(ordinal, Ordinal { position: 2, total: 7 });
    }

    #[test]
    fn rejects_malformed_ordinals() {
        for raw in ["", "3", "a/b", "0/3", "4/3", "1/0", "-1/3", "1/3/5"] {
            let err = raw.parse::<Ordinal>().unwrap_err();
            assert!(
                matches!(err, ExtractionError::MalformedOrdinal(ref s) if s == raw),
                "expected MalformedOrdinal for {raw:?}, got {err:?}"
            );
        }
    }
}

pub const SCHEMA: &str = r#"
-- one row per broadcast segment; link is the dedup key
CREATE TABLE IF NOT EXISTS news_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    position INTEGER NOT NULL CHECK (position >= 1),
    total_items INTEGER NOT NULL CHECK (position <= total_items),
    content TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_news_items_date ON news_items(date, position);
"#;

//! SQLite schema.

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS catalogues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    currency TEXT NOT NULL DEFAULT '',
    theme TEXT NOT NULL DEFAULT '',
    subtitle TEXT NOT NULL DEFAULT '',
    services_json TEXT NOT NULL,
    created_by TEXT NOT NULL,
    source TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_catalogues_created_by ON catalogues(created_by);

CREATE TABLE IF NOT EXISTS usage_events (
    id TEXT PRIMARY KEY,
    created_by TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_events_by_kind ON usage_events(created_by, kind);
";

//! SQLite-backed catalogue store.
//!
//! One connection behind a mutex, WAL journal, cached statements. Catalogue
//! services are stored as a JSON column; the row is the unit of write.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use quicktalog_core::{Error, Result};

use crate::schema::SCHEMA_SQL;
use crate::slug::new_slug;
use crate::types::{CatalogueRecord, NewCatalogue, StoreStats, UsageKind};

pub struct CatalogueStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl CatalogueStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be
    /// `db_dir/quicktalog.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("quicktalog.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.stats()?;
        info!(
            "CatalogueStore initialized: {} catalogues, {} usage events, path={}",
            stats.catalogues,
            stats.usage_events,
            store.db_path.display()
        );

        Ok(store)
    }

    /// Insert a finished catalogue as a single write. Returns the stored row
    /// including its assigned slug.
    pub fn insert_catalogue(&self, new: NewCatalogue) -> Result<CatalogueRecord> {
        let slug = new_slug(&new.name);
        let services_json = serde_json::to_string(&new.services)?;
        let created_at = chrono::Utc::now().timestamp_millis();

        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO catalogues
                 (slug, name, title, currency, theme, subtitle, services_json, created_by, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![
                slug,
                new.name,
                new.title,
                new.currency,
                new.theme,
                new.subtitle,
                services_json,
                new.created_by,
                new.source,
                created_at,
            ])
            .map_err(|e| Error::Database(format!("Failed to insert catalogue: {}", e)))?;

        Ok(CatalogueRecord {
            id,
            slug,
            name: new.name,
            title: new.title,
            currency: new.currency,
            theme: new.theme,
            subtitle: new.subtitle,
            services: new.services,
            created_by: new.created_by,
            source: new.source,
            created_at,
        })
    }

    /// Fetch a catalogue by slug.
    pub fn get_catalogue(&self, slug: &str) -> Result<Option<CatalogueRecord>> {
        let conn = self.conn.lock();
        let result = conn
            .prepare_cached("SELECT * FROM catalogues WHERE slug = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![slug], Self::row_to_record)
            .optional()
            .map_err(|e| Error::Database(e.to_string()));
        result
    }

    /// Record one usage event. Independent of the catalogue insert; the
    /// caller decides how to report a failure here.
    pub fn record_usage(&self, created_by: &str, kind: UsageKind) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp_millis();

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO usage_events (id, created_by, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![id, created_by, kind.as_str(), created_at])
        .map_err(|e| Error::Database(format!("Failed to record usage: {}", e)))?;
        Ok(())
    }

    /// Count usage events of one kind for one user.
    pub fn count_usage(&self, created_by: &str, kind: UsageKind) -> Result<i64> {
        let conn = self.conn.lock();
        let result = conn
            .prepare_cached(
                "SELECT COUNT(*) FROM usage_events WHERE created_by = ?1 AND kind = ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![created_by, kind.as_str()], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()));
        result
    }

    /// Operational counters for the stats route.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let catalogues: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM catalogues")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row([], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        let usage_events: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM usage_events")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row([], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        let db_size_mb = std::fs::metadata(&self.db_path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        Ok(StoreStats {
            catalogues,
            usage_events,
            db_size_mb,
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogueRecord> {
        let services_json: String = row.get("services_json")?;
        let services = serde_json::from_str(&services_json)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(CatalogueRecord {
            id: row.get("id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            title: row.get("title")?,
            currency: row.get("currency")?,
            theme: row.get("theme")?,
            subtitle: row.get("subtitle")?,
            services,
            created_by: row.get("created_by")?,
            source: row.get("source")?,
            created_at: row.get("created_at")?,
        })
    }
}

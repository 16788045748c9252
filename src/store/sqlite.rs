//! Widget persistence using SQLite.
//!
//! One row per widget instance. The `last_update` column is the last-good text
//! cache; it is written only through [`LastGoodCache::update_last_good`] and is
//! carried across re-configuration.

use super::{LastGoodCache, WidgetStore};
use crate::widget::WidgetConfig;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed widget store.
///
/// # Schema
/// ```sql
/// CREATE TABLE widgets (
///     id                  INTEGER PRIMARY KEY,  -- host instance ID
///     entity_id           TEXT NOT NULL,
///     attribute_keys_json TEXT NOT NULL,        -- JSON array of keys
///     label               TEXT,
///     text_size_sp        REAL NOT NULL,
///     state_separator     TEXT NOT NULL,
///     attribute_separator TEXT NOT NULL,
///     last_update         TEXT NOT NULL,        -- last-good text ('' = never resolved)
///     updated_at          TEXT NOT NULL         -- ISO 8601 timestamp
/// );
/// ```
///
/// # Thread Safety
/// Connection is wrapped in a Mutex; each call holds it for one statement
/// (or one transaction for batch deletes).
pub struct SqliteWidgetStore {
    conn: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "SELECT id, entity_id, attribute_keys_json, label, text_size_sp, \
     state_separator, attribute_separator FROM widgets";

impl SqliteWidgetStore {
    /// Opens (or creates) the SQLite database and ensures the table exists.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open widget DB at {}", db_path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS widgets (
                id                  INTEGER PRIMARY KEY,
                entity_id           TEXT NOT NULL,
                attribute_keys_json TEXT NOT NULL,
                label               TEXT,
                text_size_sp        REAL NOT NULL,
                state_separator     TEXT NOT NULL,
                attribute_separator TEXT NOT NULL,
                last_update         TEXT NOT NULL DEFAULT '',
                updated_at          TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_widgets_entity ON widgets(entity_id);",
        )
        .context("Failed to create widgets table")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Widget store connection mutex poisoned"))
    }
}

impl WidgetStore for SqliteWidgetStore {
    fn get(&self, instance_id: i64) -> Result<Option<WidgetConfig>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .context("Failed to prepare widget query")?;
        let mut rows = stmt
            .query(params![instance_id])
            .context("Failed to execute widget query")?;

        let config = match rows.next().context("Failed to read widget row")? {
            Some(row) => Some(row_to_config(row).context("Failed to decode widget row")?),
            None => None,
        };
        Ok(config)
    }

    fn get_all(&self) -> Result<Vec<WidgetConfig>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))
            .context("Failed to prepare get_all query")?;
        let configs = stmt
            .query_map([], row_to_config)
            .context("Failed to query widgets")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read widget rows")?;
        Ok(configs)
    }

    fn save(&self, config: &WidgetConfig) -> Result<()> {
        let keys_json = serde_json::to_string(&config.attribute_keys)
            .context("Failed to serialize attribute keys")?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO widgets (
                id, entity_id, attribute_keys_json, label, text_size_sp,
                state_separator, attribute_separator, last_update, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '', ?8)
            ON CONFLICT(id) DO UPDATE SET
                entity_id = excluded.entity_id,
                attribute_keys_json = excluded.attribute_keys_json,
                label = excluded.label,
                text_size_sp = excluded.text_size_sp,
                state_separator = excluded.state_separator,
                attribute_separator = excluded.attribute_separator,
                updated_at = excluded.updated_at
            "#,
            params![
                config.instance_id,
                config.entity_id,
                keys_json,
                config.label,
                config.text_size_sp as f64,
                config.state_separator,
                config.attribute_separator,
                now,
            ],
        )
        .context("Failed to save widget config")?;
        Ok(())
    }

    fn delete(&self, instance_ids: &[i64]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("Failed to begin delete transaction")?;

        let mut removed = 0;
        for id in instance_ids {
            removed += tx
                .execute("DELETE FROM widgets WHERE id = ?1", params![id])
                .context("Failed to delete widget")?;
        }

        tx.commit().context("Failed to commit widget deletion")?;
        Ok(removed)
    }
}

impl LastGoodCache for SqliteWidgetStore {
    fn get_last_good(&self, instance_id: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT last_update FROM widgets WHERE id = ?1")
            .context("Failed to prepare last_update query")?;
        let mut rows = stmt
            .query(params![instance_id])
            .context("Failed to execute last_update query")?;

        let text: Option<String> = match rows.next().context("Failed to read last_update row")? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(text.filter(|t| !t.is_empty()))
    }

    /// No-op for unknown instances (e.g. a refresh that outlived deletion).
    fn update_last_good(&self, instance_id: i64, text: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE widgets SET last_update = ?2, updated_at = ?3 WHERE id = ?1",
            params![instance_id, text, Utc::now().to_rfc3339()],
        )
        .context("Failed to update last_update")?;
        Ok(())
    }
}

fn row_to_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<WidgetConfig> {
    let keys_json: String = row.get(2)?;
    let attribute_keys: Vec<String> = serde_json::from_str(&keys_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let text_size_sp: f64 = row.get(4)?;

    Ok(WidgetConfig {
        instance_id: row.get(0)?,
        entity_id: row.get(1)?,
        attribute_keys,
        label: row.get(3)?,
        text_size_sp: text_size_sp as f32,
        state_separator: row.get(5)?,
        attribute_separator: row.get(6)?,
    })
}

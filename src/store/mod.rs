//! Widget configuration and last-good text storage.
//!
//! Two adapters implement both traits:
//! - [`SqliteWidgetStore`] persists to SQLite and survives restarts
//! - [`MemoryWidgetStore`] keeps everything in a `DashMap` (tests, ephemeral hosts)
//!
//! Both are constructed once at startup and injected as `Arc<dyn ...>` into the
//! resolver and the widget host.

use crate::widget::WidgetConfig;
use anyhow::Result;

mod memory;
mod sqlite;

pub use memory::MemoryWidgetStore;
pub use sqlite::SqliteWidgetStore;

/// Per-instance widget configuration records.
pub trait WidgetStore: Send + Sync {
    /// Returns the config for an instance, or `None` if it is not configured.
    fn get(&self, instance_id: i64) -> Result<Option<WidgetConfig>>;

    /// Returns every configured instance.
    fn get_all(&self) -> Result<Vec<WidgetConfig>>;

    /// Inserts or replaces the config for `config.instance_id`.
    ///
    /// Replacing an existing instance keeps its last-good text.
    fn save(&self, config: &WidgetConfig) -> Result<()>;

    /// Removes the given instances along with their last-good text.
    /// Returns how many instances existed.
    fn delete(&self, instance_ids: &[i64]) -> Result<usize>;
}

/// Durable last-known-good text, keyed by instance ID.
///
/// Values are only ever overwritten, never cleared (except by instance deletion).
pub trait LastGoodCache: Send + Sync {
    /// Returns the last resolved text, or `None` if the instance never resolved.
    fn get_last_good(&self, instance_id: i64) -> Result<Option<String>>;

    /// Overwrites the last resolved text for an instance.
    fn update_last_good(&self, instance_id: i64, text: &str) -> Result<()>;
}

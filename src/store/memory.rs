use super::{LastGoodCache, WidgetStore};
use crate::widget::WidgetConfig;
use anyhow::Result;
use dashmap::DashMap;

/// In-memory widget store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryWidgetStore {
    /// instance_id -> config
    configs: DashMap<i64, WidgetConfig>,
    /// instance_id -> last-good text
    last_good: DashMap<i64, String>,
}

impl MemoryWidgetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WidgetStore for MemoryWidgetStore {
    fn get(&self, instance_id: i64) -> Result<Option<WidgetConfig>> {
        Ok(self.configs.get(&instance_id).map(|c| c.clone()))
    }

    fn get_all(&self) -> Result<Vec<WidgetConfig>> {
        Ok(self.configs.iter().map(|c| c.value().clone()).collect())
    }

    fn save(&self, config: &WidgetConfig) -> Result<()> {
        self.configs.insert(config.instance_id, config.clone());
        Ok(())
    }

    fn delete(&self, instance_ids: &[i64]) -> Result<usize> {
        let mut removed = 0;
        for id in instance_ids {
            if self.configs.remove(id).is_some() {
                removed += 1;
            }
            self.last_good.remove(id);
        }
        Ok(removed)
    }
}

impl LastGoodCache for MemoryWidgetStore {
    fn get_last_good(&self, instance_id: i64) -> Result<Option<String>> {
        Ok(self
            .last_good
            .get(&instance_id)
            .map(|t| t.clone())
            .filter(|t| !t.is_empty()))
    }

    /// No-op for unknown instances (e.g. a refresh that outlived deletion).
    fn update_last_good(&self, instance_id: i64, text: &str) -> Result<()> {
        if self.configs.contains_key(&instance_id) {
            self.last_good.insert(instance_id, text.to_string());
        }
        Ok(())
    }
}

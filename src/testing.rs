// Test doubles shared by unit tests

use crate::client::EntityClient;
use crate::entity::EntitySnapshot;
use crate::store::LastGoodCache;
use crate::widget::WidgetConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Entity client backed by a map; can be switched offline.
#[derive(Default)]
pub struct FakeEntityClient {
    entities: DashMap<String, EntitySnapshot>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeEntityClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(self, snapshot: EntitySnapshot) -> Self {
        self.insert(snapshot);
        self
    }

    pub fn insert(&self, snapshot: EntitySnapshot) {
        self.entities.insert(snapshot.entity_id.clone(), snapshot);
    }

    /// Register a snapshot under a key other than its own entity ID
    pub fn insert_as(&self, entity_id: &str, snapshot: EntitySnapshot) {
        self.entities.insert(entity_id.to_string(), snapshot);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityClient for FakeEntityClient {
    async fn get_entity(&self, entity_id: &str) -> Result<EntitySnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        self.entities
            .get(entity_id)
            .map(|e| e.clone())
            .ok_or_else(|| anyhow!("Entity not found: {}", entity_id))
    }
}

/// Cache that records every write and can be made to fail.
#[derive(Default)]
pub struct RecordingCache {
    values: DashMap<i64, String>,
    writes: Mutex<Vec<(i64, String)>>,
    failing: AtomicBool,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(instance_id: i64, text: &str) -> Self {
        let cache = Self::default();
        cache.values.insert(instance_id, text.to_string());
        cache
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(i64, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl LastGoodCache for RecordingCache {
    fn get_last_good(&self, instance_id: i64) -> Result<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("disk I/O error"));
        }
        Ok(self
            .values
            .get(&instance_id)
            .map(|v| v.clone())
            .filter(|v| !v.is_empty()))
    }

    fn update_last_good(&self, instance_id: i64, text: &str) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((instance_id, text.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("disk I/O error"));
        }
        self.values.insert(instance_id, text.to_string());
        Ok(())
    }
}

pub fn state_only_config(instance_id: i64, entity_id: &str) -> WidgetConfig {
    WidgetConfig {
        instance_id,
        entity_id: entity_id.to_string(),
        attribute_keys: vec![],
        label: None,
        text_size_sp: 30.0,
        state_separator: String::new(),
        attribute_separator: String::new(),
    }
}

pub fn attribute_config(instance_id: i64, entity_id: &str, keys: &[&str]) -> WidgetConfig {
    WidgetConfig {
        attribute_keys: keys.iter().map(|k| k.to_string()).collect(),
        state_separator: "-".to_string(),
        attribute_separator: ",".to_string(),
        ..state_only_config(instance_id, entity_id)
    }
}

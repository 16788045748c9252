//! Generic widget instance lifecycle.
//!
//! Replaces platform-specific provider callbacks with four entry points:
//!
//! ```text
//!   on_create(id, input)        ──► save config ──► refresh
//!   on_refresh(id)              ──► load config ──► resolve ──► render
//!   on_delete(ids)              ──► drop config + last-good text
//!   on_external_event(entity)   ──► every instance showing `entity`
//!                                    ──► resolve (pushed snapshot) ──► render
//! ```
//!
//! Every refresh runs as its own tokio task. The returned `JoinHandle`s may be
//! awaited or dropped (fire-and-forget). A refresh that finishes after its
//! instance was deleted is discarded instead of rendered.

use crate::entity::EntitySnapshot;
use crate::resolver::Resolver;
use crate::store::WidgetStore;
use crate::widget::{WidgetConfig, WidgetConfigInput};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

mod render;

pub use render::{ChannelRenderSink, LogRenderSink, RenderSink, RenderUpdate};

#[cfg(test)]
mod tests;

/// Wires store, resolver and render sink together.
///
/// Cheap to clone; every clone shares the same collaborators.
#[derive(Clone)]
pub struct WidgetHost {
    store: Arc<dyn WidgetStore>,
    resolver: Arc<Resolver>,
    sink: Arc<dyn RenderSink>,
}

impl WidgetHost {
    pub fn new(store: Arc<dyn WidgetStore>, resolver: Resolver, sink: Arc<dyn RenderSink>) -> Self {
        Self {
            store,
            resolver: Arc::new(resolver),
            sink,
        }
    }

    /// Save (or replace) an instance's configuration and refresh it.
    ///
    /// Incomplete input is rejected with [`crate::widget::ConfigError`] and
    /// leaves the store untouched.
    pub fn on_create(&self, instance_id: i64, input: WidgetConfigInput) -> Result<JoinHandle<()>> {
        let config = match WidgetConfig::from_input(instance_id, input) {
            Ok(config) => config,
            Err(e) => {
                error!(instance_id = instance_id, error = %e, "Did not receive complete configuration data");
                return Err(e.into());
            }
        };

        info!(
            instance_id = instance_id,
            entity_id = %config.entity_id,
            attributes = ?config.attribute_keys,
            "Saving entity state config data"
        );

        self.store
            .save(&config)
            .context("Failed to save widget config")?;

        Ok(self.spawn_refresh(config, None))
    }

    /// Refresh one instance. Unknown instances are skipped.
    pub fn on_refresh(&self, instance_id: i64) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move {
            let config = match host.store.get(instance_id) {
                Ok(Some(config)) => config,
                Ok(None) => {
                    debug!(instance_id = instance_id, "Widget not configured, skipping refresh");
                    return;
                }
                Err(e) => {
                    error!(instance_id = instance_id, error = %e, "Failed to load widget config");
                    return;
                }
            };
            host.refresh(config, None).await;
        })
    }

    /// Refresh every configured instance.
    pub fn on_refresh_all(&self) -> Result<Vec<JoinHandle<()>>> {
        let configs = self.store.get_all().context("Failed to list widgets")?;
        Ok(configs
            .into_iter()
            .map(|config| self.spawn_refresh(config, None))
            .collect())
    }

    /// Remove instances and their last-good text.
    pub fn on_delete(&self, instance_ids: &[i64]) -> Result<usize> {
        let removed = self
            .store
            .delete(instance_ids)
            .context("Failed to delete widgets")?;
        info!(requested = instance_ids.len(), removed = removed, "Widgets deleted");
        Ok(removed)
    }

    /// Fan a pushed entity change out to every instance showing that entity.
    pub fn on_external_event(
        &self,
        entity_id: &str,
        snapshot: EntitySnapshot,
    ) -> Result<Vec<JoinHandle<()>>> {
        let snapshot = Arc::new(snapshot);
        let matching: Vec<WidgetConfig> = self
            .store
            .get_all()
            .context("Failed to list widgets")?
            .into_iter()
            .filter(|config| config.entity_id == entity_id)
            .collect();

        debug!(
            entity_id = %entity_id,
            instances = matching.len(),
            "Entity state changed"
        );

        Ok(matching
            .into_iter()
            .map(|config| self.spawn_refresh(config, Some(Arc::clone(&snapshot))))
            .collect())
    }

    /// Consume pushed snapshots until the channel closes, then wait for the
    /// refreshes still in flight.
    pub async fn run_push_listener(self: Arc<Self>, mut rx: broadcast::Receiver<EntitySnapshot>) {
        info!("Push listener started");
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            match rx.recv().await {
                Ok(snapshot) => {
                    in_flight.retain(|handle| !handle.is_finished());
                    let entity_id = snapshot.entity_id.clone();
                    match self.on_external_event(&entity_id, snapshot) {
                        Ok(handles) => in_flight.extend(handles),
                        Err(e) => {
                            error!(entity_id = %entity_id, error = %e, "Failed to fan out entity update")
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Push listener lagged, skipped updates");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!(in_flight = in_flight.len(), "Push channel closed");
                    break;
                }
            }
        }

        for result in join_all(in_flight).await {
            if let Err(e) = result {
                error!(error = %e, "Refresh task failed");
            }
        }
    }

    fn spawn_refresh(
        &self,
        config: WidgetConfig,
        pushed: Option<Arc<EntitySnapshot>>,
    ) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move { host.refresh(config, pushed).await })
    }

    async fn refresh(&self, config: WidgetConfig, pushed: Option<Arc<EntitySnapshot>>) {
        let resolved = self
            .resolver
            .resolve_instance(&config, pushed.as_deref())
            .await;

        match self.store.get(config.instance_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(
                    instance_id = config.instance_id,
                    "Widget deleted during refresh, discarding result"
                );
                return;
            }
            Err(e) => {
                warn!(
                    instance_id = config.instance_id,
                    error = %e,
                    "Failed to re-check widget before render"
                );
            }
        }

        self.sink.render(RenderUpdate {
            instance_id: config.instance_id,
            text: resolved.text,
            label: config.display_label().to_string(),
            text_size_sp: config.text_size_sp,
            is_error: resolved.is_error,
        });
    }
}

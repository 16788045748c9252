//! Text resolution with last-good fallback.
//!
//! One resolution pass:
//! 1. Use the pushed snapshot if it belongs to the configured entity,
//!    otherwise fetch the entity (a failure is recorded, not raised)
//! 2. Compose the display text (state only, or state + attributes)
//! 3. Write the result back to the last-good cache (exactly once per pass)
//!
//! Errors never escape: they become `is_error = true` plus the cached text.

use crate::client::EntityClient;
use crate::entity::EntitySnapshot;
use crate::store::LastGoodCache;
use crate::widget::WidgetConfig;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};


/// Result of one resolution pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedText {
    /// Text to display (`None` = nothing resolved yet)
    pub text: Option<String>,

    /// True when the text is stale because fetching or formatting failed
    pub is_error: bool,
}

/// Failures recovered inside a resolution pass
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Remote lookup failed or returned the wrong entity
    Fetch(String),
    /// Attribute extraction or composition failed
    Format(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Fetch(msg) => write!(f, "fetch failed: {}", msg),
            ResolveError::Format(msg) => write!(f, "format failed: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Output of the pure decision step
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub resolved: ResolvedText,
    /// Value to persist as the new last-good text
    pub write_back: String,
    /// Format failure that forced the fallback, if any
    pub error: Option<ResolveError>,
}

/// Decide the display text for one instance. No I/O.
///
/// `snapshot` is `None` when the fetch failed (`fetch_failed = true`).
///
/// - State-only mode: text is the snapshot state, else the cached text; the
///   same value is written back, so the returned text equals the cache
///   content after the write.
/// - Attribute mode: `state + state_separator + values.join(attribute_separator)`;
///   missing keys render as empty segments. Without a snapshot, or on any
///   formatting failure, the cached text is returned with `is_error = true`
///   and the cached value is written back unchanged.
pub fn compose(
    config: &WidgetConfig,
    snapshot: Option<&EntitySnapshot>,
    fetch_failed: bool,
    cached_text: Option<&str>,
) -> Composition {
    if !config.attribute_mode() {
        let write_back = snapshot
            .map(|s| s.state.clone())
            .or_else(|| cached_text.map(str::to_string))
            .unwrap_or_default();

        return Composition {
            resolved: ResolvedText {
                text: Some(write_back.clone()).filter(|t| !t.is_empty()),
                is_error: fetch_failed,
            },
            write_back,
            error: None,
        };
    }

    match format_with_attributes(config, snapshot) {
        Ok(text) => Composition {
            resolved: ResolvedText {
                text: Some(text.clone()),
                is_error: false,
            },
            write_back: text,
            error: None,
        },
        Err(e) => Composition {
            resolved: ResolvedText {
                text: cached_text.map(str::to_string),
                is_error: true,
            },
            write_back: cached_text.unwrap_or_default().to_string(),
            error: Some(e),
        },
    }
}

/// Compose `state + separator + attributes`, or fail without partial output
pub fn format_with_attributes(
    config: &WidgetConfig,
    snapshot: Option<&EntitySnapshot>,
) -> Result<String, ResolveError> {
    let snapshot = snapshot.ok_or_else(|| {
        ResolveError::Format(format!("no snapshot available for {}", config.entity_id))
    })?;

    let values = config
        .attribute_keys
        .iter()
        .map(|key| {
            snapshot
                .attribute_display(key)
                .map(Option::unwrap_or_default)
                .map_err(|e| ResolveError::Format(format!("attribute '{}': {}", key, e)))
        })
        .collect::<Result<Vec<String>, _>>()?;

    let mut text = snapshot.state.clone();
    if !values.is_empty() {
        text.push_str(&config.state_separator);
    }
    text.push_str(&values.join(&config.attribute_separator));
    Ok(text)
}

/// Runs resolution passes against an injected client and cache.
///
/// Holds no per-pass state, so concurrent passes (for the same or different
/// instances) never share locals.
pub struct Resolver {
    client: Arc<dyn EntityClient>,
    cache: Arc<dyn LastGoodCache>,
}

impl Resolver {
    pub fn new(client: Arc<dyn EntityClient>, cache: Arc<dyn LastGoodCache>) -> Self {
        Self { client, cache }
    }

    /// Resolve with an explicitly supplied cached text.
    pub async fn resolve(
        &self,
        config: &WidgetConfig,
        pushed: Option<&EntitySnapshot>,
        cached_text: Option<String>,
    ) -> ResolvedText {
        let (snapshot, fetch_failed) = match self.obtain_snapshot(config, pushed).await {
            Ok(snapshot) => (Some(snapshot), false),
            Err(e) => {
                error!(
                    instance_id = config.instance_id,
                    entity_id = %config.entity_id,
                    error = %e,
                    "Unable to fetch entity"
                );
                (None, true)
            }
        };

        let composition = compose(config, snapshot.as_ref(), fetch_failed, cached_text.as_deref());

        if let Some(e) = &composition.error {
            error!(
                instance_id = config.instance_id,
                entity_id = %config.entity_id,
                error = %e,
                "Unable to fetch entity state and attributes"
            );
        }

        self.write_back(config.instance_id, &composition.write_back);

        composition.resolved
    }

    /// Resolve using the cached text currently stored for the instance.
    pub async fn resolve_instance(
        &self,
        config: &WidgetConfig,
        pushed: Option<&EntitySnapshot>,
    ) -> ResolvedText {
        let cached_text = match self.cache.get_last_good(config.instance_id) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    instance_id = config.instance_id,
                    error = %e,
                    "Failed to read last-good text"
                );
                None
            }
        };

        self.resolve(config, pushed, cached_text).await
    }

    async fn obtain_snapshot(
        &self,
        config: &WidgetConfig,
        pushed: Option<&EntitySnapshot>,
    ) -> Result<EntitySnapshot, ResolveError> {
        if let Some(snapshot) = pushed.filter(|s| s.entity_id == config.entity_id) {
            debug!(
                instance_id = config.instance_id,
                entity_id = %config.entity_id,
                "Using pushed snapshot"
            );
            return Ok(snapshot.clone());
        }

        let snapshot = self
            .client
            .get_entity(&config.entity_id)
            .await
            .map_err(|e| ResolveError::Fetch(format!("{:#}", e)))?;

        if snapshot.entity_id != config.entity_id {
            return Err(ResolveError::Fetch(format!(
                "requested {} but received {}",
                config.entity_id, snapshot.entity_id
            )));
        }

        Ok(snapshot)
    }

    /// Persist the new last-good text. Failures are logged, never raised.
    fn write_back(&self, instance_id: i64, text: &str) {
        if let Err(e) = self.cache.update_last_good(instance_id, text) {
            warn!(
                instance_id = instance_id,
                error = %e,
                "Failed to update last-good text"
            );
        }
    }
}

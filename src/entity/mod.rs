use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;


/// Point-in-time view of a remote entity, delivered by a push event or
/// fetched on demand. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Remote entity identifier (e.g., "sensor.living_room_temperature")
    pub entity_id: String,

    /// Raw state string as reported by the remote side
    pub state: String,

    /// Attribute values (scalar or structured)
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl EntitySnapshot {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style attribute insert
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Display string for one attribute, or `None` if the key is absent.
    ///
    /// Strings render without quotes, `null` renders empty (same as a missing
    /// key), everything else renders as compact JSON (`21.5`, `true`, `["a","b"]`).
    pub fn attribute_display(&self, key: &str) -> Result<Option<String>, serde_json::Error> {
        self.attributes
            .get(key)
            .map(display_value)
            .transpose()
    }
}

/// Coerce an attribute value to the string shown on the widget
pub fn display_value(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value),
    }
}

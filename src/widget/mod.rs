use serde::{Deserialize, Serialize};
use std::fmt;

/// Text size used when the configured value is missing or unparseable
pub const DEFAULT_TEXT_SIZE_SP: f32 = 30.0;

/// Configuration of one widget instance on the host surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Host-assigned instance ID (stable for the lifetime of the instance)
    pub instance_id: i64,

    /// Remote entity shown by this instance
    pub entity_id: String,

    /// Attribute keys appended after the state (empty = state only)
    pub attribute_keys: Vec<String>,

    /// Optional label; falls back to the entity ID
    pub label: Option<String>,

    /// Text size in scaled pixels
    pub text_size_sp: f32,

    /// Inserted between the state and the first attribute
    pub state_separator: String,

    /// Inserted between attribute values
    pub attribute_separator: String,
}

/// Raw values collected by the configuration UI
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WidgetConfigInput {
    pub entity_id: Option<String>,
    pub attribute_ids: Option<Vec<String>>,
    pub label: Option<String>,
    pub text_size: Option<String>,
    pub state_separator: Option<String>,
    pub attribute_separator: Option<String>,
}

/// Configuration errors (save is rejected, nothing is stored)
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingEntityId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEntityId => write!(f, "entity id is required"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl WidgetConfig {
    /// Build a config from raw user input.
    ///
    /// - entity id: required, surrounding whitespace removed
    /// - attribute ids: comma-joined entries are split, then trimmed and blanks
    ///   dropped; an empty list means state only
    /// - text size: parsed as float, `DEFAULT_TEXT_SIZE_SP` on failure
    /// - separators: default to ""
    pub fn from_input(instance_id: i64, input: WidgetConfigInput) -> Result<Self, ConfigError> {
        let entity_id = input
            .entity_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingEntityId)?;

        let attribute_keys = input
            .attribute_ids
            .unwrap_or_default()
            .iter()
            .flat_map(|ids| ids.split(','))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();

        let text_size_sp = input
            .text_size
            .and_then(|s| s.trim().parse::<f32>().ok())
            .filter(|size| size.is_finite())
            .unwrap_or(DEFAULT_TEXT_SIZE_SP);

        Ok(Self {
            instance_id,
            entity_id,
            attribute_keys,
            label: input.label,
            text_size_sp,
            state_separator: input.state_separator.unwrap_or_default(),
            attribute_separator: input.attribute_separator.unwrap_or_default(),
        })
    }

    /// True when attribute values are appended to the state
    pub fn attribute_mode(&self) -> bool {
        !self.attribute_keys.is_empty()
    }

    /// Label shown above the text
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.entity_id)
    }
}

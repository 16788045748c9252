// Entity snapshots and attribute display
pub mod entity;

// Widget configuration and input parsing
pub mod widget;

// Config and last-good text storage
pub mod store;

// Remote entity fetch
pub mod client;

// Text resolution with cache fallback
pub mod resolver;

// Instance lifecycle, fan-out and rendering
pub mod host;

// Service configuration
pub mod config;

#[cfg(test)]
mod testing;

pub use entity::EntitySnapshot;
pub use resolver::{ResolvedText, Resolver};
pub use widget::{ConfigError, WidgetConfig, WidgetConfigInput};

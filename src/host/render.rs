use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Everything the presentation layer needs for one widget instance
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderUpdate {
    pub instance_id: i64,
    /// Resolved text (`None` = nothing resolved yet)
    pub text: Option<String>,
    /// Configured label, or the entity ID
    pub label: String,
    pub text_size_sp: f32,
    /// Show the stale-data indicator
    pub is_error: bool,
}

/// Presentation side of the widget host. Implementations must not block.
pub trait RenderSink: Send + Sync {
    fn render(&self, update: RenderUpdate);
}

/// Forwards render updates over an unbounded channel
pub struct ChannelRenderSink {
    tx: mpsc::UnboundedSender<RenderUpdate>,
}

impl ChannelRenderSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RenderSink for ChannelRenderSink {
    fn render(&self, update: RenderUpdate) {
        if let Err(e) = self.tx.send(update) {
            debug!(instance_id = e.0.instance_id, "Render receiver dropped");
        }
    }
}

/// Logs each render update (used by the CLI host)
pub struct LogRenderSink;

impl RenderSink for LogRenderSink {
    fn render(&self, update: RenderUpdate) {
        info!(
            instance_id = update.instance_id,
            label = %update.label,
            text = update.text.as_deref().unwrap_or(""),
            error = update.is_error,
            "Widget rendered"
        );
    }
}

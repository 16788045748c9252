use super::EntityClient;
use crate::entity::EntitySnapshot;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// HTTP client for a remote states API.
///
/// Fetches `GET {base_url}/api/states/{entity_id}` with a Bearer token and
/// decodes the `{entity_id, state, attributes}` JSON body.
pub struct HttpEntityClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl HttpEntityClient {
    /// Create a client with the given request timeout.
    pub fn new(base_url: String, access_token: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("entity-widget/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            access_token,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn state_url(&self, entity_id: &str) -> String {
        format!(
            "{}/api/states/{}",
            self.base_url,
            urlencoding::encode(entity_id)
        )
    }
}

#[async_trait]
impl EntityClient for HttpEntityClient {
    async fn get_entity(&self, entity_id: &str) -> Result<EntitySnapshot> {
        let response = self
            .http_client
            .get(self.state_url(entity_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to send state request for {}", entity_id))?;

        check_response_status(&response, entity_id)?;

        response
            .json::<EntitySnapshot>()
            .await
            .with_context(|| format!("Failed to parse state response for {}", entity_id))
    }
}

/// Map non-2xx responses to descriptive errors.
///
/// - 401 → auth error (token expired or invalid)
/// - 404 → entity not found
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response, entity_id: &str) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Auth error: token expired or invalid")),
        StatusCode::NOT_FOUND => Err(anyhow!("Entity not found: {}", entity_id)),
        s if !s.is_success() => Err(anyhow!("States API error: {}", s)),
        _ => Ok(()),
    }
}

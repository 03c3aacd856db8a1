//! Two-phase container publishing shared by Threads and Instagram
//!
//! Both graph APIs publish in two steps: create a media container, then
//! publish it once the remote side has finished processing. A container
//! moves from [`Created`] to [`Settled`] only through [`Container::settle`],
//! which enforces the minimum dwell time, and only a settled container can
//! be published.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use crate::config::GraphConfig;
use crate::error::PlatformError;
use crate::platforms::{id_field, network_error, read_json};
use crate::types::GraphAccount;

/// Container state right after creation
#[derive(Debug)]
pub struct Created;

/// Container state after the dwell time has elapsed
#[derive(Debug)]
pub struct Settled;

#[derive(Debug)]
pub struct Container<State> {
    id: String,
    created_at: Instant,
    _state: PhantomData<State>,
}

impl<State> Container<State> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Container<Created> {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            _state: PhantomData,
        }
    }

    /// Wait until at least `dwell` has passed since creation
    pub async fn settle(self, dwell: Duration) -> Container<Settled> {
        let elapsed = self.created_at.elapsed();
        if elapsed < dwell {
            tokio::time::sleep(dwell - elapsed).await;
        }

        Container {
            id: self.id,
            created_at: self.created_at,
            _state: PhantomData,
        }
    }
}

/// Edge names and labels that differ between the graph APIs
#[derive(Debug, Clone, Copy)]
pub struct GraphEdges {
    /// Container creation edge, e.g. `threads` or `media`
    pub create: &'static str,
    /// Publish edge, e.g. `threads_publish` or `media_publish`
    pub publish: &'static str,
    pub create_phase: &'static str,
    pub publish_phase: &'static str,
}

pub struct GraphClient {
    client: Client,
    config: GraphConfig,
    edges: GraphEdges,
}

impl GraphClient {
    pub fn new(client: Client, config: GraphConfig, edges: GraphEdges) -> Self {
        Self {
            client,
            config,
            edges,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn edge_url(&self, account_id: &str, edge: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            account_id,
            edge
        )
    }

    /// Create a media container from `fields`; the access token is added here
    pub async fn create_container(
        &self,
        account: GraphAccount<'_>,
        mut fields: Map<String, Value>,
    ) -> Result<Container<Created>, PlatformError> {
        let phase = self.edges.create_phase;
        fields.insert(
            "access_token".to_string(),
            Value::String(account.access_token.expose_secret().to_string()),
        );

        let response = self
            .client
            .post(self.edge_url(account.account_id, self.edges.create))
            .json(&fields)
            .send()
            .await
            .map_err(|e| network_error(phase, e))?;

        let body = read_json(phase, response).await?;
        let id = id_field(&body, "id").ok_or_else(|| {
            PlatformError::InvalidResponse(format!("{} returned no container id", phase))
        })?;

        tracing::debug!(container_id = %id, "{} succeeded", phase);
        Ok(Container::new(id))
    }

    /// Publish a settled container and return the post id
    pub async fn publish(
        &self,
        account: GraphAccount<'_>,
        container: Container<Settled>,
    ) -> Result<String, PlatformError> {
        let phase = self.edges.publish_phase;
        let body = serde_json::json!({
            "creation_id": container.id,
            "access_token": account.access_token.expose_secret(),
        });

        let response = self
            .client
            .post(self.edge_url(account.account_id, self.edges.publish))
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(phase, e))?;

        let body = read_json(phase, response).await?;
        id_field(&body, "id")
            .ok_or_else(|| PlatformError::InvalidResponse(format!("{} returned no post id", phase)))
    }

    /// Full create, settle, publish sequence
    pub async fn create_and_publish(
        &self,
        account: GraphAccount<'_>,
        fields: Map<String, Value>,
    ) -> Result<String, PlatformError> {
        let container = self.create_container(account, fields).await?;
        let settled = container.settle(self.config.settle_delay()).await;
        self.publish(account, settled).await
    }
}

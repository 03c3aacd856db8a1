//! Threads publisher

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::config::GraphConfig;
use crate::error::PlatformError;
use crate::platforms::graph::{GraphClient, GraphEdges};
use crate::platforms::Platform;
use crate::types::{Credentials, PlatformKind};

const EDGES: GraphEdges = GraphEdges {
    create: "threads",
    publish: "threads_publish",
    create_phase: "Threads container creation",
    publish_phase: "Threads publish",
};

pub struct ThreadsPlatform {
    graph: GraphClient,
}

impl ThreadsPlatform {
    pub fn new(client: Client, config: GraphConfig) -> Self {
        Self {
            graph: GraphClient::new(client, config, EDGES),
        }
    }
}

#[async_trait]
impl Platform for ThreadsPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Threads
    }

    async fn publish(
        &self,
        text: &str,
        credentials: &Credentials,
    ) -> Result<String, PlatformError> {
        let account = credentials.threads().ok_or_else(|| {
            PlatformError::Authentication("Threads app id or access token missing".to_string())
        })?;

        let mut fields = Map::new();
        fields.insert("media_type".to_string(), Value::from("TEXT"));
        fields.insert("text".to_string(), Value::from(text));

        let post_id = self.graph.create_and_publish(account, fields).await?;
        tracing::info!(post_id = %post_id, "Published to Threads");
        Ok(post_id)
    }
}

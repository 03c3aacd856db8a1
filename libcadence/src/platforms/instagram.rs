//! Instagram publisher
//!
//! Uses the same container protocol as Threads, keyed by the Instagram user
//! id. The post text becomes the caption; `image_url` from config is
//! attached when set.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::config::GraphConfig;
use crate::error::PlatformError;
use crate::platforms::graph::{GraphClient, GraphEdges};
use crate::platforms::Platform;
use crate::types::{Credentials, PlatformKind};

const EDGES: GraphEdges = GraphEdges {
    create: "media",
    publish: "media_publish",
    create_phase: "Instagram container creation",
    publish_phase: "Instagram publish",
};

pub struct InstagramPlatform {
    graph: GraphClient,
}

impl InstagramPlatform {
    pub fn new(client: Client, config: GraphConfig) -> Self {
        Self {
            graph: GraphClient::new(client, config, EDGES),
        }
    }

    fn container_fields(&self, text: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("caption".to_string(), Value::from(text));
        if let Some(image_url) = self
            .graph
            .config()
            .image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
        {
            fields.insert("image_url".to_string(), Value::from(image_url));
        }
        fields
    }
}

#[async_trait]
impl Platform for InstagramPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    async fn publish(
        &self,
        text: &str,
        credentials: &Credentials,
    ) -> Result<String, PlatformError> {
        let account = credentials.instagram().ok_or_else(|| {
            PlatformError::Authentication("Instagram user id or access token missing".to_string())
        })?;

        let post_id = self
            .graph
            .create_and_publish(account, self.container_fields(text))
            .await?;
        tracing::info!(post_id = %post_id, "Published to Instagram");
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_fields_without_image() {
        let platform = InstagramPlatform::new(Client::new(), GraphConfig::instagram());
        let fields = platform.container_fields("caption text");

        assert_eq!(fields.get("caption"), Some(&Value::from("caption text")));
        assert!(!fields.contains_key("image_url"));
    }

    #[test]
    fn test_container_fields_with_image() {
        let config = GraphConfig {
            image_url: Some("https://example.com/card.png".to_string()),
            ..GraphConfig::instagram()
        };
        let platform = InstagramPlatform::new(Client::new(), config);
        let fields = platform.container_fields("caption text");

        assert_eq!(
            fields.get("image_url"),
            Some(&Value::from("https://example.com/card.png"))
        );
    }
}

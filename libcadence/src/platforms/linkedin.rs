//! LinkedIn publisher
//!
//! Resolves the member URN from `/v2/userinfo`, then creates a public text
//! share through `/v2/ugcPosts`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::config::LinkedinConfig;
use crate::error::PlatformError;
use crate::platforms::{id_field, network_error, read_json, Platform};
use crate::types::{Credentials, PlatformKind};

const USERINFO_PHASE: &str = "LinkedIn profile lookup";
const SHARE_PHASE: &str = "LinkedIn share";

pub struct LinkedinPlatform {
    client: Client,
    config: LinkedinConfig,
}

impl LinkedinPlatform {
    pub fn new(client: Client, config: LinkedinConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn author_urn(&self, token: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .get(self.url("/v2/userinfo"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| network_error(USERINFO_PHASE, e))?;

        let body = read_json(USERINFO_PHASE, response).await?;
        let sub = id_field(&body, "sub").ok_or_else(|| {
            PlatformError::InvalidResponse(format!("{} returned no member id", USERINFO_PHASE))
        })?;

        Ok(format!("urn:li:person:{}", sub))
    }
}

/// Body of a public, text-only UGC share
pub fn share_body(author: &str, text: &str) -> Value {
    serde_json::json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": text },
                "shareMediaCategory": "NONE",
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

#[async_trait]
impl Platform for LinkedinPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Linkedin
    }

    async fn publish(
        &self,
        text: &str,
        credentials: &Credentials,
    ) -> Result<String, PlatformError> {
        let token = credentials
            .linkedin()
            .ok_or_else(|| PlatformError::Authentication("LinkedIn access token missing".to_string()))?
            .expose_secret();

        let author = self.author_urn(token).await?;

        let response = self
            .client
            .post(self.url("/v2/ugcPosts"))
            .bearer_auth(token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&share_body(&author, text))
            .send()
            .await
            .map_err(|e| network_error(SHARE_PHASE, e))?;

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| network_error(SHARE_PHASE, e))?;

        if !status.is_success() {
            return Err(PlatformError::Api {
                phase: SHARE_PHASE,
                status: status.as_u16(),
                body,
            });
        }

        let body_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| id_field(&json, "id"));

        let post_id = body_id.or(header_id).ok_or_else(|| {
            PlatformError::InvalidResponse(format!("{} returned no post id", SHARE_PHASE))
        })?;

        tracing::info!(post_id = %post_id, "Published to LinkedIn");
        Ok(post_id)
    }
}

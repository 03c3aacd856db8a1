//! Platform abstraction and implementations
//!
//! Every destination implements [`Platform`]: a stateless publisher that
//! takes the final text plus the owning user's credentials and returns the
//! platform's id for the new post.
//!
//! # Examples
//!
//! ```no_run
//! use libcadence::config::Config;
//! use libcadence::platforms::create_platforms;
//! use libcadence::types::Credentials;
//!
//! # async fn example() -> libcadence::error::Result<()> {
//! let config = Config::load()?;
//! let credentials = Credentials::empty("default");
//!
//! for platform in create_platforms(&config)? {
//!     if platform.is_configured(&credentials) {
//!         let post_id = platform.publish("Hello from Cadence", &credentials).await?;
//!         println!("{}: {}", platform.name(), post_id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{Config, HttpConfig};
use crate::error::{PlatformError, Result};
use crate::types::{Credentials, PlatformKind};

pub mod graph;
pub mod instagram;
pub mod linkedin;
pub mod threads;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Publisher for one destination platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which destination this publisher serves
    fn kind(&self) -> PlatformKind;

    /// Platform name as stored in history records
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether `credentials` hold every field this platform needs
    fn is_configured(&self, credentials: &Credentials) -> bool {
        credentials.has_platform(self.kind())
    }

    /// Publish `text` and return the platform's post id
    ///
    /// # Errors
    ///
    /// - `PlatformError::Authentication` when credentials are missing
    /// - `PlatformError::Api` for any non-success HTTP response
    /// - `PlatformError::Network` for transport failures and timeouts
    /// - `PlatformError::InvalidResponse` when a success body lacks the id
    async fn publish(
        &self,
        text: &str,
        credentials: &Credentials,
    ) -> std::result::Result<String, PlatformError>;
}

/// Build the production publishers for every supported platform
pub fn create_platforms(config: &Config) -> Result<Vec<Arc<dyn Platform>>> {
    let client = http_client(&config.http)?;

    Ok(vec![
        Arc::new(threads::ThreadsPlatform::new(
            client.clone(),
            config.threads.clone(),
        )),
        Arc::new(linkedin::LinkedinPlatform::new(
            client.clone(),
            config.linkedin.clone(),
        )),
        Arc::new(instagram::InstagramPlatform::new(
            client,
            config.instagram.clone(),
        )),
    ])
}

/// Shared HTTP client with the configured request timeout
pub fn http_client(config: &HttpConfig) -> std::result::Result<Client, PlatformError> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn network_error(phase: &str, error: reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Network(format!("{} timed out: {}", phase, error))
    } else {
        PlatformError::Network(format!("{} failed: {}", phase, error))
    }
}

/// Turn a response into JSON, mapping non-success statuses to `Api` errors
pub(crate) async fn read_json(
    phase: &'static str,
    response: reqwest::Response,
) -> std::result::Result<Value, PlatformError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| network_error(phase, e))?;

    if !status.is_success() {
        return Err(PlatformError::Api {
            phase,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        PlatformError::InvalidResponse(format!("{} returned malformed JSON: {}", phase, e))
    })
}

/// Read a string (or numeric) id field from a JSON body
pub(crate) fn id_field(body: &Value, field: &str) -> Option<String> {
    match body.get(field)? {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

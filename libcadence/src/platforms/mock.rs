//! Mock platform implementation for testing
//!
//! A configurable publisher that can succeed, fail with an API error, or
//! delay, while recording every text it was asked to publish. Used by the
//! processor tests so no credentials or network access are needed.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::Platform;
use crate::types::{Credentials, PlatformKind};

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub kind: PlatformKind,

    /// Error returned from every publish; `None` means success
    pub publish_error: Option<PlatformError>,

    /// Delay before completing a publish (simulates network latency)
    pub delay: Duration,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Texts that have been published (for verification)
    pub published_content: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    pub fn new(kind: PlatformKind) -> Self {
        Self {
            kind,
            publish_error: None,
            delay: Duration::from_millis(0),
            publish_call_count: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock platform that always succeeds
    pub fn success(kind: PlatformKind) -> Self {
        Self::new(MockConfig::new(kind))
    }

    /// Create a mock platform whose publishes fail with an HTTP error
    pub fn api_failure(kind: PlatformKind, status: u16, body: &str) -> Self {
        Self::new(MockConfig {
            publish_error: Some(PlatformError::Api {
                phase: "mock publish",
                status,
                body: body.to_string(),
            }),
            ..MockConfig::new(kind)
        })
    }

    /// Create a mock platform whose publishes fail at the transport level
    pub fn network_failure(kind: PlatformKind, error: &str) -> Self {
        Self::new(MockConfig {
            publish_error: Some(PlatformError::Network(error.to_string())),
            ..MockConfig::new(kind)
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(kind: PlatformKind, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(kind)
        })
    }

    /// Get the number of times publish was called
    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    /// Get all content that was published
    pub fn published_content(&self) -> Vec<String> {
        self.config.published_content.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn kind(&self) -> PlatformKind {
        self.config.kind
    }

    async fn publish(
        &self,
        text: &str,
        _credentials: &Credentials,
    ) -> Result<String, PlatformError> {
        let call_number = {
            let mut count = self.config.publish_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(ref error) = self.config.publish_error {
            return Err(error.clone());
        }

        self.config
            .published_content
            .lock()
            .unwrap()
            .push(text.to_string());

        Ok(format!("{}-post-{}", self.config.kind, call_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success_records_content() {
        let platform = MockPlatform::success(PlatformKind::Threads);
        let credentials = Credentials::empty("user");

        let id = platform.publish("Hello", &credentials).await.unwrap();

        assert_eq!(id, "threads-post-1");
        assert_eq!(platform.publish_call_count(), 1);
        assert_eq!(platform.published_content(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_api_failure() {
        let platform = MockPlatform::api_failure(PlatformKind::Linkedin, 401, "bad token");
        let credentials = Credentials::empty("user");

        let err = platform.publish("Hello", &credentials).await.unwrap_err();

        assert_eq!(err.status_code(), Some(401));
        assert_eq!(platform.publish_call_count(), 1);
        assert!(platform.published_content().is_empty());
    }

    #[tokio::test]
    async fn test_mock_is_configured_follows_credentials() {
        let platform = MockPlatform::success(PlatformKind::Linkedin);
        let mut credentials = Credentials::empty("user");
        assert!(!platform.is_configured(&credentials));

        credentials.linkedin_access_token =
            Some(secrecy::SecretString::from("token".to_string()));
        assert!(platform.is_configured(&credentials));
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let platform = MockPlatform::with_delay(PlatformKind::Instagram, Duration::from_millis(20));
        let credentials = Credentials::empty("user");
        let started = std::time::Instant::now();

        platform.publish("Hello", &credentials).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}

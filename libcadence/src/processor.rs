//! Scheduled-post processing cycle
//!
//! One call to [`ScheduledPostProcessor::run_cycle`] is one pass: fetch the
//! due schedules, resolve text per enabled platform, publish, record one
//! history row per attempt and advance the schedules that had at least one
//! success. Only a failure to fetch the due schedules aborts the cycle; every
//! other problem is confined to the post or platform it belongs to.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::{PlatformError, Result};
use crate::generator::{ChatCompletionGenerator, ContentGenerator};
use crate::platforms::{create_platforms, Platform};
use crate::scheduling::next_post_time;
use crate::types::{Credentials, HistoryRecord, PlatformKind, ScheduledPost};

/// Outcome of one platform within one post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
    /// Not attempted (credentials or content unavailable); no history row
    Skipped,
}

/// Roll-up of a post's platform outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every enabled platform was published
    Success,
    /// At least one success alongside failures or skips
    Partial,
    /// Attempts were made and none succeeded, or the post could not be processed
    Failed,
    /// Nothing was attempted
    Skipped,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Success => "success",
            OverallStatus::Partial => "partial",
            OverallStatus::Failed => "failed",
            OverallStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOutcome {
    pub platform: PlatformKind,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
    /// Failure detail, or the reason a platform was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformOutcome {
    fn skipped(platform: PlatformKind, reason: impl Into<String>) -> Self {
        Self {
            platform,
            status: AttemptStatus::Skipped,
            platform_post_id: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOutcome {
    pub id: String,
    pub platform_results: Vec<PlatformOutcome>,
    pub overall_status: OverallStatus,
    /// Whether the schedule was moved to its next due time
    pub advanced: bool,
    /// Storage problems hit while processing this post
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PostOutcome {
    fn new(id: &str, mut platform_results: Vec<PlatformOutcome>) -> Self {
        platform_results.sort_by_key(|outcome| outcome.platform);
        let overall_status = overall_status(&platform_results);
        Self {
            id: id.to_string(),
            platform_results,
            overall_status,
            advanced: false,
            error: None,
        }
    }

    fn aborted(id: &str, error: String) -> Self {
        Self {
            id: id.to_string(),
            platform_results: Vec::new(),
            overall_status: OverallStatus::Failed,
            advanced: false,
            error: Some(error),
        }
    }

    fn note_error(&mut self, error: String) {
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{}; {}", existing, error),
            None => error,
        });
    }
}

fn overall_status(results: &[PlatformOutcome]) -> OverallStatus {
    let count = |status| results.iter().filter(|r| r.status == status).count();
    let succeeded = count(AttemptStatus::Success);
    let failed = count(AttemptStatus::Failed);

    if succeeded > 0 && succeeded == results.len() {
        OverallStatus::Success
    } else if succeeded > 0 {
        OverallStatus::Partial
    } else if failed > 0 {
        OverallStatus::Failed
    } else {
        OverallStatus::Skipped
    }
}

/// Result of one processing cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    /// Unix timestamp captured once at cycle start
    pub started_at: i64,
    /// Number of due posts examined
    pub processed: usize,
    pub results: Vec<PostOutcome>,
}

impl CycleSummary {
    pub fn count(&self, status: OverallStatus) -> usize {
        self.results
            .iter()
            .filter(|r| r.overall_status == status)
            .count()
    }
}

/// Shared text for platforms without an override, resolved at most once per post
enum SharedContent {
    Unresolved,
    Ready(String),
    Unavailable(String),
}

pub struct ScheduledPostProcessor {
    db: Database,
    generator: Arc<dyn ContentGenerator>,
    platforms: HashMap<PlatformKind, Arc<dyn Platform>>,
}

impl ScheduledPostProcessor {
    pub fn new(
        db: Database,
        generator: Arc<dyn ContentGenerator>,
        platforms: Vec<Arc<dyn Platform>>,
    ) -> Self {
        let platforms = platforms
            .into_iter()
            .map(|platform| (platform.kind(), platform))
            .collect();

        Self {
            db,
            generator,
            platforms,
        }
    }

    /// Processor with the production generator and HTTP publishers
    pub fn from_config(config: &Config, db: Database) -> Result<Self> {
        let generator = ChatCompletionGenerator::new(&config.generator)?;
        let platforms = create_platforms(config)?;
        Ok(Self::new(db, Arc::new(generator), platforms))
    }

    /// Run one cycle at the current time
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        self.run_cycle_at(chrono::Utc::now().timestamp()).await
    }

    /// Run one cycle treating `now` as the cycle start
    ///
    /// # Errors
    ///
    /// Fails only when the due schedules cannot be fetched; no schedule is
    /// touched in that case. An unreadable schedule row fails only its own
    /// outcome.
    pub async fn run_cycle_at(&self, now: i64) -> Result<CycleSummary> {
        let started = Instant::now();
        let due = self.db.get_due_posts(now).await?;
        info!(due = due.len(), "Processing scheduled posts");

        let mut results = Vec::with_capacity(due.len());
        for entry in &due {
            let outcome = match entry {
                Ok(post) => self.process_post(post, now, started).await,
                Err(corrupt) => PostOutcome::aborted(&corrupt.id, corrupt.reason.clone()),
            };
            info!(
                post_id = %outcome.id,
                status = %outcome.overall_status,
                advanced = outcome.advanced,
                "Processed scheduled post"
            );
            results.push(outcome);
        }

        Ok(CycleSummary {
            started_at: now,
            processed: due.len(),
            results,
        })
    }

    async fn process_post(&self, post: &ScheduledPost, now: i64, started: Instant) -> PostOutcome {
        if post.platforms.is_empty() {
            warn!(post_id = %post.id, "Scheduled post has no platforms enabled");
            return PostOutcome::new(&post.id, Vec::new());
        }

        let credentials = match self.db.get_credentials(&post.user_id).await {
            Ok(Some(credentials)) => credentials,
            Ok(None) => Credentials::empty(&post.user_id),
            Err(e) => {
                warn!(post_id = %post.id, "Failed to load credentials: {}", e);
                return PostOutcome::aborted(&post.id, format!("credential lookup failed: {}", e));
            }
        };

        let mut outcomes = Vec::new();
        let mut attempts: Vec<(Arc<dyn Platform>, String)> = Vec::new();
        let mut shared = SharedContent::Unresolved;

        for kind in &post.platforms {
            let Some(platform) = self.platforms.get(kind) else {
                outcomes.push(PlatformOutcome::skipped(*kind, "no publisher available"));
                continue;
            };

            if !platform.is_configured(&credentials) {
                debug!(post_id = %post.id, platform = %kind, "Skipping: credentials missing");
                outcomes.push(PlatformOutcome::skipped(*kind, "credentials missing"));
                continue;
            }

            let text = match post.overrides.get(*kind) {
                Some(text) => text.to_string(),
                None => match self.shared_content(post, &mut shared).await {
                    Ok(text) => text,
                    Err(reason) => {
                        debug!(post_id = %post.id, platform = %kind, "Skipping: {}", reason);
                        outcomes.push(PlatformOutcome::skipped(*kind, reason));
                        continue;
                    }
                },
            };

            attempts.push((Arc::clone(platform), text));
        }

        let published = join_all(attempts.iter().map(|(platform, text)| {
            let credentials = &credentials;
            async move {
                info!(post_id = %post.id, platform = platform.name(), "Publishing");
                let result = platform.publish(text, credentials).await;
                let attempted_at = attempt_time(now, started);
                (platform.kind(), text.as_str(), result, attempted_at)
            }
        }))
        .await;

        let mut storage_errors = Vec::new();
        for (kind, text, result, attempted_at) in published {
            let (record, outcome) = attempt_record(post, kind, text, result, attempted_at);

            if let Err(e) = self.db.insert_history_record(&record).await {
                warn!(post_id = %post.id, platform = %kind, "Failed to record history: {}", e);
                storage_errors.push(format!("history insert for {} failed: {}", kind, e));
            }
            outcomes.push(outcome);
        }

        let mut outcome = PostOutcome::new(&post.id, outcomes);
        for error in storage_errors {
            outcome.note_error(error);
        }

        let any_success = outcome
            .platform_results
            .iter()
            .any(|r| r.status == AttemptStatus::Success);

        if any_success {
            let next = next_post_time(now, &post.interval);
            match self.db.advance_schedule(&post.id, now, next).await {
                Ok(()) => {
                    outcome.advanced = true;
                    debug!(post_id = %post.id, next_post_time = next, "Schedule advanced");
                }
                Err(e) => {
                    warn!(post_id = %post.id, "Failed to advance schedule: {}", e);
                    outcome.note_error(format!("schedule update failed: {}", e));
                }
            }
        }

        outcome
    }

    /// Cached text if present, otherwise one generator call per post
    async fn shared_content(
        &self,
        post: &ScheduledPost,
        shared: &mut SharedContent,
    ) -> std::result::Result<String, String> {
        if let SharedContent::Unresolved = shared {
            *shared = match self.resolve_shared_content(post).await {
                Ok(text) => SharedContent::Ready(text),
                Err(reason) => {
                    warn!(post_id = %post.id, "No content available: {}", reason);
                    SharedContent::Unavailable(reason)
                }
            };
        }

        match shared {
            SharedContent::Ready(text) => Ok(text.clone()),
            SharedContent::Unavailable(reason) => Err(reason.clone()),
            SharedContent::Unresolved => Err("content not resolved".to_string()),
        }
    }

    async fn resolve_shared_content(
        &self,
        post: &ScheduledPost,
    ) -> std::result::Result<String, String> {
        if let Some(cached) = post
            .generated_content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
        {
            return Ok(cached.to_string());
        }

        let template = match self.db.get_template(&post.template_id).await {
            Ok(Some(template)) => template,
            Ok(None) => return Err(format!("template {} not found", post.template_id)),
            Err(e) => return Err(format!("template lookup failed: {}", e)),
        };

        let text = self
            .generator
            .generate(&template.comment, Some(&template.language))
            .await
            .map_err(|e| e.to_string())?;

        if text.trim().is_empty() {
            return Err("generator returned no content".to_string());
        }
        Ok(text)
    }
}

/// Cycle time plus the whole seconds elapsed since the cycle started
fn attempt_time(now: i64, started: Instant) -> i64 {
    let elapsed = i64::try_from(started.elapsed().as_secs()).unwrap_or(i64::MAX);
    now.saturating_add(elapsed)
}

fn attempt_record(
    post: &ScheduledPost,
    kind: PlatformKind,
    text: &str,
    result: std::result::Result<String, PlatformError>,
    attempted_at: i64,
) -> (HistoryRecord, PlatformOutcome) {
    match result {
        Ok(platform_post_id) => {
            info!(post_id = %post.id, platform = %kind, "Published: {}", platform_post_id);
            let outcome = PlatformOutcome {
                platform: kind,
                status: AttemptStatus::Success,
                platform_post_id: Some(platform_post_id.clone()),
                error: None,
            };
            (
                HistoryRecord::success(post, kind, text, platform_post_id, attempted_at),
                outcome,
            )
        }
        Err(e) => {
            let message = e.to_string();
            warn!(post_id = %post.id, platform = %kind, "Publish failed: {}", message);
            let outcome = PlatformOutcome {
                platform: kind,
                status: AttemptStatus::Failed,
                platform_post_id: None,
                error: Some(message.clone()),
            };
            (
                HistoryRecord::failure(post, kind, text, message, attempted_at),
                outcome,
            )
        }
    }
}

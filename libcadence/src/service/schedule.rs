//! Template and schedule management
//!
//! Validation lives here rather than in the database layer: at least one
//! platform per schedule, non-empty template text, and ownership checks
//! between a schedule and its template.

use crate::db::Database;
use crate::error::CadenceError;
use crate::generator::{ContentGenerator, DEFAULT_LANGUAGE};
use crate::scheduling::first_post_time;
use crate::types::{
    Interval, PlatformContent, PlatformKind, ScheduleStatus, ScheduledPost, Template,
};
use crate::Result;

/// Parameters for a new schedule
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub user_id: String,
    pub template_id: String,
    pub interval: Interval,
    pub platforms: Vec<PlatformKind>,
    pub overrides: PlatformContent,
    /// First due time; defaults to one interval from now
    pub start: Option<i64>,
}

pub struct ScheduleService {
    db: Database,
}

impl ScheduleService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_template(
        &self,
        user_id: &str,
        title: &str,
        comment: &str,
        language: Option<&str>,
    ) -> Result<Template> {
        let title = title.trim();
        let comment = comment.trim();
        if title.is_empty() {
            return Err(CadenceError::InvalidInput(
                "Template title cannot be empty".to_string(),
            ));
        }
        if comment.is_empty() {
            return Err(CadenceError::InvalidInput(
                "Template prompt cannot be empty".to_string(),
            ));
        }

        let language = language
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);

        let template = Template::new(
            user_id.to_string(),
            title.to_string(),
            comment.to_string(),
            language.to_string(),
        );
        self.db.create_template(&template).await?;
        tracing::debug!(template_id = %template.id, "Created template");
        Ok(template)
    }

    pub async fn list_templates(&self, user_id: &str) -> Result<Vec<Template>> {
        self.db.list_templates(user_id).await
    }

    pub async fn delete_template(&self, template_id: &str) -> Result<()> {
        if !self.db.delete_template(template_id).await? {
            return Err(CadenceError::NotFound(format!("template {}", template_id)));
        }
        Ok(())
    }

    /// Create a schedule; `now` anchors the default first due time
    pub async fn create(&self, request: NewSchedule, now: i64) -> Result<ScheduledPost> {
        if request.platforms.is_empty() {
            return Err(CadenceError::InvalidInput(
                "Select at least one platform".to_string(),
            ));
        }

        let template = self
            .db
            .get_template(&request.template_id)
            .await?
            .filter(|template| template.user_id == request.user_id)
            .ok_or_else(|| CadenceError::NotFound(format!("template {}", request.template_id)))?;

        let next_post_time = request
            .start
            .unwrap_or_else(|| first_post_time(now, &request.interval));

        let mut post = ScheduledPost::new(
            request.user_id,
            template.id,
            request.interval,
            request.platforms,
            next_post_time,
        );
        post.overrides = request.overrides;

        self.db.create_scheduled_post(&post).await?;
        tracing::info!(
            schedule_id = %post.id,
            next_post_time = post.next_post_time,
            "Created schedule"
        );
        Ok(post)
    }

    pub async fn get(&self, schedule_id: &str) -> Result<ScheduledPost> {
        self.db
            .get_scheduled_post(schedule_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("schedule {}", schedule_id)))
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ScheduledPost>> {
        self.db.list_scheduled_posts(user_id).await
    }

    pub async fn pause(&self, schedule_id: &str) -> Result<()> {
        self.set_status(schedule_id, ScheduleStatus::Paused).await
    }

    /// Resume a paused schedule; an overdue schedule runs on the next cycle
    pub async fn resume(&self, schedule_id: &str) -> Result<()> {
        self.set_status(schedule_id, ScheduleStatus::Active).await
    }

    async fn set_status(&self, schedule_id: &str, status: ScheduleStatus) -> Result<()> {
        if !self.db.set_schedule_status(schedule_id, status).await? {
            return Err(CadenceError::NotFound(format!("schedule {}", schedule_id)));
        }
        Ok(())
    }

    pub async fn delete(&self, schedule_id: &str) -> Result<()> {
        if !self.db.delete_scheduled_post(schedule_id).await? {
            return Err(CadenceError::NotFound(format!("schedule {}", schedule_id)));
        }
        Ok(())
    }

    /// Generate text now and cache it as the schedule's pending content
    ///
    /// The next successful cycle publishes the cached text and clears it.
    pub async fn preview(
        &self,
        schedule_id: &str,
        generator: &dyn ContentGenerator,
    ) -> Result<String> {
        let post = self.get(schedule_id).await?;
        let template = self
            .db
            .get_template(&post.template_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("template {}", post.template_id)))?;

        let text = generator
            .generate(&template.comment, Some(&template.language))
            .await?;

        self.db.set_generated_content(&post.id, Some(&text)).await?;
        Ok(text)
    }
}

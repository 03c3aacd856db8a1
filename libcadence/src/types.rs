//! Core types for Cadence

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CadenceError, Result};

/// Destination platforms a schedule can publish to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Threads,
    Linkedin,
    Instagram,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 3] = [
        PlatformKind::Threads,
        PlatformKind::Linkedin,
        PlatformKind::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Threads => "threads",
            PlatformKind::Linkedin => "linkedin",
            PlatformKind::Instagram => "instagram",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "threads" => Ok(PlatformKind::Threads),
            "linkedin" => Ok(PlatformKind::Linkedin),
            "instagram" => Ok(PlatformKind::Instagram),
            other => Err(CadenceError::InvalidInput(format!(
                "Unknown platform '{}'. Valid platforms: threads, linkedin, instagram",
                other
            ))),
        }
    }
}

/// Unit of a recurrence interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "min" | "minute" | "minutes" => Ok(IntervalUnit::Minutes),
            "h" | "hour" | "hours" => Ok(IntervalUnit::Hours),
            "d" | "day" | "days" => Ok(IntervalUnit::Days),
            other => Err(CadenceError::InvalidInput(format!(
                "Unknown interval unit '{}'. Valid units: minutes, hours, days",
                other
            ))),
        }
    }
}

/// Recurrence interval: a positive count of minutes, hours or days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub value: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn new(value: u32, unit: IntervalUnit) -> Result<Self> {
        if value == 0 {
            return Err(CadenceError::InvalidInput(
                "Interval value must be at least 1".to_string(),
            ));
        }
        Ok(Self { value, unit })
    }

    /// Length of one recurrence step
    pub fn duration(&self) -> Duration {
        let value = i64::from(self.value);
        match self.unit {
            IntervalUnit::Minutes => Duration::minutes(value),
            IntervalUnit::Hours => Duration::hours(value),
            IntervalUnit::Days => Duration::days(value),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Paused,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ScheduleStatus::Active),
            "paused" => Ok(ScheduleStatus::Paused),
            other => Err(CadenceError::InvalidInput(format!(
                "Unknown schedule status '{}'",
                other
            ))),
        }
    }
}

/// Optional per-platform text used instead of generated content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContent {
    pub threads: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

impl PlatformContent {
    /// Override text for a platform; blank overrides count as absent
    pub fn get(&self, kind: PlatformKind) -> Option<&str> {
        let value = match kind {
            PlatformKind::Threads => &self.threads,
            PlatformKind::Linkedin => &self.linkedin,
            PlatformKind::Instagram => &self.instagram,
        };
        value.as_deref().filter(|text| !text.trim().is_empty())
    }

    pub fn set(&mut self, kind: PlatformKind, text: Option<String>) {
        let slot = match kind {
            PlatformKind::Threads => &mut self.threads,
            PlatformKind::Linkedin => &mut self.linkedin,
            PlatformKind::Instagram => &mut self.instagram,
        };
        *slot = text;
    }
}

/// A recurring schedule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub interval: Interval,
    /// Unix timestamp of the next due time
    pub next_post_time: i64,
    pub last_posted_at: Option<i64>,
    pub status: ScheduleStatus,
    /// Enabled destinations, sorted and without duplicates
    pub platforms: Vec<PlatformKind>,
    pub overrides: PlatformContent,
    /// Generated text not yet consumed by a successful publish
    pub generated_content: Option<String>,
    pub created_at: i64,
}

impl ScheduledPost {
    pub fn new(
        user_id: String,
        template_id: String,
        interval: Interval,
        platforms: Vec<PlatformKind>,
        next_post_time: i64,
    ) -> Self {
        let mut platforms = platforms;
        platforms.sort();
        platforms.dedup();

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            template_id,
            interval,
            next_post_time,
            last_posted_at: None,
            status: ScheduleStatus::Active,
            platforms,
            overrides: PlatformContent::default(),
            generated_content: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_enabled(&self, kind: PlatformKind) -> bool {
        self.platforms.contains(&kind)
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.status == ScheduleStatus::Active && self.next_post_time <= now
    }
}

/// A user-authored generation prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Prompt text handed to the content generator
    pub comment: String,
    pub language: String,
    pub created_at: i64,
}

impl Template {
    pub fn new(user_id: String, title: String, comment: String, language: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            title,
            comment,
            language,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Account id plus token for the two-phase graph APIs
#[derive(Debug, Clone, Copy)]
pub struct GraphAccount<'a> {
    pub account_id: &'a str,
    pub access_token: &'a SecretString,
}

/// Per-user platform secrets, as stored in the `profiles` table
#[derive(Debug, Default)]
pub struct Credentials {
    pub user_id: String,
    pub threads_app_id: Option<String>,
    pub threads_access_token: Option<SecretString>,
    pub linkedin_access_token: Option<SecretString>,
    pub instagram_user_id: Option<String>,
    pub instagram_access_token: Option<SecretString>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn present_secret(value: &Option<SecretString>) -> Option<&SecretString> {
    value
        .as_ref()
        .filter(|secret| !secret.expose_secret().trim().is_empty())
}

impl Credentials {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn threads(&self) -> Option<GraphAccount<'_>> {
        Some(GraphAccount {
            account_id: present(&self.threads_app_id)?,
            access_token: present_secret(&self.threads_access_token)?,
        })
    }

    pub fn instagram(&self) -> Option<GraphAccount<'_>> {
        Some(GraphAccount {
            account_id: present(&self.instagram_user_id)?,
            access_token: present_secret(&self.instagram_access_token)?,
        })
    }

    pub fn linkedin(&self) -> Option<&SecretString> {
        present_secret(&self.linkedin_access_token)
    }

    /// Whether every field the platform needs is present and non-empty
    pub fn has_platform(&self, kind: PlatformKind) -> bool {
        match kind {
            PlatformKind::Threads => self.threads().is_some(),
            PlatformKind::Linkedin => self.linkedin().is_some(),
            PlatformKind::Instagram => self.instagram().is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Success => "success",
            HistoryStatus::Failed => "failed",
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(HistoryStatus::Success),
            "failed" => Ok(HistoryStatus::Failed),
            other => Err(CadenceError::InvalidInput(format!(
                "Unknown history status '{}'. Valid values: success, failed",
                other
            ))),
        }
    }
}

/// One publish attempt to one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Option<i64>,
    pub user_id: String,
    pub scheduled_post_id: Option<String>,
    pub platform: PlatformKind,
    pub content: String,
    pub status: HistoryStatus,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub posted_at: i64,
}

impl HistoryRecord {
    pub fn success(
        post: &ScheduledPost,
        platform: PlatformKind,
        content: &str,
        platform_post_id: String,
        posted_at: i64,
    ) -> Self {
        Self {
            id: None,
            user_id: post.user_id.clone(),
            scheduled_post_id: Some(post.id.clone()),
            platform,
            content: content.to_string(),
            status: HistoryStatus::Success,
            platform_post_id: Some(platform_post_id),
            error_message: None,
            posted_at,
        }
    }

    pub fn failure(
        post: &ScheduledPost,
        platform: PlatformKind,
        content: &str,
        error_message: String,
        posted_at: i64,
    ) -> Self {
        Self {
            id: None,
            user_id: post.user_id.clone(),
            scheduled_post_id: Some(post.id.clone()),
            platform,
            content: content.to_string(),
            status: HistoryStatus::Failed,
            platform_post_id: None,
            error_message: Some(error_message),
            posted_at,
        }
    }
}

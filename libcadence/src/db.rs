//! Database operations for Cadence
//!
//! Owns the four tables the processor and the CLI tools share: `profiles`
//! (credentials), `post_templates`, `scheduled_posts` and the append-only
//! `post_history`.

use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{CadenceError, DbError, Result};
use crate::types::{
    Credentials, HistoryRecord, HistoryStatus, Interval, PlatformContent, PlatformKind,
    ScheduleStatus, ScheduledPost, Template,
};

const SCHEDULE_COLUMNS: &str = "id, user_id, template_id, interval_value, interval_unit, \
     next_post_time, last_posted_at, status, post_to_threads, post_to_linkedin, \
     post_to_instagram, threads_content, linkedin_content, instagram_content, \
     generated_content, created_at";

/// Filters for history queries; `None` fields match everything
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub user_id: Option<String>,
    pub platform: Option<PlatformKind>,
    pub status: Option<HistoryStatus>,
    pub scheduled_post_id: Option<String>,
    /// Case-insensitive substring match on the published text
    pub search: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: usize,
}

/// Attempt counts for one platform
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PlatformCounts {
    pub platform: String,
    pub success: i64,
    pub failed: i64,
}

/// A due `scheduled_posts` row that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptSchedule {
    pub id: String,
    pub reason: String,
}

/// One entry of [`Database::get_due_posts`]
pub type DueSchedule = std::result::Result<ScheduledPost, CorruptSchedule>;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // Forward slashes keep the URL valid on Windows; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Fetch a user's credentials; `None` when the user has no profile row
    pub async fn get_credentials(&self, user_id: &str) -> Result<Option<Credentials>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, threads_app_id, threads_access_token, linkedin_access_token,
                   instagram_user_id, instagram_access_token
            FROM profiles WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| {
            let secret = |column: &str| -> Option<SecretString> {
                r.get::<Option<String>, _>(column).map(SecretString::from)
            };
            Credentials {
                user_id: r.get("user_id"),
                threads_app_id: r.get("threads_app_id"),
                threads_access_token: secret("threads_access_token"),
                linkedin_access_token: secret("linkedin_access_token"),
                instagram_user_id: r.get("instagram_user_id"),
                instagram_access_token: secret("instagram_access_token"),
            }
        }))
    }

    /// Store the credentials for one platform, leaving the others untouched
    ///
    /// `account_id` is the Threads app id or the Instagram user id and is
    /// ignored for LinkedIn.
    pub async fn set_platform_credentials(
        &self,
        user_id: &str,
        platform: PlatformKind,
        account_id: Option<&str>,
        token: &SecretString,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let (id_column, token_column) = credential_columns(platform);
        if id_column.is_some() && account_id.map_or(true, |id| id.trim().is_empty()) {
            return Err(CadenceError::InvalidInput(format!(
                "{} credentials require an account id",
                platform
            )));
        }

        let sql = match id_column {
            Some(id_column) => format!(
                "INSERT INTO profiles (user_id, {id}, {token}, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(user_id) DO UPDATE SET {id} = excluded.{id}, \
                 {token} = excluded.{token}, updated_at = excluded.updated_at",
                id = id_column,
                token = token_column
            ),
            None => format!(
                "INSERT INTO profiles (user_id, {token}, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(user_id) DO UPDATE SET {token} = excluded.{token}, \
                 updated_at = excluded.updated_at",
                token = token_column
            ),
        };

        let mut query = sqlx::query(&sql).bind(user_id);
        if id_column.is_some() {
            query = query.bind(account_id.map(str::trim));
        }
        query
            .bind(token.expose_secret().trim())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Remove one platform's credentials; returns false if the user has no profile
    pub async fn clear_platform_credentials(
        &self,
        user_id: &str,
        platform: PlatformKind,
    ) -> Result<bool> {
        let (id_column, token_column) = credential_columns(platform);
        let sql = match id_column {
            Some(id_column) => format!(
                "UPDATE profiles SET {} = NULL, {} = NULL, updated_at = ? WHERE user_id = ?",
                id_column, token_column
            ),
            None => format!(
                "UPDATE profiles SET {} = NULL, updated_at = ? WHERE user_id = ?",
                token_column
            ),
        };

        let result = sqlx::query(&sql)
            .bind(chrono::Utc::now().timestamp())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub async fn create_template(&self, template: &Template) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_templates (id, user_id, title, comment, language, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.user_id)
        .bind(&template.title)
        .bind(&template.comment)
        .bind(&template.language)
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_template(&self, template_id: &str) -> Result<Option<Template>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, comment, language, created_at
            FROM post_templates WHERE id = ?
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.as_ref().map(row_to_template))
    }

    pub async fn list_templates(&self, user_id: &str) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, comment, language, created_at
            FROM post_templates WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_template).collect())
    }

    /// Delete a template; refuses while any schedule still references it
    pub async fn delete_template(&self, template_id: &str) -> Result<bool> {
        let in_use: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scheduled_posts WHERE template_id = ?")
                .bind(template_id)
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        if in_use > 0 {
            return Err(CadenceError::InvalidInput(format!(
                "Template {} is used by {} schedule(s); delete those first",
                template_id, in_use
            )));
        }

        let result = sqlx::query("DELETE FROM post_templates WHERE id = ?")
            .bind(template_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Scheduled posts
    // ------------------------------------------------------------------

    pub async fn create_scheduled_post(&self, post: &ScheduledPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (
                id, user_id, template_id, interval_value, interval_unit, next_post_time,
                last_posted_at, status, post_to_threads, post_to_linkedin, post_to_instagram,
                threads_content, linkedin_content, instagram_content, generated_content, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.template_id)
        .bind(i64::from(post.interval.value))
        .bind(post.interval.unit.as_str())
        .bind(post.next_post_time)
        .bind(post.last_posted_at)
        .bind(post.status.as_str())
        .bind(post.is_enabled(PlatformKind::Threads))
        .bind(post.is_enabled(PlatformKind::Linkedin))
        .bind(post.is_enabled(PlatformKind::Instagram))
        .bind(&post.overrides.threads)
        .bind(&post.overrides.linkedin)
        .bind(&post.overrides.instagram)
        .bind(&post.generated_content)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_scheduled_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let sql = format!("SELECT {} FROM scheduled_posts WHERE id = ?", SCHEDULE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_scheduled_post).transpose()
    }

    pub async fn list_scheduled_posts(&self, user_id: &str) -> Result<Vec<ScheduledPost>> {
        let sql = format!(
            "SELECT {} FROM scheduled_posts WHERE user_id = ? ORDER BY next_post_time ASC",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_scheduled_post).collect()
    }

    /// Active schedules whose next post time is at or before `now`
    ///
    /// Rows that fail to decode come back as [`CorruptSchedule`] entries in
    /// place, so one bad row never hides the others. Only the query itself
    /// can fail.
    pub async fn get_due_posts(&self, now: i64) -> Result<Vec<DueSchedule>> {
        let sql = format!(
            "SELECT {} FROM scheduled_posts \
             WHERE status = 'active' AND next_post_time <= ? \
             ORDER BY next_post_time ASC",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|row| {
                row_to_scheduled_post(row).map_err(|e| {
                    let id = row.try_get::<String, _>("id").unwrap_or_default();
                    tracing::warn!(schedule_id = %id, "Skipping unreadable schedule: {}", e);
                    CorruptSchedule {
                        id,
                        reason: e.to_string(),
                    }
                })
            })
            .collect())
    }

    /// Record a successful cycle: stamp `last_posted_at`, move the due time
    /// forward and drop any cached generated content
    pub async fn advance_schedule(
        &self,
        post_id: &str,
        last_posted_at: i64,
        next_post_time: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET last_posted_at = ?, next_post_time = ?, generated_content = NULL
            WHERE id = ?
            "#,
        )
        .bind(last_posted_at)
        .bind(next_post_time)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn set_schedule_status(&self, post_id: &str, status: ScheduleStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduled_posts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_generated_content(&self, post_id: &str, content: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE scheduled_posts SET generated_content = ? WHERE id = ?")
            .bind(content)
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn delete_scheduled_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Append one publish attempt and return its row id
    pub async fn insert_history_record(&self, record: &HistoryRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO post_history (
                user_id, scheduled_post_id, platform, content, status,
                platform_post_id, error_message, posted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.scheduled_post_id)
        .bind(record.platform.as_str())
        .bind(&record.content)
        .bind(record.status.as_str())
        .bind(&record.platform_post_id)
        .bind(&record.error_message)
        .bind(record.posted_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Newest-first history matching `filter`
    pub async fn query_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>> {
        let (where_clause, binds) = history_where(filter);
        let sql = format!(
            "SELECT id, user_id, scheduled_post_id, platform, content, status, \
             platform_post_id, error_message, posted_at \
             FROM post_history WHERE {} ORDER BY posted_at DESC, id DESC LIMIT ?",
            where_clause
        );

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                HistoryBind::Text(value) => query.bind(value),
                HistoryBind::Int(value) => query.bind(value),
            };
        }
        query = query.bind(filter.limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_history_record).collect()
    }

    /// Success/failure counts per platform for records matching `filter`
    ///
    /// `filter.limit` is ignored.
    pub async fn history_counts(&self, filter: &HistoryFilter) -> Result<Vec<PlatformCounts>> {
        let (where_clause, binds) = history_where(filter);
        let sql = format!(
            "SELECT platform, \
             SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END) AS success, \
             SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) AS failed \
             FROM post_history WHERE {} GROUP BY platform ORDER BY platform",
            where_clause
        );

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                HistoryBind::Text(value) => query.bind(value),
                HistoryBind::Int(value) => query.bind(value),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| PlatformCounts {
                platform: r.get("platform"),
                success: r.get("success"),
                failed: r.get("failed"),
            })
            .collect())
    }
}

fn credential_columns(platform: PlatformKind) -> (Option<&'static str>, &'static str) {
    match platform {
        PlatformKind::Threads => (Some("threads_app_id"), "threads_access_token"),
        PlatformKind::Linkedin => (None, "linkedin_access_token"),
        PlatformKind::Instagram => (Some("instagram_user_id"), "instagram_access_token"),
    }
}

enum HistoryBind {
    Text(String),
    Int(i64),
}

fn history_where(filter: &HistoryFilter) -> (String, Vec<HistoryBind>) {
    let mut clauses = vec!["1=1"];
    let mut binds = Vec::new();

    if let Some(ref user_id) = filter.user_id {
        clauses.push("user_id = ?");
        binds.push(HistoryBind::Text(user_id.clone()));
    }
    if let Some(platform) = filter.platform {
        clauses.push("platform = ?");
        binds.push(HistoryBind::Text(platform.as_str().to_string()));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        binds.push(HistoryBind::Text(status.as_str().to_string()));
    }
    if let Some(ref schedule_id) = filter.scheduled_post_id {
        clauses.push("scheduled_post_id = ?");
        binds.push(HistoryBind::Text(schedule_id.clone()));
    }
    if let Some(ref search) = filter.search {
        clauses.push("LOWER(content) LIKE '%' || LOWER(?) || '%'");
        binds.push(HistoryBind::Text(search.clone()));
    }
    if let Some(since) = filter.since {
        clauses.push("posted_at >= ?");
        binds.push(HistoryBind::Int(since));
    }
    if let Some(until) = filter.until {
        clauses.push("posted_at <= ?");
        binds.push(HistoryBind::Int(until));
    }

    (clauses.join(" AND "), binds)
}

fn corrupt(table: &'static str, reason: String) -> CadenceError {
    DbError::CorruptRow { table, reason }.into()
}

fn row_to_template(r: &SqliteRow) -> Template {
    Template {
        id: r.get("id"),
        user_id: r.get("user_id"),
        title: r.get("title"),
        comment: r.get("comment"),
        language: r.get("language"),
        created_at: r.get("created_at"),
    }
}

fn row_to_scheduled_post(r: &SqliteRow) -> Result<ScheduledPost> {
    let id: String = r.get("id");

    let raw_value: i64 = r.get("interval_value");
    let value = u32::try_from(raw_value)
        .map_err(|_| corrupt("scheduled_posts", format!("{}: interval {}", id, raw_value)))?;
    let unit = r
        .get::<String, _>("interval_unit")
        .parse()
        .map_err(|e: CadenceError| corrupt("scheduled_posts", format!("{}: {}", id, e)))?;
    let interval = Interval::new(value, unit)
        .map_err(|e| corrupt("scheduled_posts", format!("{}: {}", id, e)))?;

    let status: ScheduleStatus = r
        .get::<String, _>("status")
        .parse()
        .map_err(|e: CadenceError| corrupt("scheduled_posts", format!("{}: {}", id, e)))?;

    let platforms = PlatformKind::ALL
        .into_iter()
        .filter(|kind| {
            let column = match kind {
                PlatformKind::Threads => "post_to_threads",
                PlatformKind::Linkedin => "post_to_linkedin",
                PlatformKind::Instagram => "post_to_instagram",
            };
            r.get::<i64, _>(column) != 0
        })
        .collect();

    Ok(ScheduledPost {
        id,
        user_id: r.get("user_id"),
        template_id: r.get("template_id"),
        interval,
        next_post_time: r.get("next_post_time"),
        last_posted_at: r.get("last_posted_at"),
        status,
        platforms,
        overrides: PlatformContent {
            threads: r.get("threads_content"),
            linkedin: r.get("linkedin_content"),
            instagram: r.get("instagram_content"),
        },
        generated_content: r.get("generated_content"),
        created_at: r.get("created_at"),
    })
}

fn row_to_history_record(r: &SqliteRow) -> Result<HistoryRecord> {
    let id: i64 = r.get("id");
    let platform = r
        .get::<String, _>("platform")
        .parse()
        .map_err(|e: CadenceError| corrupt("post_history", format!("{}: {}", id, e)))?;
    let status = r
        .get::<String, _>("status")
        .parse()
        .map_err(|e: CadenceError| corrupt("post_history", format!("{}: {}", id, e)))?;

    Ok(HistoryRecord {
        id: Some(id),
        user_id: r.get("user_id"),
        scheduled_post_id: r.get("scheduled_post_id"),
        platform,
        content: r.get("content"),
        status,
        platform_post_id: r.get("platform_post_id"),
        error_message: r.get("error_message"),
        posted_at: r.get("posted_at"),
    })
}

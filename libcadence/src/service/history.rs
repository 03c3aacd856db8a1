//! History service for querying publish attempts
//!
//! Backs `cadence-history`: newest-first listings with filters, and
//! per-platform success statistics.

use serde::Serialize;

use crate::db::{Database, HistoryFilter};
use crate::types::HistoryRecord;
use crate::Result;

/// Default number of records returned by a listing
pub const DEFAULT_LIMIT: usize = 100;

pub struct HistoryService {
    db: Database,
}

/// Statistics for a single platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    pub platform: String,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    /// Percentage of successful attempts
    pub success_rate: f64,
}

/// Statistics about publish history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub platforms: Vec<PlatformStats>,
}

impl HistoryService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List records matching `filter`, newest first
    ///
    /// A zero limit falls back to [`DEFAULT_LIMIT`].
    pub async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>> {
        if filter.limit == 0 {
            let filter = HistoryFilter {
                limit: DEFAULT_LIMIT,
                ..filter.clone()
            };
            return self.db.query_history(&filter).await;
        }
        self.db.query_history(filter).await
    }

    /// Success and failure totals for records matching `filter`
    pub async fn stats(&self, filter: &HistoryFilter) -> Result<HistoryStats> {
        let counts = self.db.history_counts(filter).await?;

        let platforms: Vec<PlatformStats> = counts
            .into_iter()
            .map(|c| {
                let total = c.success + c.failed;
                PlatformStats {
                    platform: c.platform,
                    total,
                    successful: c.success,
                    failed: c.failed,
                    success_rate: success_rate(c.success, total),
                }
            })
            .collect();

        Ok(HistoryStats {
            total: platforms.iter().map(|p| p.total).sum(),
            successful: platforms.iter().map(|p| p.successful).sum(),
            failed: platforms.iter().map(|p| p.failed).sum(),
            platforms,
        })
    }
}

fn success_rate(successful: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (successful as f64 / total as f64) * 100.0
    }
}

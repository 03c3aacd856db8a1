//! Service layer for Cadence
//!
//! Business logic shared by the command-line tools, on top of [`Database`].
//!
//! - `ScheduleService`: templates, schedules and content previews
//! - `HistoryService`: query and summarise publish history
//!
//! # Example
//!
//! ```no_run
//! use libcadence::service::CadenceService;
//!
//! # async fn example() -> libcadence::Result<()> {
//! let service = CadenceService::new().await?;
//! let user_id = service.config().defaults.user_id.clone();
//!
//! for schedule in service.schedules().list(&user_id).await? {
//!     println!("{} {}", schedule.id, schedule.interval);
//! }
//! # Ok(())
//! # }
//! ```

pub mod history;
pub mod schedule;

use self::history::HistoryService;
use self::schedule::ScheduleService;
use crate::{Config, Database, Result};

/// Facade owning the shared database handle and configuration
pub struct CadenceService {
    config: Config,
    db: Database,
    schedules: ScheduleService,
    history: HistoryService,
}

impl CadenceService {
    /// Load configuration from the default location and open the database
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the database
    /// cannot be opened or migrated.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;

        Ok(Self {
            schedules: ScheduleService::new(db.clone()),
            history: HistoryService::new(db.clone()),
            config,
            db,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn schedules(&self) -> &ScheduleService {
        &self.schedules
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }
}

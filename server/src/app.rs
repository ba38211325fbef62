//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::Settings;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    mailer, AuthService, LabelsService, Mailer, NotesService, ReminderScheduler, RemindersService,
    TokenService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub repo: Repository,
    pub auth: AuthService,
    pub notes: NotesService,
    pub labels: LabelsService,
    pub scheduler: ReminderScheduler,
}

impl AppState {
    /// Wire the services over an initialized pool. The scheduler is created
    /// but not started.
    pub async fn new(settings: Settings, pool: SqlitePool, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let settings = Arc::new(settings);
        let repo = Repository::new(pool);

        let tokens = TokenService::from_settings(&settings)?;
        let reminders = RemindersService::new(repo.clone(), Arc::clone(&mailer));
        let scheduler = ReminderScheduler::new(repo.clone(), reminders).await?;

        Ok(Self {
            auth: AuthService::new(repo.clone(), tokens, mailer, Arc::clone(&settings)),
            notes: NotesService::new(repo.clone(), scheduler.clone()),
            labels: LabelsService::new(repo.clone()),
            scheduler,
            repo,
            settings,
        })
    }
}

/// Application setup - called once on startup
pub async fn setup(settings: Settings) -> Result<AppState> {
    tracing::info!("Initializing application");

    let pool = create_pool(&settings.database_path).await?;
    let mailer = mailer::from_settings(&settings)?;

    let state = AppState::new(settings, pool, mailer).await?;

    state.scheduler.restore().await?;
    state.scheduler.start().await?;

    tracing::info!("Application initialized successfully");

    Ok(state)
}

/// Reminder Scheduler
/// Turns note reminders into stored cron schedules and runner jobs
/// Jobs are keyed by periodic task name so a note has at most one
use crate::config::{reminder_task_name, REMINDER_TASK};
use crate::database::{CronFields, Note, Repository, ScheduledTask};
use crate::error::{AppError, Result};
use crate::services::RemindersService;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Split a reminder into cron fields.
///
/// The weekday is reported alongside but the schedule itself matches any
/// weekday, the date fields already pin the day.
pub fn cron_fields(reminder: DateTime<Utc>) -> (CronFields, u32) {
    let weekday = reminder.weekday().num_days_from_monday();

    let fields = CronFields {
        minute: reminder.minute().to_string(),
        hour: reminder.hour().to_string(),
        day_of_month: reminder.day().to_string(),
        month_of_year: reminder.month().to_string(),
        day_of_week: "*".to_string(),
    };

    (fields, weekday)
}

/// Six-field runner expression (seconds first), evaluated in UTC
pub fn cron_expression(fields: &CronFields) -> String {
    format!(
        "0 {} {} {} {} {}",
        fields.minute, fields.hour, fields.day_of_month, fields.month_of_year, fields.day_of_week
    )
}

impl From<&ScheduledTask> for CronFields {
    fn from(task: &ScheduledTask) -> Self {
        Self {
            minute: task.minute.clone(),
            hour: task.hour.clone(),
            day_of_month: task.day_of_month.clone(),
            month_of_year: task.month_of_year.clone(),
            day_of_week: task.day_of_week.clone(),
        }
    }
}

/// Scheduler for reminder emails
#[derive(Clone)]
pub struct ReminderScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    repo: Repository,
    reminders: RemindersService,
    jobs: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl ReminderScheduler {
    /// Create new reminder scheduler
    pub async fn new(repo: Repository, reminders: RemindersService) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            repo,
            reminders,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Start the runner
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Reminder scheduler started");
        Ok(())
    }

    /// Register a job for every stored reminder task. Returns how many were
    /// registered.
    pub async fn restore(&self) -> Result<usize> {
        let tasks = self.repo.list_scheduled_tasks(REMINDER_TASK).await?;
        let mut restored = 0;

        for task in &tasks {
            let note_id = match serde_json::from_str::<Vec<i64>>(&task.args)
                .ok()
                .and_then(|args| args.first().copied())
            {
                Some(id) => id,
                None => {
                    tracing::warn!("Skipping task {} with bad args: {}", task.name, task.args);
                    continue;
                }
            };

            let cron_expr = cron_expression(&CronFields::from(task));
            match self.register_job(&task.name, &cron_expr, note_id).await {
                Ok(()) => restored += 1,
                Err(e) => tracing::error!("Failed to restore task {}: {}", task.name, e),
            }
        }

        tracing::info!("Restored {} of {} reminder tasks", restored, tasks.len());
        Ok(restored)
    }

    /// Schedule (or reschedule) the reminder of `note`.
    ///
    /// Errors are logged and swallowed so the note operation that triggered
    /// scheduling still succeeds.
    pub async fn schedule_reminder(&self, note: &Note) {
        let Some(reminder) = note.reminder else {
            return;
        };

        if let Err(e) = self.try_schedule_reminder(note.id, reminder).await {
            tracing::error!("Error scheduling reminder for note ID {}: {}", note.id, e);
        }
    }

    async fn try_schedule_reminder(&self, note_id: i64, reminder: DateTime<Utc>) -> Result<()> {
        let (fields, weekday) = cron_fields(reminder);

        tracing::info!(
            "Scheduling reminder for note ID {} at {} (weekday {})",
            note_id,
            reminder,
            weekday
        );

        let (schedule, created) = self.repo.get_or_create_crontab(&fields).await?;
        if created {
            tracing::info!("Created new crontab schedule: {}", schedule.id);
        } else {
            tracing::info!("Using existing crontab schedule: {}", schedule.id);
        }

        let name = reminder_task_name(note_id);
        let args = serde_json::to_string(&[note_id])?;
        let (task, created) = self
            .repo
            .upsert_periodic_task(&name, REMINDER_TASK, &args, schedule.id)
            .await?;
        if created {
            tracing::info!("Created new periodic task: {}", task.name);
        } else {
            tracing::info!("Updated existing periodic task: {}", task.name);
        }

        self.register_job(&name, &cron_expression(&fields), note_id).await
    }

    /// Drop the stored task and runner job for `note_id`. Errors are logged
    /// and swallowed.
    pub async fn clear_reminder(&self, note_id: i64) {
        let name = reminder_task_name(note_id);

        match self.repo.delete_periodic_task(&name).await {
            Ok(true) => tracing::info!("Deleted periodic task: {}", name),
            Ok(false) => {}
            Err(e) => tracing::error!("Failed to delete periodic task {}: {}", name, e),
        }

        if let Err(e) = self.deregister_job(&name).await {
            tracing::error!("Failed to remove job {}: {}", name, e);
        }
    }

    /// Add a runner job for `name`, replacing any previous one.
    ///
    /// The job map stays write-locked from removal through insertion, so
    /// concurrent registrations for one name cannot leave an untracked job.
    async fn register_job(&self, name: &str, cron_expr: &str, note_id: i64) -> Result<()> {
        let reminders = self.reminders.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let reminders = reminders.clone();
            Box::pin(async move {
                tracing::info!("Running reminder job for note {}", note_id);

                if let Err(e) = reminders.send_reminder_email(note_id).await {
                    tracing::error!("Reminder email for note {} failed: {}", note_id, e);
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create job {}: {}", name, e)))?;

        // Lock order: jobs, then scheduler
        let mut jobs = self.jobs.write().await;
        let scheduler = self.scheduler.read().await;

        if let Some(old_id) = jobs.remove(name) {
            remove_job(&scheduler, name, old_id).await?;
        }

        let job_id = scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to schedule job {}: {}", name, e)))?;
        jobs.insert(name.to_string(), job_id);

        tracing::info!("Reminder job {} registered ({})", name, cron_expr);
        Ok(())
    }

    async fn deregister_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;

        if let Some(job_id) = jobs.remove(name) {
            let scheduler = self.scheduler.read().await;
            remove_job(&scheduler, name, job_id).await?;
        }

        Ok(())
    }

    /// Names of the jobs currently registered with the runner
    pub async fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Shutdown the runner gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Reminder scheduler shutdown");
        Ok(())
    }
}

async fn remove_job(scheduler: &JobScheduler, name: &str, job_id: Uuid) -> Result<()> {
    scheduler
        .remove(&job_id)
        .await
        .map_err(|e| AppError::Scheduler(format!("Failed to remove job: {}", e)))?;
    tracing::debug!("Removed job {} ({})", name, job_id);
    Ok(())
}

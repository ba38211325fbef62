//! Repository layer for database operations
//!
//! This module provides CRUD operations for all entities. Ownership and
//! visibility filters are expressed in SQL; the decision of who may do what
//! lives in the services layer.

use super::models::*;
use crate::error::Result;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// Append `(?, ?, ...)` with one bound id per element
fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Users =====

    /// Create a new, unverified user
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash, is_verified, phone_number, created_at)
            VALUES (?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.phone_number)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created user: {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(taken)
    }

    pub async fn phone_taken(&self, phone_number: &str) -> Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE phone_number = ?)")
                .bind(phone_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(taken)
    }

    /// Flag a user as verified. Returns false when the user does not exist.
    pub async fn mark_user_verified(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Marked user {} as verified", id);
        Ok(rows > 0)
    }

    /// Subset of `ids` that belong to existing users
    pub async fn existing_user_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE id IN ");
        push_id_list(&mut builder, ids);

        let found = builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;

        Ok(found)
    }

    // ===== Access logs =====

    /// Count one request against (method, url)
    pub async fn record_access(&self, method: &str, url: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_logs (method, url, count) VALUES (?, ?, 1)
            ON CONFLICT (method, url) DO UPDATE SET count = count + 1
            "#,
        )
        .bind(method)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_access_log(&self, method: &str, url: &str) -> Result<Option<AccessLog>> {
        let log = sqlx::query_as::<_, AccessLog>(
            "SELECT * FROM access_logs WHERE method = ? AND url = ?",
        )
        .bind(method)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    // ===== Labels =====

    pub async fn create_label(&self, user_id: i64, name: &str, color: Option<&str>) -> Result<Label> {
        let label = sqlx::query_as::<_, Label>(
            r#"
            INSERT INTO labels (name, color, user_id)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(color)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created label: {} for user: {}", label.id, user_id);
        Ok(label)
    }

    pub async fn list_labels(&self, user_id: i64) -> Result<Vec<Label>> {
        let labels = sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(labels)
    }

    /// Get a label owned by `user_id`
    pub async fn get_label(&self, id: i64, user_id: i64) -> Result<Option<Label>> {
        let label = sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(label)
    }

    pub async fn update_label(
        &self,
        id: i64,
        user_id: i64,
        name: &str,
        color: Option<&str>,
    ) -> Result<Option<Label>> {
        let label = sqlx::query_as::<_, Label>(
            r#"
            UPDATE labels SET name = ?, color = ?
            WHERE id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(color)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }

    pub async fn delete_label(&self, id: i64, user_id: i64) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM labels WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted label: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    /// Subset of `ids` that are labels owned by `user_id`
    pub async fn owned_label_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM labels WHERE user_id = ");
        builder.push_bind(user_id);
        builder.push(" AND id IN ");
        push_id_list(&mut builder, ids);

        let found = builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;

        Ok(found)
    }

    // ===== Notes =====

    /// Create a note owned by `user_id`. The title must already be validated.
    pub async fn create_note(&self, user_id: i64, input: &NoteInput) -> Result<Note> {
        let now = Utc::now();

        let note = sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (title, description, color, image, is_archive, is_trash, reminder,
                               user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(input.title.as_deref().unwrap_or_default())
        .bind(&input.description)
        .bind(&input.color)
        .bind(&input.image)
        .bind(input.is_archive)
        .bind(input.is_trash)
        .bind(input.reminder)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created note: {} for user: {}", note.id, user_id);
        Ok(note)
    }

    pub async fn find_note(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    /// Notes the user owns or collaborates on, narrowed by `filter`
    pub async fn list_visible_notes(&self, user_id: i64, filter: NoteFilter) -> Result<Vec<Note>> {
        let condition = match filter {
            NoteFilter::Active => "n.is_archive = 0 AND n.is_trash = 0",
            NoteFilter::Archived => "n.is_archive = 1",
            NoteFilter::Trashed => "n.is_trash = 1",
        };

        let sql = format!(
            r#"
            SELECT n.* FROM notes n
            WHERE (n.user_id = ?
                   OR EXISTS (SELECT 1 FROM collaborators c
                              WHERE c.note_id = n.id AND c.user_id = ?))
              AND {}
            ORDER BY n.id
            "#,
            condition
        );

        let notes = sqlx::query_as::<_, Note>(&sql)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    /// Write back the editable fields of a merged note
    pub async fn update_note(&self, note: &Note) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = ?, description = ?, color = ?, image = ?, is_archive = ?, is_trash = ?,
                reminder = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&note.title)
        .bind(&note.description)
        .bind(&note.color)
        .bind(&note.image)
        .bind(note.is_archive)
        .bind(note.is_trash)
        .bind(note.reminder)
        .bind(Utc::now())
        .bind(note.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    pub async fn toggle_archive(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            "UPDATE notes SET is_archive = NOT is_archive, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    pub async fn toggle_trash(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            "UPDATE notes SET is_trash = NOT is_trash, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    pub async fn set_note_color(&self, id: i64, color: &str) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            "UPDATE notes SET color = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(color)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    /// Set title and description; color only when given
    pub async fn edit_note(
        &self,
        id: i64,
        title: &str,
        description: &str,
        color: Option<&str>,
    ) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = ?, description = ?, color = COALESCE(?, color), updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(color)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    pub async fn delete_note(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted note: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    // ===== Collaborators =====

    pub async fn list_collaborators(&self, note_id: i64) -> Result<Vec<Collaborator>> {
        let collaborators = sqlx::query_as::<_, Collaborator>(
            "SELECT * FROM collaborators WHERE note_id = ? ORDER BY id",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(collaborators)
    }

    /// Share a note. Existing (note, user) pairs are left untouched.
    pub async fn add_collaborators(
        &self,
        note_id: i64,
        user_ids: &[i64],
        access_type: AccessType,
    ) -> Result<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT INTO collaborators (note_id, user_id, access_type) ");
        builder.push_values(user_ids, |mut row, user_id| {
            row.push_bind(note_id)
                .push_bind(*user_id)
                .push_bind(access_type);
        });
        builder.push(" ON CONFLICT (note_id, user_id) DO NOTHING");

        let inserted = builder.build().execute(&self.pool).await?.rows_affected();

        tracing::debug!("Added {} collaborators to note: {}", inserted, note_id);
        Ok(inserted)
    }

    pub async fn remove_collaborators(&self, note_id: i64, user_ids: &[i64]) -> Result<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM collaborators WHERE note_id = ");
        builder.push_bind(note_id);
        builder.push(" AND user_id IN ");
        push_id_list(&mut builder, user_ids);

        let removed = builder.build().execute(&self.pool).await?.rows_affected();

        tracing::debug!("Removed {} collaborators from note: {}", removed, note_id);
        Ok(removed)
    }

    // ===== Note labels =====

    pub async fn note_label_ids(&self, note_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT label_id FROM note_labels WHERE note_id = ? ORDER BY label_id",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    pub async fn add_note_labels(&self, note_id: i64, label_ids: &[i64]) -> Result<u64> {
        if label_ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO note_labels (note_id, label_id) ");
        builder.push_values(label_ids, |mut row, label_id| {
            row.push_bind(note_id).push_bind(*label_id);
        });
        builder.push(" ON CONFLICT (note_id, label_id) DO NOTHING");

        let inserted = builder.build().execute(&self.pool).await?.rows_affected();
        Ok(inserted)
    }

    pub async fn remove_note_labels(&self, note_id: i64, label_ids: &[i64]) -> Result<u64> {
        if label_ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM note_labels WHERE note_id = ");
        builder.push_bind(note_id);
        builder.push(" AND label_id IN ");
        push_id_list(&mut builder, label_ids);

        let removed = builder.build().execute(&self.pool).await?.rows_affected();
        Ok(removed)
    }

    // ===== Reminder schedules =====

    /// Find the schedule with these exact fields, creating it if needed.
    /// The flag is true when a new row was inserted.
    pub async fn get_or_create_crontab(&self, fields: &CronFields) -> Result<(CrontabSchedule, bool)> {
        let created = sqlx::query(
            r#"
            INSERT INTO crontab_schedules (minute, hour, day_of_month, month_of_year, day_of_week)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (minute, hour, day_of_month, month_of_year, day_of_week) DO NOTHING
            "#,
        )
        .bind(&fields.minute)
        .bind(&fields.hour)
        .bind(&fields.day_of_month)
        .bind(&fields.month_of_year)
        .bind(&fields.day_of_week)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        let schedule = sqlx::query_as::<_, CrontabSchedule>(
            r#"
            SELECT * FROM crontab_schedules
            WHERE minute = ? AND hour = ? AND day_of_month = ? AND month_of_year = ? AND day_of_week = ?
            "#,
        )
        .bind(&fields.minute)
        .bind(&fields.hour)
        .bind(&fields.day_of_month)
        .bind(&fields.month_of_year)
        .bind(&fields.day_of_week)
        .fetch_one(&self.pool)
        .await?;

        Ok((schedule, created))
    }

    pub async fn get_crontab(&self, id: i64) -> Result<Option<CrontabSchedule>> {
        let schedule = sqlx::query_as::<_, CrontabSchedule>("SELECT * FROM crontab_schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(schedule)
    }

    /// Create the named task or point the existing one at a new schedule.
    /// The flag is true when a new row was inserted.
    pub async fn upsert_periodic_task(
        &self,
        name: &str,
        task: &str,
        args: &str,
        crontab_id: i64,
    ) -> Result<(PeriodicTask, bool)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM periodic_tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

        let periodic_task = match existing {
            Some(id) => {
                sqlx::query_as::<_, PeriodicTask>(
                    r#"
                    UPDATE periodic_tasks
                    SET task = ?, args = ?, crontab_id = ?, enabled = 1, updated_at = ?
                    WHERE id = ?
                    RETURNING *
                    "#,
                )
                .bind(task)
                .bind(args)
                .bind(crontab_id)
                .bind(now)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, PeriodicTask>(
                    r#"
                    INSERT INTO periodic_tasks (name, task, args, crontab_id, enabled, updated_at)
                    VALUES (?, ?, ?, ?, 1, ?)
                    RETURNING *
                    "#,
                )
                .bind(name)
                .bind(task)
                .bind(args)
                .bind(crontab_id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok((periodic_task, existing.is_none()))
    }

    pub async fn find_periodic_task(&self, name: &str) -> Result<Option<PeriodicTask>> {
        let task = sqlx::query_as::<_, PeriodicTask>("SELECT * FROM periodic_tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    pub async fn delete_periodic_task(&self, name: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM periodic_tasks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Enabled tasks of the given kind together with their schedules
    pub async fn list_scheduled_tasks(&self, task: &str) -> Result<Vec<ScheduledTask>> {
        let tasks = sqlx::query_as::<_, ScheduledTask>(
            r#"
            SELECT t.name, t.args, c.minute, c.hour, c.day_of_month, c.month_of_year, c.day_of_week
            FROM periodic_tasks t
            JOIN crontab_schedules c ON c.id = t.crontab_id
            WHERE t.enabled = 1 AND t.task = ?
            ORDER BY t.id
            "#,
        )
        .bind(task)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }
}

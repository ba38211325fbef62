//! Notes service
//!
//! High-level business logic for notes operations.
//! Every operation resolves the caller's rights on the note first, then
//! touches the repository and keeps the reminder schedule in step.

use crate::database::{
    AccessType, CollaboratorView, EditNoteInput, Note, NoteFilter, NoteInput, NoteUpdate, NoteView,
    Repository,
};
use crate::error::{AppError, Result};
use crate::services::access::{can_access, Intent};
use crate::services::validation;
use crate::services::ReminderScheduler;
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of sharing a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaboratorReport {
    /// Requested ids that belong to existing users
    pub added: Vec<i64>,
    /// Requested ids with no matching user
    pub not_found: Vec<i64>,
}

impl CollaboratorReport {
    pub fn is_partial(&self) -> bool {
        !self.not_found.is_empty()
    }
}

/// Drop repeated ids, keeping the first occurrence
fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut unique = ids.to_vec();
    unique.retain(|id| seen.insert(*id));
    unique
}

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    scheduler: ReminderScheduler,
}

impl NotesService {
    pub fn new(repo: Repository, scheduler: ReminderScheduler) -> Self {
        Self { repo, scheduler }
    }

    /// Load a note the caller may act on.
    ///
    /// Invisible notes are reported as missing. A read-only collaborator
    /// asking to write gets `Forbidden`.
    async fn authorize(&self, note_id: i64, user_id: i64, intent: Intent) -> Result<Note> {
        let note = self
            .repo
            .find_note(note_id)
            .await?
            .ok_or(AppError::NoteNotFound(note_id))?;
        let collaborators = self.repo.list_collaborators(note_id).await?;

        if can_access(user_id, &note, &collaborators, intent) {
            return Ok(note);
        }

        if intent == Intent::Write && can_access(user_id, &note, &collaborators, Intent::Read) {
            return Err(AppError::Forbidden(
                "You do not have permission to edit this note".to_string(),
            ));
        }

        Err(AppError::NoteNotFound(note_id))
    }

    /// Load a note owned by the caller. Anyone else sees it as missing.
    async fn require_owner(&self, note_id: i64, user_id: i64) -> Result<Note> {
        match self.repo.find_note(note_id).await? {
            Some(note) if note.user_id == user_id => Ok(note),
            _ => Err(AppError::NoteNotFound(note_id)),
        }
    }

    async fn view(&self, note: Note) -> Result<NoteView> {
        let labels = self.repo.note_label_ids(note.id).await?;
        let collaborators = self
            .repo
            .list_collaborators(note.id)
            .await?
            .into_iter()
            .map(|c| CollaboratorView {
                user_id: c.user_id,
                access_type: c.access_type,
            })
            .collect();

        Ok(NoteView {
            note,
            labels,
            collaborators,
        })
    }

    /// Note returned by a repository update, missing if it vanished meanwhile
    async fn updated_view(&self, note_id: i64, note: Option<Note>) -> Result<NoteView> {
        self.view(note.ok_or(AppError::NoteNotFound(note_id))?).await
    }

    /// Create a new note
    pub async fn create_note(&self, user_id: i64, input: NoteInput) -> Result<NoteView> {
        validation::validate_note(&input)?;

        let note = self.repo.create_note(user_id, &input).await?;
        tracing::info!("Note created successfully: {}", note.id);

        self.scheduler.schedule_reminder(&note).await;

        self.view(note).await
    }

    pub async fn get_note(&self, note_id: i64, user_id: i64) -> Result<NoteView> {
        let note = self.authorize(note_id, user_id, Intent::Read).await?;
        self.view(note).await
    }

    /// Notes the user owns or collaborates on
    pub async fn list_notes(&self, user_id: i64, filter: NoteFilter) -> Result<Vec<NoteView>> {
        let notes = self.repo.list_visible_notes(user_id, filter).await?;

        let mut views = Vec::with_capacity(notes.len());
        for note in notes {
            views.push(self.view(note).await?);
        }
        Ok(views)
    }

    /// Update the fields present in `input`, keeping the rest.
    ///
    /// The reminder schedule follows the request: a new reminder is
    /// (re)scheduled, an explicit `null` clears it, and an absent reminder
    /// leaves it alone.
    pub async fn update_note(&self, note_id: i64, user_id: i64, input: NoteUpdate) -> Result<NoteView> {
        validation::validate_note(&NoteInput {
            title: input.title.clone(),
            color: input.color.clone().flatten(),
            ..Default::default()
        })?;
        let current = self.authorize(note_id, user_id, Intent::Write).await?;

        tracing::debug!("Updating note: {}", note_id);
        let reminder_change = input.reminder;
        let note = self
            .repo
            .update_note(&input.apply(current))
            .await?
            .ok_or(AppError::NoteNotFound(note_id))?;

        match reminder_change {
            Some(Some(_)) => self.scheduler.schedule_reminder(&note).await,
            Some(None) => self.scheduler.clear_reminder(note.id).await,
            None => {}
        }

        self.view(note).await
    }

    /// Delete a note and its reminder
    pub async fn delete_note(&self, note_id: i64, user_id: i64) -> Result<()> {
        self.require_owner(note_id, user_id).await?;

        self.repo.delete_note(note_id).await?;
        self.scheduler.clear_reminder(note_id).await;

        tracing::info!("Note deleted successfully: {}", note_id);
        Ok(())
    }

    pub async fn toggle_archive(&self, note_id: i64, user_id: i64) -> Result<NoteView> {
        self.authorize(note_id, user_id, Intent::Write).await?;
        let note = self.repo.toggle_archive(note_id).await?;
        self.updated_view(note_id, note).await
    }

    pub async fn toggle_trash(&self, note_id: i64, user_id: i64) -> Result<NoteView> {
        self.authorize(note_id, user_id, Intent::Write).await?;
        let note = self.repo.toggle_trash(note_id).await?;
        self.updated_view(note_id, note).await
    }

    pub async fn change_color(
        &self,
        note_id: i64,
        user_id: i64,
        color: Option<String>,
    ) -> Result<NoteView> {
        let note = self.authorize(note_id, user_id, Intent::Write).await?;
        let color = color.ok_or(AppError::MissingField("color"))?;
        validation::validate_note_color(&color)?;

        let note = self.repo.set_note_color(note.id, &color).await?;
        self.updated_view(note_id, note).await
    }

    /// Set title and description, and color when given
    pub async fn edit_note(&self, note_id: i64, user_id: i64, input: EditNoteInput) -> Result<NoteView> {
        self.authorize(note_id, user_id, Intent::Write).await?;

        let title = input.title.ok_or(AppError::MissingField("title"))?;
        let description = input.description.ok_or(AppError::MissingField("description"))?;
        let color = input.color.filter(|c| !c.is_empty());

        validation::validate_note_edit(&title, color.as_deref())?;

        let note = self
            .repo
            .edit_note(note_id, &title, &description, color.as_deref())
            .await?;
        self.updated_view(note_id, note).await
    }

    /// Share a note with other users. Unknown ids are skipped and reported.
    pub async fn add_collaborators(
        &self,
        note_id: i64,
        user_id: i64,
        user_ids: &[i64],
        access_type: AccessType,
    ) -> Result<CollaboratorReport> {
        if user_ids.is_empty() {
            return Err(AppError::BadRequest("Invalid data format for user_ids".to_string()));
        }

        let note = self.require_owner(note_id, user_id).await?;

        if user_ids.contains(&note.user_id) {
            return Err(AppError::BadRequest(
                "Owner cannot be added as a collaborator".to_string(),
            ));
        }

        let requested = dedup_ids(user_ids);
        let existing = self.repo.existing_user_ids(&requested).await?;
        let (added, not_found): (Vec<i64>, Vec<i64>) =
            requested.into_iter().partition(|id| existing.contains(id));

        self.repo.add_collaborators(note_id, &added, access_type).await?;

        if !not_found.is_empty() {
            tracing::warn!("Unknown collaborator ids for note {}: {:?}", note_id, not_found);
        }

        Ok(CollaboratorReport { added, not_found })
    }

    /// Revoke access. Ids that are not collaborators are ignored.
    pub async fn remove_collaborators(&self, note_id: i64, user_id: i64, user_ids: &[i64]) -> Result<u64> {
        if user_ids.is_empty() {
            return Err(AppError::BadRequest("Invalid data format for user_ids".to_string()));
        }

        self.require_owner(note_id, user_id).await?;
        self.repo.remove_collaborators(note_id, user_ids).await
    }

    /// Attach the caller's labels. Labels they don't own are ignored.
    pub async fn add_labels(&self, note_id: i64, user_id: i64, label_ids: &[i64]) -> Result<NoteView> {
        if label_ids.is_empty() {
            return Err(AppError::BadRequest("Invalid input data".to_string()));
        }

        let note = self.require_owner(note_id, user_id).await?;

        let owned = self.repo.owned_label_ids(user_id, &dedup_ids(label_ids)).await?;
        self.repo.add_note_labels(note_id, &owned).await?;

        self.view(note).await
    }

    pub async fn remove_labels(&self, note_id: i64, user_id: i64, label_ids: &[i64]) -> Result<NoteView> {
        if label_ids.is_empty() {
            return Err(AppError::BadRequest("Invalid input data".to_string()));
        }

        let note = self.require_owner(note_id, user_id).await?;
        self.repo.remove_note_labels(note_id, label_ids).await?;

        self.view(note).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::reminder_task_name;
    use crate::database::{create_memory_pool, parse_timestamp, NewUser};
    use crate::services::mailer::MemoryMailer;
    use crate::services::RemindersService;
    use std::sync::Arc;

    struct Fixture {
        service: NotesService,
        repo: Repository,
        owner: i64,
        editor: i64,
        viewer: i64,
        stranger: i64,
    }

    async fn create_user(repo: &Repository, name: &str) -> i64 {
        repo.create_user(NewUser {
            email: format!("{}@example.com", name),
            username: name.to_string(),
            password_hash: "hash".to_string(),
            phone_number: None,
        })
        .await
        .unwrap()
        .id
    }

    async fn fixture() -> Fixture {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let reminders = RemindersService::new(repo.clone(), Arc::new(MemoryMailer::new()));
        let scheduler = ReminderScheduler::new(repo.clone(), reminders).await.unwrap();

        Fixture {
            service: NotesService::new(repo.clone(), scheduler),
            owner: create_user(&repo, "owner").await,
            editor: create_user(&repo, "editor").await,
            viewer: create_user(&repo, "viewer").await,
            stranger: create_user(&repo, "stranger").await,
            repo,
        }
    }

    fn input(title: &str) -> NoteInput {
        NoteInput {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn update(title: &str) -> NoteUpdate {
        NoteUpdate {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    /// Note owned by `owner`, shared read-write with `editor` and read-only
    /// with `viewer`
    async fn shared_note(f: &Fixture) -> i64 {
        let note = f.service.create_note(f.owner, input("shared")).await.unwrap();
        f.service
            .add_collaborators(note.note.id, f.owner, &[f.editor], AccessType::ReadWrite)
            .await
            .unwrap();
        f.service
            .add_collaborators(note.note.id, f.owner, &[f.viewer], AccessType::ReadOnly)
            .await
            .unwrap();
        note.note.id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_create_requires_title() {
        let f = fixture().await;

        let err = f
            .service
            .create_note(f.owner, NoteInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_create_with_reminder_schedules_task() {
        let f = fixture().await;

        let note = f
            .service
            .create_note(
                f.owner,
                NoteInput {
                    reminder: parse_timestamp("2024-08-26T11:50"),
                    ..input("t")
                },
            )
            .await
            .unwrap();

        let task = f
            .repo
            .find_periodic_task(&reminder_task_name(note.note.id))
            .await
            .unwrap();
        assert!(task.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_keeps_absent_fields() {
        let f = fixture().await;
        let note = f
            .service
            .create_note(
                f.owner,
                NoteInput {
                    description: Some("body".into()),
                    color: Some("red".into()),
                    is_archive: true,
                    reminder: parse_timestamp("2024-08-26T11:50"),
                    ..input("t")
                },
            )
            .await
            .unwrap();

        let view = f
            .service
            .update_note(note.note.id, f.owner, update("t2"))
            .await
            .unwrap();

        assert_eq!(view.note.title, "t2");
        assert_eq!(view.note.description.as_deref(), Some("body"));
        assert_eq!(view.note.color.as_deref(), Some("red"));
        assert!(view.note.is_archive);
        assert_eq!(view.note.reminder, parse_timestamp("2024-08-26T11:50"));

        let task = f
            .repo
            .find_periodic_task(&reminder_task_name(note.note.id))
            .await
            .unwrap();
        assert!(task.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_with_null_reminder_clears_task() {
        let f = fixture().await;
        let note = f
            .service
            .create_note(
                f.owner,
                NoteInput {
                    reminder: parse_timestamp("2024-08-26T11:50"),
                    ..input("t")
                },
            )
            .await
            .unwrap();

        let view = f
            .service
            .update_note(
                note.note.id,
                f.owner,
                NoteUpdate {
                    reminder: Some(None),
                    ..update("t")
                },
            )
            .await
            .unwrap();
        assert!(view.note.reminder.is_none());

        let task = f
            .repo
            .find_periodic_task(&reminder_task_name(note.note.id))
            .await
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_requires_title() {
        let f = fixture().await;
        let note = f.service.create_note(f.owner, input("t")).await.unwrap();

        let err = f
            .service
            .update_note(note.note.id, f.owner, NoteUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_access_by_role() {
        let f = fixture().await;
        let id = shared_note(&f).await;

        assert!(f.service.get_note(id, f.viewer).await.is_ok());
        assert!(f.service.update_note(id, f.editor, update("edited")).await.is_ok());

        let err = f.service.update_note(id, f.viewer, update("nope")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = f.service.get_note(id, f.stranger).await.unwrap_err();
        assert!(matches!(err, AppError::NoteNotFound(_)));
        let err = f.service.toggle_trash(id, f.stranger).await.unwrap_err();
        assert!(matches!(err, AppError::NoteNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_only_owner_deletes() {
        let f = fixture().await;
        let id = shared_note(&f).await;

        let err = f.service.delete_note(id, f.editor).await.unwrap_err();
        assert!(matches!(err, AppError::NoteNotFound(_)));

        f.service.delete_note(id, f.owner).await.unwrap();
        assert!(f.repo.find_note(id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_view_lists_collaborators() {
        let f = fixture().await;
        let id = shared_note(&f).await;

        let view = f.service.get_note(id, f.owner).await.unwrap();
        assert_eq!(
            view.collaborators,
            vec![
                CollaboratorView {
                    user_id: f.editor,
                    access_type: AccessType::ReadWrite
                },
                CollaboratorView {
                    user_id: f.viewer,
                    access_type: AccessType::ReadOnly
                },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_owner_cannot_collaborate() {
        let f = fixture().await;
        let note = f.service.create_note(f.owner, input("t")).await.unwrap();

        let err = f
            .service
            .add_collaborators(note.note.id, f.owner, &[f.owner, f.editor], AccessType::ReadWrite)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(f.repo.list_collaborators(note.note.id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_partial_collaborator_success() {
        let f = fixture().await;
        let note = f.service.create_note(f.owner, input("t")).await.unwrap();

        let report = f
            .service
            .add_collaborators(note.note.id, f.owner, &[f.editor, 9999], AccessType::ReadWrite)
            .await
            .unwrap();

        assert!(report.is_partial());
        assert_eq!(report.added, vec![f.editor]);
        assert_eq!(report.not_found, vec![9999]);
        assert_eq!(f.repo.list_collaborators(note.note.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remove_collaborators() {
        let f = fixture().await;
        let id = shared_note(&f).await;

        let err = f
            .service
            .remove_collaborators(id, f.editor, &[f.viewer])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoteNotFound(_)));

        assert_eq!(
            f.service
                .remove_collaborators(id, f.owner, &[f.viewer, f.stranger])
                .await
                .unwrap(),
            1
        );
        assert!(f.service.get_note(id, f.viewer).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_listings_include_shared_notes() {
        let f = fixture().await;
        let id = shared_note(&f).await;

        let viewer_notes = f.service.list_notes(f.viewer, NoteFilter::Active).await.unwrap();
        assert_eq!(viewer_notes.len(), 1);
        assert_eq!(viewer_notes[0].note.id, id);

        f.service.toggle_archive(id, f.owner).await.unwrap();
        assert!(f
            .service
            .list_notes(f.viewer, NoteFilter::Active)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            f.service
                .list_notes(f.viewer, NoteFilter::Archived)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(f
            .service
            .list_notes(f.stranger, NoteFilter::Archived)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_labels_must_be_owned() {
        let f = fixture().await;
        let note = f.service.create_note(f.owner, input("t")).await.unwrap();
        let mine = f.repo.create_label(f.owner, "mine", None).await.unwrap();
        let theirs = f.repo.create_label(f.stranger, "theirs", None).await.unwrap();

        let view = f
            .service
            .add_labels(note.note.id, f.owner, &[mine.id, theirs.id, 777])
            .await
            .unwrap();
        assert_eq!(view.labels, vec![mine.id]);

        let view = f
            .service
            .remove_labels(note.note.id, f.owner, &[mine.id])
            .await
            .unwrap();
        assert!(view.labels.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_change_color_and_edit() {
        let f = fixture().await;
        let note = f.service.create_note(f.owner, input("t")).await.unwrap();
        let id = note.note.id;

        let err = f.service.change_color(id, f.owner, None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("color")));

        let view = f
            .service
            .change_color(id, f.owner, Some("blue".into()))
            .await
            .unwrap();
        assert_eq!(view.note.color.as_deref(), Some("blue"));

        let err = f
            .service
            .edit_note(
                id,
                f.owner,
                EditNoteInput {
                    title: Some("new".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField("description")));

        let view = f
            .service
            .edit_note(
                id,
                f.owner,
                EditNoteInput {
                    title: Some("new".into()),
                    description: Some("body".into()),
                    color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(view.note.title, "new");
        assert_eq!(view.note.color.as_deref(), Some("blue"));

        let view = f
            .service
            .edit_note(
                id,
                f.owner,
                EditNoteInput {
                    title: Some(String::new()),
                    description: Some(String::new()),
                    color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(view.note.title, "");
    }

    #[test]
    fn test_dedup_ids_keeps_order() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}

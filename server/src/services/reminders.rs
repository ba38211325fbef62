//! Reminders service
//!
//! Delivers the reminder email for a note when its scheduled job fires.

use crate::database::Repository;
use crate::error::Result;
use crate::services::mailer::{Mailer, OutgoingEmail};
use std::sync::Arc;

/// Reminder email sender
#[derive(Clone)]
pub struct RemindersService {
    repo: Repository,
    mailer: Arc<dyn Mailer>,
}

impl RemindersService {
    pub fn new(repo: Repository, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    /// Email the owner of `note_id` about its reminder.
    ///
    /// A note or owner that no longer exists is logged and skipped. Mail
    /// failures are returned to the caller.
    pub async fn send_reminder_email(&self, note_id: i64) -> Result<()> {
        let Some(note) = self.repo.find_note(note_id).await? else {
            tracing::info!("Note not found for reminder: {}", note_id);
            return Ok(());
        };

        let Some(owner) = self.repo.get_user(note.user_id).await? else {
            tracing::warn!("Owner {} of note {} not found", note.user_id, note_id);
            return Ok(());
        };

        let when = note
            .reminder
            .map(|r| r.format("%Y-%m-%d %H:%M:%S%:z").to_string())
            .unwrap_or_else(|| "None".to_string());

        self.mailer
            .send(OutgoingEmail {
                to: owner.email,
                subject: "Reminder".to_string(),
                text: format!("Reminder for Note: {} - {}", note.title, when),
                html: None,
            })
            .await?;

        tracing::info!("Reminder email sent for note {}", note_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, parse_timestamp, NewUser, NoteInput};
    use crate::services::mailer::MemoryMailer;

    async fn create_test_service(mailer: MemoryMailer) -> (RemindersService, Repository) {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let service = RemindersService::new(repo.clone(), Arc::new(mailer));
        (service, repo)
    }

    async fn create_note(repo: &Repository) -> i64 {
        let user = repo
            .create_user(NewUser {
                email: "owner@example.com".into(),
                username: "owner".into(),
                password_hash: "hash".into(),
                phone_number: None,
            })
            .await
            .unwrap();

        repo.create_note(
            user.id,
            &NoteInput {
                title: Some("Dentist".into()),
                reminder: parse_timestamp("2024-08-26T11:50"),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_send_reminder_email() {
        let mailer = MemoryMailer::new();
        let (service, repo) = create_test_service(mailer.clone()).await;
        let note_id = create_note(&repo).await;

        service.send_reminder_email(note_id).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
        assert_eq!(sent[0].subject, "Reminder");
        assert_eq!(
            sent[0].text,
            "Reminder for Note: Dentist - 2024-08-26 11:50:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_missing_note_is_skipped() {
        let mailer = MemoryMailer::new();
        let (service, _repo) = create_test_service(mailer.clone()).await;

        service.send_reminder_email(404).await.unwrap();
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_is_returned() {
        let (service, repo) = create_test_service(MemoryMailer::failing()).await;
        let note_id = create_note(&repo).await;

        assert!(service.send_reminder_email(note_id).await.is_err());
    }
}

//! Labels service
//!
//! Labels are private to their owner. Every lookup is scoped by user id, so
//! another user's label looks the same as a missing one.

use crate::database::{Label, LabelInput, Repository};
use crate::error::{AppError, Result};
use crate::services::validation;

#[derive(Clone)]
pub struct LabelsService {
    repo: Repository,
}

impl LabelsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create_label(&self, user_id: i64, input: LabelInput) -> Result<Label> {
        validation::validate_label(&input, true)?;

        let name = input.name.unwrap_or_default();
        let label = self
            .repo
            .create_label(user_id, &name, input.color.as_deref())
            .await?;

        tracing::info!("Label created successfully: {}", label.id);
        Ok(label)
    }

    pub async fn list_labels(&self, user_id: i64) -> Result<Vec<Label>> {
        self.repo.list_labels(user_id).await
    }

    pub async fn get_label(&self, id: i64, user_id: i64) -> Result<Label> {
        self.repo
            .get_label(id, user_id)
            .await?
            .ok_or(AppError::LabelNotFound(id))
    }

    /// Partial update, omitted fields keep their value
    pub async fn update_label(&self, id: i64, user_id: i64, input: LabelInput) -> Result<Label> {
        validation::validate_label(&input, false)?;

        let existing = self.get_label(id, user_id).await?;
        let name = input.name.unwrap_or(existing.name);
        let color = input.color.or(existing.color);

        self.repo
            .update_label(id, user_id, &name, color.as_deref())
            .await?
            .ok_or(AppError::LabelNotFound(id))
    }

    pub async fn delete_label(&self, id: i64, user_id: i64) -> Result<()> {
        if !self.repo.delete_label(id, user_id).await? {
            return Err(AppError::LabelNotFound(id));
        }

        tracing::info!("Label deleted successfully: {}", id);
        Ok(())
    }
}

//! Note routes
//!
//! Thin wrappers over [`NotesService`](crate::services::NotesService): pull
//! the caller and payload out of the request, wrap the result in the
//! response envelope.

use super::{ApiJson, ApiPath, ApiResponse, ApiResult, CurrentUser};
use crate::app::AppState;
use crate::database::{
    ColorInput, CollaboratorsInput, EditNoteInput, NoteFilter, NoteInput, NoteLabelsInput,
    NoteUpdate, NoteView,
};
use crate::services::notes::CollaboratorReport;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RemovedCollaborators {
    pub removed: u64,
}

/// List active notes the caller owns or collaborates on
pub async fn list_notes(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Vec<NoteView>> {
    let notes = state.notes.list_notes(user.id(), NoteFilter::Active).await?;
    Ok(ApiResponse::ok("List of notes retrieved successfully.", notes))
}

pub async fn archived_notes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<NoteView>> {
    let notes = state.notes.list_notes(user.id(), NoteFilter::Archived).await?;
    Ok(ApiResponse::ok("Archived notes retrieved successfully.", notes))
}

pub async fn trashed_notes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<NoteView>> {
    let notes = state.notes.list_notes(user.id(), NoteFilter::Trashed).await?;
    Ok(ApiResponse::ok("Trashed notes retrieved successfully.", notes))
}

pub async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NoteInput>,
) -> ApiResult<NoteView> {
    let note = state.notes.create_note(user.id(), input).await?;
    Ok(ApiResponse::created("Note created successfully.", note))
}

pub async fn get_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<NoteView> {
    let note = state.notes.get_note(id, user.id()).await?;
    Ok(ApiResponse::ok("Note retrieved successfully.", note))
}

pub async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<NoteUpdate>,
) -> ApiResult<NoteView> {
    let note = state.notes.update_note(id, user.id(), input).await?;
    Ok(ApiResponse::ok("Note updated successfully.", note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    state.notes.delete_note(id, user.id()).await?;
    Ok(ApiResponse::message("Note deleted successfully."))
}

pub async fn toggle_archive(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<NoteView> {
    let note = state.notes.toggle_archive(id, user.id()).await?;
    Ok(ApiResponse::ok("Note archive status toggled.", note))
}

pub async fn toggle_trash(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<NoteView> {
    let note = state.notes.toggle_trash(id, user.id()).await?;
    Ok(ApiResponse::ok("Note trash status toggled.", note))
}

pub async fn change_color(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ColorInput>,
) -> ApiResult<NoteView> {
    let note = state.notes.change_color(id, user.id(), input.color).await?;
    Ok(ApiResponse::ok("Color updated successfully.", note))
}

pub async fn edit_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<EditNoteInput>,
) -> ApiResult<NoteView> {
    let note = state.notes.edit_note(id, user.id(), input).await?;
    Ok(ApiResponse::ok(
        "Title, description, and color updated successfully.",
        note,
    ))
}

/// Share a note. Unknown user ids make the response a partial success.
pub async fn add_collaborators(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CollaboratorsInput>,
) -> ApiResult<CollaboratorReport> {
    let report = state
        .notes
        .add_collaborators(input.note_id, user.id(), &input.user_ids, input.access_type)
        .await?;

    if report.is_partial() {
        let message = format!(
            "Collaborators added successfully, but the following user_ids were not found: {:?}",
            report.not_found
        );
        return Ok(ApiResponse::ok(message, report).with_status("partial_success"));
    }

    Ok(ApiResponse::ok("Collaborators added successfully", report))
}

pub async fn remove_collaborators(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CollaboratorsInput>,
) -> ApiResult<RemovedCollaborators> {
    let removed = state
        .notes
        .remove_collaborators(input.note_id, user.id(), &input.user_ids)
        .await?;
    Ok(ApiResponse::ok(
        "Collaborators removed successfully",
        RemovedCollaborators { removed },
    ))
}

pub async fn add_labels(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NoteLabelsInput>,
) -> ApiResult<NoteView> {
    let note = state
        .notes
        .add_labels(input.note_id, user.id(), &input.label_ids)
        .await?;
    Ok(ApiResponse::ok("Labels added successfully", note))
}

pub async fn remove_labels(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NoteLabelsInput>,
) -> ApiResult<NoteView> {
    let note = state
        .notes
        .remove_labels(input.note_id, user.id(), &input.label_ids)
        .await?;
    Ok(ApiResponse::ok("Labels removed successfully", note))
}

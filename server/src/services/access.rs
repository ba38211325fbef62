//! Note access rules

use crate::database::{AccessType, Collaborator, Note};

/// What the caller wants to do with a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Read,
    Write,
}

/// Whether `user_id` may act on `note` with the given intent.
///
/// Owners and read-write collaborators may read and write. Read-only
/// collaborators may only read. Everyone else may do neither.
pub fn can_access(user_id: i64, note: &Note, collaborators: &[Collaborator], intent: Intent) -> bool {
    if note.user_id == user_id {
        return true;
    }

    collaborators
        .iter()
        .filter(|c| c.note_id == note.id && c.user_id == user_id)
        .any(|c| match (c.access_type, intent) {
            (AccessType::ReadWrite, _) => true,
            (AccessType::ReadOnly, Intent::Read) => true,
            (AccessType::ReadOnly, Intent::Write) => false,
        })
}

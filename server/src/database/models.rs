//! Database models
//!
//! Rust structs representing database entities and the request payloads
//! that create or change them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// A registered account
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub is_verified: bool,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub is_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            phone_number: user.phone_number.clone(),
            is_verified: user.is_verified,
        }
    }
}

/// Insert payload for a user whose password is already hashed
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
}

/// Registration request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request counter per (method, url)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccessLog {
    pub id: i64,
    pub method: String,
    pub url: String,
    pub count: i64,
}

/// A user-owned tag
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub user_id: i64,
}

/// Create or replace label request
#[derive(Debug, Clone, Deserialize)]
pub struct LabelInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// A note row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
    pub is_archive: bool,
    pub is_trash: bool,
    pub reminder: Option<DateTime<Utc>>,
    /// Owner
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create note request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_archive: bool,
    #[serde(default)]
    pub is_trash: bool,
    #[serde(default, deserialize_with = "deserialize_reminder")]
    pub reminder: Option<DateTime<Utc>>,
}

/// Note update request.
///
/// Absent fields keep their stored value. An explicit `null` clears a
/// nullable field, so `"reminder": null` drops the reminder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub image: Option<Option<String>>,
    #[serde(default)]
    pub is_archive: Option<bool>,
    #[serde(default)]
    pub is_trash: Option<bool>,
    #[serde(default, deserialize_with = "present_reminder")]
    pub reminder: Option<Option<DateTime<Utc>>>,
}

impl NoteUpdate {
    /// Merge the given fields into a stored note
    pub fn apply(self, mut note: Note) -> Note {
        if let Some(title) = self.title {
            note.title = title;
        }
        if let Some(description) = self.description {
            note.description = description;
        }
        if let Some(color) = self.color {
            note.color = color;
        }
        if let Some(image) = self.image {
            note.image = image;
        }
        if let Some(is_archive) = self.is_archive {
            note.is_archive = is_archive;
        }
        if let Some(is_trash) = self.is_trash {
            note.is_trash = is_trash;
        }
        if let Some(reminder) = self.reminder {
            note.reminder = reminder;
        }
        note
    }
}

/// Change color request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorInput {
    #[serde(default)]
    pub color: Option<String>,
}

/// Edit note request, title and description are required
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditNoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Share or unshare a note
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorsInput {
    pub note_id: i64,
    #[serde(default)]
    pub user_ids: Vec<i64>,
    /// Only read when adding, defaults to read_write
    #[serde(default)]
    pub access_type: AccessType,
}

/// Attach or detach labels
#[derive(Debug, Clone, Deserialize)]
pub struct NoteLabelsInput {
    pub note_id: i64,
    #[serde(default)]
    pub label_ids: Vec<i64>,
}

/// Capability a collaborator holds on a shared note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AccessType {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// A user a note is shared with
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Collaborator {
    pub id: i64,
    pub note_id: i64,
    pub user_id: i64,
    pub access_type: AccessType,
}

/// Collaborator as shown inside a note response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollaboratorView {
    pub user_id: i64,
    pub access_type: AccessType,
}

/// Note with its many-to-many relations resolved
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub labels: Vec<i64>,
    pub collaborators: Vec<CollaboratorView>,
}

/// Which slice of the visible notes a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteFilter {
    /// Neither archived nor trashed
    Active,
    Archived,
    Trashed,
}

/// Stored cron schedule, shared by every task with the same fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CrontabSchedule {
    pub id: i64,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
}

/// Field values of a cron schedule before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronFields {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
}

/// Named job bound to a cron schedule
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PeriodicTask {
    pub id: i64,
    pub name: String,
    pub task: String,
    /// JSON-encoded positional arguments
    pub args: String,
    pub crontab_id: i64,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Periodic task joined with its schedule
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledTask {
    pub name: String,
    pub args: String,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
}

/// Accepts RFC 3339 timestamps as well as naive `YYYY-MM-DDTHH:MM[:SS]`
/// values, which are taken to be UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    .map(|naive| naive.and_utc())
}

fn deserialize_reminder<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(raw.trim())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid reminder timestamp: {}", raw))),
    }
}

/// Present field, possibly `null`
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn present_reminder<'de, D>(deserializer: D) -> std::result::Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_reminder(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_naive_minutes() {
        let dt = parse_timestamp("2024-08-26T11:50").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour(), dt.minute()), (8, 26, 11, 50));
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        let dt = parse_timestamp("2024-08-26T17:20:00+05:30").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (11, 50));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("tomorrow").is_none());
    }

    #[test]
    fn test_note_input_reminder_optional() {
        let input: NoteInput = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert!(input.reminder.is_none());
        assert!(!input.is_archive);

        let input: NoteInput =
            serde_json::from_str(r#"{"title":"t","reminder":"2024-08-26T11:50"}"#).unwrap();
        assert!(input.reminder.is_some());

        let input: std::result::Result<NoteInput, _> =
            serde_json::from_str(r#"{"title":"t","reminder":"soon"}"#);
        assert!(input.is_err());
    }

    #[test]
    fn test_note_update_tells_absent_from_null() {
        let update: NoteUpdate = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert!(update.reminder.is_none());
        assert!(update.color.is_none());
        assert!(update.is_archive.is_none());

        let update: NoteUpdate =
            serde_json::from_str(r#"{"title":"t","reminder":null,"color":null}"#).unwrap();
        assert_eq!(update.reminder, Some(None));
        assert_eq!(update.color, Some(None));

        let update: NoteUpdate =
            serde_json::from_str(r#"{"title":"t","reminder":"2024-08-26T11:50"}"#).unwrap();
        assert_eq!(update.reminder, Some(parse_timestamp("2024-08-26T11:50")));
    }

    #[test]
    fn test_access_type_serde() {
        assert_eq!(serde_json::to_string(&AccessType::ReadOnly).unwrap(), "\"read_only\"");
        let parsed: AccessType = serde_json::from_str("\"read_write\"").unwrap();
        assert_eq!(parsed, AccessType::ReadWrite);
        assert_eq!(AccessType::default(), AccessType::ReadWrite);
    }
}

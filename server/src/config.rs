//! Application configuration
//!
//! Central location for configuration constants and validation boundaries,
//! plus the runtime [`Settings`] read from the command line and environment.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

// ===== Validation Limits =====

/// Maximum length of a note title
pub const MAX_NOTE_TITLE_LENGTH: usize = 500;
/// Maximum length of a note color value
pub const MAX_NOTE_COLOR_LENGTH: usize = 255;
/// Maximum length of a label name
pub const MAX_LABEL_NAME_LENGTH: usize = 255;
/// Maximum length of a label color value
pub const MAX_LABEL_COLOR_LENGTH: usize = 50;
/// Maximum length of a username
pub const MAX_USERNAME_LENGTH: usize = 150;
/// Maximum length of a phone number
pub const MAX_PHONE_NUMBER_LENGTH: usize = 15;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that satisfy the "one special character" password rule
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()_+{}[]:;\"'<>?,./~`-";

/// Accepted email shape: local@domain.tld
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

// ===== Tokens =====

/// Default access token lifetime (1 hour)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3_600;
/// Default refresh token lifetime (1 day)
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 86_400;

// ===== Reminders =====

/// Task identifier stored on every reminder periodic task
pub const REMINDER_TASK: &str = "notes.send_reminder_email";
/// Prefix of the per-note periodic task name
pub const REMINDER_TASK_PREFIX: &str = "send_reminder_email_";

/// Name of the periodic task that delivers the reminder for `note_id`
pub fn reminder_task_name(note_id: i64) -> String {
    format!("{}{}", REMINDER_TASK_PREFIX, note_id)
}

/// Runtime settings
///
/// Every option can be given as a flag or through its `FUNDOO_*` environment
/// variable. A `.env` file in the working directory is loaded first.
#[derive(Debug, Clone, Parser)]
#[command(name = "fundoo-notes", version, about = "Fundoo notes server")]
pub struct Settings {
    /// Address the HTTP server listens on
    #[arg(long, env = "FUNDOO_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "FUNDOO_DATABASE", default_value = "fundoo_notes.db")]
    pub database_path: PathBuf,

    /// HMAC secret used to sign tokens
    #[arg(long, env = "FUNDOO_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "FUNDOO_JWT_ISSUER", default_value = "fundoo-notes")]
    pub jwt_issuer: String,

    #[arg(long, env = "FUNDOO_ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    pub access_token_ttl_secs: i64,

    #[arg(long, env = "FUNDOO_REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS)]
    pub refresh_token_ttl_secs: i64,

    /// Base URL used to build verification links
    #[arg(long, env = "FUNDOO_PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    /// Reject logins from users who have not verified their email
    #[arg(long, env = "FUNDOO_REQUIRE_VERIFIED_LOGIN")]
    pub require_verified_login: bool,

    /// SMTP relay; when unset outgoing mail is only logged
    #[arg(long, env = "FUNDOO_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "FUNDOO_SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "FUNDOO_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "FUNDOO_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    #[arg(long, env = "FUNDOO_MAIL_FROM", default_value = "Fundoo Notes <noreply@fundoo.local>")]
    pub mail_from: String,
}

impl Settings {
    /// Link a new user follows to verify their email
    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify/{}", self.public_url.trim_end_matches('/'), token)
    }
}

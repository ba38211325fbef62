//! Services module
//!
//! Business logic services that coordinate between the HTTP layer and the
//! repository.

pub mod access;
pub mod auth;
pub mod labels;
pub mod mailer;
pub mod notes;
pub mod reminders;
pub mod scheduler;
pub mod tokens;
pub mod validation;

pub use auth::AuthService;
pub use labels::LabelsService;
pub use mailer::Mailer;
pub use notes::NotesService;
pub use reminders::RemindersService;
pub use scheduler::ReminderScheduler;
pub use tokens::TokenService;

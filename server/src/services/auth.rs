//! Authentication service
//!
//! Registration, login, email verification and token refresh. Protected
//! routes resolve their caller through [`AuthService::authenticate`].

use crate::config::Settings;
use crate::crypto;
use crate::database::{LoginInput, NewUser, RegisterInput, Repository, User, UserProfile};
use crate::error::{AppError, FieldErrors, Result};
use crate::services::mailer::{Mailer, OutgoingEmail};
use crate::services::tokens::{TokenError, TokenKind, TokenService};
use crate::services::validation;
use serde::Serialize;
use std::sync::Arc;

const REQUIRED: &str = "This field is required.";

/// Identity returned with a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub data: LoginUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Repository,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    settings: Arc<Settings>,
}

fn take_required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        Some(_) => {
            errors.insert(field.to_string(), "This field may not be blank.".to_string());
            String::new()
        }
        None => {
            errors.insert(field.to_string(), REQUIRED.to_string());
            String::new()
        }
    }
}

fn is_unique_violation(err: &AppError) -> bool {
    matches!(err, AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

impl AuthService {
    pub fn new(
        repo: Repository,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            repo,
            tokens,
            mailer,
            settings,
        }
    }

    /// Create an unverified account and send its verification link
    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile> {
        let mut errors = FieldErrors::new();

        let email = take_required(&mut errors, "email", input.email);
        let username = take_required(&mut errors, "username", input.username);
        let password = take_required(&mut errors, "password", input.password);
        let phone_number = input.phone_number.filter(|p| !p.trim().is_empty());

        if !errors.contains_key("email") {
            if let Some(msg) = validation::check_email(&email) {
                errors.insert("email".into(), msg);
            } else if self.repo.email_taken(&email).await? {
                errors.insert("email".into(), "user with this email already exists.".into());
            }
        }
        if !errors.contains_key("password") {
            if let Some(msg) = validation::check_password(&password) {
                errors.insert("password".into(), msg);
            }
        }
        if !errors.contains_key("username") {
            if let Some(msg) = validation::check_username(&username) {
                errors.insert("username".into(), msg);
            }
        }
        if let Some(phone) = &phone_number {
            if let Some(msg) = validation::check_phone_number(phone) {
                errors.insert("phone_number".into(), msg);
            } else if self.repo.phone_taken(phone).await? {
                errors.insert(
                    "phone_number".into(),
                    "user with this phone number already exists.".into(),
                );
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let password_hash = crypto::hash_password(&password)?;

        let user = self
            .repo
            .create_user(NewUser {
                email,
                username,
                password_hash,
                phone_number,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::field("email", "user with this email already exists.")
                } else {
                    e
                }
            })?;

        tracing::info!("Registered user {}", user.id);

        let token = self.tokens.issue(user.id, TokenKind::Access)?;
        self.send_verification_email(&user.email, &self.settings.verification_link(&token));

        Ok(UserProfile::from(&user))
    }

    /// Fire-and-forget delivery of the verification link
    fn send_verification_email(&self, to: &str, link: &str) {
        let email = OutgoingEmail {
            to: to.to_string(),
            subject: "Verify your email".to_string(),
            text: format!("Use the following token to verify your email: {}", link),
            html: Some(format!(
                "Hi {},<br><br>Please verify your email by clicking on the link below:<br>\
                 <a href=\"{}\">Verify Email</a><br><br>Thank you!",
                to, link
            )),
        };

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let recipient = email.to.clone();
            if let Err(e) = mailer.send(email).await {
                tracing::error!("Failed to send verification email to {}: {}", recipient, e);
            }
        });
    }

    pub async fn login(&self, input: LoginInput) -> Result<LoginResponse> {
        let mut errors = FieldErrors::new();
        let email = take_required(&mut errors, "email", input.email);
        let password = take_required(&mut errors, "password", input.password);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let user = match self.repo.find_user_by_email(&email).await? {
            Some(user) if crypto::verify_password(&password, &user.password_hash) => user,
            _ => {
                tracing::debug!("Failed login for {}", email);
                return Err(AppError::InvalidCredentials);
            }
        };

        if self.settings.require_verified_login && !user.is_verified {
            return Err(AppError::Forbidden("User is not verified".to_string()));
        }

        let pair = self.tokens.issue_pair(user.id)?;

        tracing::info!("User {} logged in", user.id);

        Ok(LoginResponse {
            access: pair.access,
            refresh: pair.refresh,
            data: LoginUser {
                id: user.id,
                username: user.username,
                email: user.email,
            },
        })
    }

    /// Redeem a verification token. Verifying twice is harmless.
    pub async fn verify(&self, token: &str) -> Result<()> {
        let user_id = self.tokens.verify(token, TokenKind::Access)?;

        if !self.repo.mark_user_verified(user_id).await? {
            return Err(AppError::InvalidToken);
        }

        tracing::info!("User {} verified", user_id);
        Ok(())
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let user_id = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        if self.repo.get_user(user_id).await?.is_none() {
            return Err(AppError::InvalidToken);
        }

        Ok(RefreshResponse {
            access: self.tokens.issue(user_id, TokenKind::Access)?,
        })
    }

    /// Resolve the user behind a bearer access token
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let user_id = self.tokens.verify(token, TokenKind::Access).map_err(|e| match e {
            TokenError::Expired => AppError::Unauthorized("Token has expired".to_string()),
            TokenError::Invalid => {
                AppError::Unauthorized("Given token not valid for any token type".to_string())
            }
        })?;

        self.repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::services::mailer::MemoryMailer;
    use clap::Parser;
    use std::time::Duration;

    struct Fixture {
        auth: AuthService,
        repo: Repository,
        tokens: TokenService,
        mailer: MemoryMailer,
    }

    async fn fixture(extra_args: &[&str]) -> Fixture {
        let mut argv = vec!["fundoo-notes", "--jwt-secret", "test-secret"];
        argv.extend_from_slice(extra_args);
        let settings = Arc::new(Settings::try_parse_from(argv).unwrap());

        let repo = Repository::new(create_memory_pool().await.unwrap());
        let tokens = TokenService::from_settings(&settings).unwrap();
        let mailer = MemoryMailer::new();
        let auth = AuthService::new(repo.clone(), tokens.clone(), Arc::new(mailer.clone()), settings);

        Fixture {
            auth,
            repo,
            tokens,
            mailer,
        }
    }

    fn registration(email: &str) -> RegisterInput {
        RegisterInput {
            email: Some(email.into()),
            username: Some("alice".into()),
            password: Some("Aa@12345".into()),
            phone_number: None,
        }
    }

    fn credentials(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    async fn wait_for_mail(mailer: &MemoryMailer) {
        for _ in 0..50 {
            if !mailer.sent().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_register_creates_unverified_user_and_sends_link() {
        let f = fixture(&[]).await;

        let profile = f.auth.register(registration("a@x.com")).await.unwrap();
        assert!(!profile.is_verified);

        wait_for_mail(&f.mailer).await;
        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify your email");
        assert!(sent[0].text.contains("http://localhost:8000/verify/"));
        assert!(sent[0].html.as_deref().unwrap().contains("Verify Email"));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_fields() {
        let f = fixture(&[]).await;

        let err = f
            .auth
            .register(RegisterInput {
                email: Some("nope".into()),
                username: None,
                password: Some("weak".into()),
                phone_number: None,
            })
            .await
            .unwrap_err();

        match err {
            AppError::Validation(errors) => {
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("username"));
                assert!(errors.contains_key("password"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let f = fixture(&[]).await;
        f.auth
            .register(RegisterInput {
                phone_number: Some("9876543210".into()),
                ..registration("a@x.com")
            })
            .await
            .unwrap();

        let err = f.auth.register(registration("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains_key("email")));

        let err = f
            .auth
            .register(RegisterInput {
                phone_number: Some("9876543210".into()),
                ..registration("b@x.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains_key("phone_number")));
    }

    #[tokio::test]
    async fn test_login() {
        let f = fixture(&[]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();

        let response = f.auth.login(credentials("a@x.com", "Aa@12345")).await.unwrap();
        assert_eq!(response.data.id, profile.id);
        assert_eq!(f.tokens.verify(&response.access, TokenKind::Access), Ok(profile.id));
        assert_eq!(f.tokens.verify(&response.refresh, TokenKind::Refresh), Ok(profile.id));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let f = fixture(&[]).await;
        f.auth.register(registration("a@x.com")).await.unwrap();

        let wrong_password = f.auth.login(credentials("a@x.com", "Wrong@123")).await.unwrap_err();
        let unknown_user = f.auth.login(credentials("b@x.com", "Aa@12345")).await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_can_require_verification() {
        let f = fixture(&["--require-verified-login"]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();

        let err = f.auth.login(credentials("a@x.com", "Aa@12345")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let token = f.tokens.issue(profile.id, TokenKind::Access).unwrap();
        f.auth.verify(&token).await.unwrap();
        assert!(f.auth.login(credentials("a@x.com", "Aa@12345")).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify() {
        let f = fixture(&[]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();
        let token = f.tokens.issue(profile.id, TokenKind::Access).unwrap();

        f.auth.verify(&token).await.unwrap();
        f.auth.verify(&token).await.unwrap();

        assert!(f.repo.get_user(profile.id).await.unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn test_verify_failures_leave_user_unverified() {
        let f = fixture(&[]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();

        let expired = f
            .tokens
            .issue_with_ttl(profile.id, TokenKind::Access, -60)
            .unwrap();
        assert!(matches!(f.auth.verify(&expired).await, Err(AppError::ExpiredToken)));
        assert!(matches!(f.auth.verify("garbage").await, Err(AppError::InvalidToken)));

        let unknown = f.tokens.issue(9999, TokenKind::Access).unwrap();
        assert!(matches!(f.auth.verify(&unknown).await, Err(AppError::InvalidToken)));

        assert!(!f.repo.get_user(profile.id).await.unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn test_refresh() {
        let f = fixture(&[]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();
        let pair = f.tokens.issue_pair(profile.id).unwrap();

        let refreshed = f.auth.refresh(&pair.refresh).await.unwrap();
        assert_eq!(f.tokens.verify(&refreshed.access, TokenKind::Access), Ok(profile.id));

        assert!(matches!(
            f.auth.refresh(&pair.access).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let f = fixture(&[]).await;
        let profile = f.auth.register(registration("a@x.com")).await.unwrap();
        let pair = f.tokens.issue_pair(profile.id).unwrap();

        assert_eq!(f.auth.authenticate(&pair.access).await.unwrap().id, profile.id);
        assert!(matches!(
            f.auth.authenticate(&pair.refresh).await,
            Err(AppError::Unauthorized(_))
        ));

        let expired = f
            .tokens
            .issue_with_ttl(profile.id, TokenKind::Access, -1)
            .unwrap();
        assert!(matches!(
            f.auth.authenticate(&expired).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}

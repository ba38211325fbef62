//! Signed bearer tokens
//!
//! HS256 JWTs carrying the user id as `sub`, a random `jti` and a private
//! `token_type` claim separating access tokens from refresh tokens.

use crate::config::Settings;
use crate::error::{AppError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::{Claims, RegisteredClaims, SignWithKey, VerifyWithKey};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

const TOKEN_TYPE_CLAIM: &str = "token_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Why a token was rejected
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::ExpiredToken,
            TokenError::Invalid => AppError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Result<Self> {
        let key = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Generic(format!("Invalid token secret: {}", e)))?;

        Ok(Self {
            key,
            issuer: issuer.into(),
            access_ttl_secs,
            refresh_ttl_secs,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.jwt_secret,
            settings.jwt_issuer.clone(),
            settings.access_token_ttl_secs,
            settings.refresh_token_ttl_secs,
        )
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        self.issue_with_ttl(user_id, kind, ttl)
    }

    /// Issue a token that expires `ttl_secs` from now. A negative lifetime
    /// yields an already expired token.
    pub fn issue_with_ttl(&self, user_id: i64, kind: TokenKind, ttl_secs: i64) -> Result<String> {
        let now = Utc::now().timestamp();

        let mut claims = Claims::new(RegisteredClaims {
            issuer: Some(self.issuer.clone()),
            subject: Some(user_id.to_string()),
            issued_at: Some(now.max(0) as u64),
            expiration: Some((now + ttl_secs).max(0) as u64),
            json_web_token_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        });
        claims
            .private
            .insert(TOKEN_TYPE_CLAIM.to_string(), kind.as_str().into());

        claims
            .sign_with_key(&self.key)
            .map_err(|e| AppError::Generic(format!("Failed to sign token: {}", e)))
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenKind::Access)?,
            refresh: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Check signature, issuer, expiry and kind. Returns the user id.
    pub fn verify(&self, token: &str, kind: TokenKind) -> std::result::Result<i64, TokenError> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(|_| TokenError::Invalid)?;

        if claims.registered.issuer.as_deref() != Some(self.issuer.as_str()) {
            return Err(TokenError::Invalid);
        }

        let expiration = claims.registered.expiration.ok_or(TokenError::Invalid)?;
        if expiration as i64 <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        let token_type = claims.private.get(TOKEN_TYPE_CLAIM).and_then(|v| v.as_str());
        if token_type != Some(kind.as_str()) {
            return Err(TokenError::Invalid);
        }

        claims
            .registered
            .subject
            .as_deref()
            .and_then(|sub| sub.parse::<i64>().ok())
            .ok_or(TokenError::Invalid)
    }
}

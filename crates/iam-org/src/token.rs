//! Personal access tokens
//!
//! Tokens are random secrets handed to the user once. Only a SHA-256 hash
//! and a short display prefix are kept.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::status::TokenStatus;

/// Length of the random part of a token secret.
const SECRET_LEN: usize = 40;

/// Number of secret characters kept in `partial` for display.
const PARTIAL_LEN: usize = 8;

/// Token issue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The lifetime is not positive or pushes expiry past the calendar range.
    #[error("token lifetime out of range: {0}")]
    LifetimeOutOfRange(Duration),
}

/// A personal access token scoped to a user within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalAccessToken {
    /// Token ID
    pub id: Uuid,

    /// User-chosen label
    pub name: String,

    /// Base64url SHA-256 of the secret
    pub hash: String,

    /// Leading characters of the secret, for display
    pub partial: String,

    /// Owning user
    pub user_id: Uuid,

    /// Organization the token is scoped to
    pub organization_id: Uuid,

    /// Token status
    pub status: TokenStatus,

    /// Expiry
    pub expires_at: DateTime<Utc>,

    /// Who issued the token
    pub created_by: Uuid,

    /// When the token was issued
    pub created_at: DateTime<Utc>,
}

/// A freshly issued token together with its plaintext secret.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The stored token record
    pub token: PersonalAccessToken,
    /// The secret; not recoverable after issue
    pub secret: String,
}

impl PersonalAccessToken {
    /// Prefix of every token secret.
    pub const PREFIX: &'static str = "pat_";

    /// Issue a new active token.
    ///
    /// Fails when `ttl` is not positive or the expiry cannot be represented.
    ///
    /// # Arguments
    ///
    /// * `organization_id` - Organization the token is scoped to
    /// * `user_id` - Owning user
    /// * `name` - Label
    /// * `ttl` - Lifetime from now
    /// * `created_by` - Who issued it
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Duration;
    /// use iam_org::PersonalAccessToken;
    /// use uuid::Uuid;
    ///
    /// let user = Uuid::now_v7();
    /// let issued =
    ///     PersonalAccessToken::issue(Uuid::now_v7(), user, "ci", Duration::days(30), user).unwrap();
    /// assert!(issued.secret.starts_with("pat_"));
    /// assert!(issued.token.matches(&issued.secret));
    /// ```
    pub fn issue(
        organization_id: Uuid,
        user_id: Uuid,
        name: impl Into<String>,
        ttl: Duration,
        created_by: Uuid,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        if ttl <= Duration::zero() {
            return Err(TokenError::LifetimeOutOfRange(ttl));
        }
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::LifetimeOutOfRange(ttl))?;

        let random: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(SECRET_LEN)
            .map(char::from)
            .collect();
        let secret = format!("{}{}", Self::PREFIX, random);

        let token = Self {
            id: Uuid::now_v7(),
            name: name.into(),
            hash: Self::hash_secret(&secret),
            partial: secret[..Self::PREFIX.len() + PARTIAL_LEN].to_string(),
            user_id,
            organization_id,
            status: TokenStatus::Active,
            expires_at,
            created_by,
            created_at: now,
        };

        Ok(IssuedToken { token, secret })
    }

    /// Hash a secret the way it is stored.
    pub fn hash_secret(secret: &str) -> String {
        let digest = Sha256::digest(secret.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }

    /// Whether `secret` is this token's secret.
    pub fn matches(&self, secret: &str) -> bool {
        Self::hash_secret(secret) == self.hash
    }

    /// Whether the token can authenticate at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == TokenStatus::Active && self.expires_at > now
    }
}

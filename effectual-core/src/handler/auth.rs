//! Auth family: tokens, passwords, and identity lookup

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserLookup;
use crate::effect::Effect;
use crate::error::{AuthFault, Error};
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Result of verifying a token.
///
/// All three states are expected domain outcomes; a fault means the backend
/// itself failed, not that the token was bad. A signature-algorithm mismatch
/// is [`TokenCheck::Invalid`], never a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCheck {
    /// The token verified and is current
    Valid {
        /// Token subject
        user_id: Uuid,
        /// Claims carried by the token
        claims: BTreeMap<String, String>,
    },
    /// The token verified but its lifetime has passed
    Expired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// The token failed verification
    Invalid {
        /// Why verification failed
        reason: String,
    },
}

/// Result of a refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOutcome {
    /// A new access token was minted
    Refreshed {
        /// The new access token
        access_token: String,
    },
    /// The refresh token was not accepted
    Failed,
}

/// Backend identity provider the embedder supplies for auth effects.
///
/// The port is where the cryptography lives: password hashing must use a slow
/// KDF and password verification must compare hashes in constant time. The
/// core only routes.
#[async_trait]
pub trait AuthPort: Send + Sync {
    /// Verify a token's signature, expiry, and claims
    async fn validate_token(&self, token: &str) -> Result<TokenCheck, AuthFault>;

    /// Mint a token for a user
    async fn generate_token(
        &self,
        user_id: Uuid,
        claims: &BTreeMap<String, String>,
        ttl_seconds: u32,
    ) -> Result<String, AuthFault>;

    /// Exchange a refresh token for a new access token
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthFault>;

    /// Revoke a token.
    ///
    /// Must be idempotent: revoking an unknown or already-revoked token
    /// succeeds.
    async fn revoke_token(&self, token: &str) -> Result<(), AuthFault>;

    /// Hash a password with a slow KDF
    async fn hash_password(&self, password: &str) -> Result<String, AuthFault>;

    /// Verify a password against a stored hash in constant time
    async fn validate_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthFault>;

    /// Look up a user by email; an empty lookup uses the nil UUID and the
    /// `email_not_found` reason
    async fn get_user_by_email(&self, email: &str) -> Result<UserLookup, AuthFault>;
}

/// Specialized handler for the auth family.
pub struct AuthHandler<P> {
    port: P,
}

impl<P> AuthHandler<P> {
    const DISPATCHER_NAME: &'static str = "AuthHandler";

    /// Wrap an identity port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: AuthPort> HandlerContract for AuthHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::ValidateToken { ref token } => {
                let checked = self.port.validate_token(token).await;
                match checked {
                    Ok(TokenCheck::Valid { user_id, claims }) => {
                        Outcome::Ok(Reply::TokenValid { user_id, claims })
                    }
                    Ok(TokenCheck::Expired { expired_at }) => {
                        Outcome::Ok(Reply::TokenExpired { expired_at })
                    }
                    Ok(TokenCheck::Invalid { reason }) => {
                        Outcome::Ok(Reply::TokenInvalid { reason })
                    }
                    Err(fault) => {
                        tracing::warn!(kind = %fault.kind, "token validation backend failed: {}", fault.message);
                        Outcome::Err(Error::Auth { effect, fault })
                    }
                }
            }
            Effect::GenerateToken {
                user_id,
                ref claims,
                ttl_seconds,
            } => {
                let minted = self.port.generate_token(user_id, claims, ttl_seconds).await;
                match minted {
                    Ok(token) => Outcome::Ok(Reply::Text { text: token }),
                    Err(fault) => Outcome::Err(Error::Auth { effect, fault }),
                }
            }
            Effect::RefreshToken { ref refresh_token } => {
                let refreshed = self.port.refresh_token(refresh_token).await;
                match refreshed {
                    Ok(RefreshOutcome::Refreshed { access_token }) => {
                        Outcome::Ok(Reply::TokenRefreshed { access_token })
                    }
                    Ok(RefreshOutcome::Failed) => Outcome::Ok(Reply::TokenRefreshFailed),
                    Err(fault) => Outcome::Err(Error::Auth { effect, fault }),
                }
            }
            Effect::RevokeToken { ref token } => {
                let revoked = self.port.revoke_token(token).await;
                match revoked {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(fault) => Outcome::Err(Error::Auth { effect, fault }),
                }
            }
            Effect::HashPassword { ref password } => {
                let hashed = self.port.hash_password(password).await;
                match hashed {
                    Ok(hash) => Outcome::Ok(Reply::Hash { hash }),
                    Err(fault) => {
                        tracing::warn!(kind = %fault.kind, "password hashing failed: {}", fault.message);
                        Outcome::Err(Error::Auth { effect, fault })
                    }
                }
            }
            Effect::ValidatePassword {
                ref password,
                ref password_hash,
            } => {
                let checked = self.port.validate_password(password, password_hash).await;
                match checked {
                    Ok(valid) => Outcome::Ok(Reply::PasswordValid { valid }),
                    Err(fault) => Outcome::Err(Error::Auth { effect, fault }),
                }
            }
            Effect::GetUserByEmail { ref email } => {
                let looked_up = self.port.get_user_by_email(email).await;
                match looked_up {
                    Ok(UserLookup::Found(user)) => Outcome::Ok(Reply::User(user)),
                    Ok(UserLookup::NotFound { user_id, reason }) => {
                        Outcome::Ok(Reply::UserNotFound { user_id, reason })
                    }
                    Err(fault) => Outcome::Err(Error::Auth { effect, fault }),
                }
            }
            other => Outcome::Err(Error::Unhandled {
                effect: other,
                dispatcher_name: Self::DISPATCHER_NAME,
            }),
        }
    }
}

//! Cache family: profile fetch and store with TTL

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ProfileData;
use crate::effect::Effect;
use crate::error::{CacheFault, Error};
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Result of a cache read. A miss is an expected state, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLookup {
    /// The key held a profile
    Hit(ProfileData),
    /// The key held nothing
    Miss {
        /// The key that missed
        key: String,
        /// Backend-supplied miss reason (for example `not_found`, `expired`)
        reason: String,
    },
}

/// Backend cache the embedder supplies for cache effects.
///
/// The port offers no atomicity with the database; a stale read after a
/// concurrent write is the embedder's problem to tolerate.
#[async_trait]
pub trait CachePort: Send + Sync {
    /// Fetch the cached profile for a user
    async fn get_profile(&self, user_id: Uuid) -> Result<CacheLookup, CacheFault>;

    /// Store a profile under the user's key for `ttl_seconds`
    async fn put_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileData,
        ttl_seconds: u32,
    ) -> Result<(), CacheFault>;
}

/// Specialized handler for the cache family.
pub struct CacheHandler<P> {
    port: P,
}

impl<P> CacheHandler<P> {
    const DISPATCHER_NAME: &'static str = "CacheHandler";

    /// Wrap a cache port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: CachePort> HandlerContract for CacheHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::GetCachedProfile { user_id } => match self.port.get_profile(user_id).await {
                Ok(CacheLookup::Hit(profile)) => Outcome::Ok(Reply::ProfileData(profile)),
                Ok(CacheLookup::Miss { key, reason }) => {
                    Outcome::Ok(Reply::CacheMiss { key, reason })
                }
                Err(fault) => {
                    tracing::warn!(
                        kind = %fault.kind,
                        retryable = fault.is_retryable(),
                        "profile cache read failed: {}", fault.message
                    );
                    Outcome::Err(Error::Cache {
                        effect: Effect::GetCachedProfile { user_id },
                        fault,
                    })
                }
            },
            Effect::PutCachedProfile {
                user_id,
                ref profile,
                ttl_seconds,
            } => {
                let stored = self.port.put_profile(user_id, profile, ttl_seconds).await;
                match stored {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "profile cache write failed: {}", fault.message
                        );
                        Outcome::Err(Error::Cache { effect, fault })
                    }
                }
            }
            other => Outcome::Err(Error::Unhandled {
                effect: other,
                dispatcher_name: Self::DISPATCHER_NAME,
            }),
        }
    }
}

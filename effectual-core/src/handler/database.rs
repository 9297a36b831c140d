//! Database family: user lookup and chat message persistence

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ChatMessage, UserLookup};
use crate::effect::Effect;
use crate::error::{DatabaseFault, Error};
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Backend store the embedder supplies for database effects.
///
/// Lookups distinguish absence (an expected [`UserLookup::NotFound`]) from
/// infrastructure failure (a [`DatabaseFault`]); the two never mix.
#[async_trait]
pub trait DatabasePort: Send + Sync {
    /// Fetch a user row by primary id
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<UserLookup, DatabaseFault>;

    /// Persist a chat message, returning the stored row with its assigned id
    /// and creation time
    async fn save_chat_message(
        &self,
        user_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, DatabaseFault>;
}

/// Specialized handler for the database family.
pub struct DatabaseHandler<P> {
    port: P,
}

impl<P> DatabaseHandler<P> {
    const DISPATCHER_NAME: &'static str = "DatabaseHandler";

    /// Wrap a store port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: DatabasePort> HandlerContract for DatabaseHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::GetUserById { user_id } => {
                match self.port.get_user_by_id(user_id).await {
                    Ok(UserLookup::Found(user)) => Outcome::Ok(Reply::User(user)),
                    Ok(UserLookup::NotFound { user_id, reason }) => {
                        Outcome::Ok(Reply::UserNotFound { user_id, reason })
                    }
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "user lookup failed: {}", fault.message
                        );
                        Outcome::Err(Error::Database {
                            effect: Effect::GetUserById { user_id },
                            fault,
                        })
                    }
                }
            }
            Effect::SaveChatMessage { user_id, ref text } => {
                let saved = self.port.save_chat_message(user_id, text).await;
                match saved {
                    Ok(message) => Outcome::Ok(Reply::ChatMessage(message)),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "chat message save failed: {}", fault.message
                        );
                        Outcome::Err(Error::Database { effect, fault })
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

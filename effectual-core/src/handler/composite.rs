//! Routes each effect to the specialized handler that owns its family

use async_trait::async_trait;

use crate::effect::{Effect, EffectFamily};
use crate::error::Error;
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// One slot per family; any slot may stay unconfigured.
///
/// Dispatch is a fixed match on [`Effect::family`], so exactly one specialized
/// handler sees each effect. An effect whose family has no configured handler
/// comes back as [`Error::Unhandled`]. The sub-handler's outcome is returned
/// unchanged.
///
/// ```
/// use effectual_core::prelude::*;
/// # struct NullDb;
/// # #[async_trait]
/// # impl DatabasePort for NullDb {
/// #     async fn get_user_by_id(&self, user_id: Uuid) -> Result<UserLookup, DatabaseFault> {
/// #         Ok(UserLookup::NotFound { user_id, reason: MissingUserReason::DoesNotExist })
/// #     }
/// #     async fn save_chat_message(&self, _: Uuid, _: &str) -> Result<ChatMessage, DatabaseFault> {
/// #         Err(DatabaseFault::timeout("unreachable"))
/// #     }
/// # }
///
/// let handler = CompositeHandler::new()
///     .with_database(DatabaseHandler::new(NullDb));
/// ```
#[derive(Default)]
pub struct CompositeHandler {
    websocket: Option<Box<dyn HandlerContract>>,
    database: Option<Box<dyn HandlerContract>>,
    cache: Option<Box<dyn HandlerContract>>,
    messaging: Option<Box<dyn HandlerContract>>,
    storage: Option<Box<dyn HandlerContract>>,
    auth: Option<Box<dyn HandlerContract>>,
    metrics: Option<Box<dyn HandlerContract>>,
}

impl CompositeHandler {
    /// Name reported in [`Error::Unhandled`] diagnostics.
    pub const DISPATCHER_NAME: &'static str = "CompositeHandler";

    /// An empty dispatcher; every family starts unconfigured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the WebSocket family
    pub fn with_websocket(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.websocket = Some(Box::new(handler));
        self
    }

    /// Configure the database family
    pub fn with_database(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.database = Some(Box::new(handler));
        self
    }

    /// Configure the cache family
    pub fn with_cache(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.cache = Some(Box::new(handler));
        self
    }

    /// Configure the messaging family
    pub fn with_messaging(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.messaging = Some(Box::new(handler));
        self
    }

    /// Configure the storage family
    pub fn with_storage(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.storage = Some(Box::new(handler));
        self
    }

    /// Configure the auth family
    pub fn with_auth(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.auth = Some(Box::new(handler));
        self
    }

    /// Configure the metrics family
    pub fn with_metrics(mut self, handler: impl HandlerContract + 'static) -> Self {
        self.metrics = Some(Box::new(handler));
        self
    }

    fn slot(&self, family: EffectFamily) -> Option<&dyn HandlerContract> {
        let slot = match family {
            EffectFamily::WebSocket => &self.websocket,
            EffectFamily::Database => &self.database,
            EffectFamily::Cache => &self.cache,
            EffectFamily::Messaging => &self.messaging,
            EffectFamily::Storage => &self.storage,
            EffectFamily::Auth => &self.auth,
            EffectFamily::Metrics => &self.metrics,
        };
        slot.as_deref()
    }
}

#[async_trait]
impl HandlerContract for CompositeHandler {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match self.slot(effect.family()) {
            Some(handler) => handler.handle(effect).await,
            None => {
                tracing::warn!(
                    effect = %effect.tag(),
                    family = %effect.family(),
                    "effect reached an unconfigured family"
                );
                Outcome::Err(Error::Unhandled {
                    effect,
                    dispatcher_name: Self::DISPATCHER_NAME,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Claims every effect and counts invocations.
    struct CountingHandler {
        calls: Arc<AtomicU32>,
        reply: Reply,
    }

    #[async_trait]
    impl HandlerContract for CountingHandler {
        async fn handle(&self, _effect: Effect) -> Outcome<Reply, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Outcome::Ok(self.reply.clone())
        }
    }

    fn counting(reply: Reply) -> (CountingHandler, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            CountingHandler {
                calls: Arc::clone(&calls),
                reply,
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_dispatch_reaches_exactly_one_handler() {
        let (websocket, websocket_calls) = counting(Reply::Unit);
        let (database, database_calls) = counting(Reply::Unit);
        let handler = CompositeHandler::new()
            .with_websocket(websocket)
            .with_database(database);

        let result = handler
            .handle(Effect::SendText {
                text: "hi".to_string(),
            })
            .await;
        assert_eq!(result, Outcome::Ok(Reply::Unit));
        assert_eq!(websocket_calls.load(Ordering::SeqCst), 1);
        assert_eq!(database_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_family_is_unhandled() {
        let (database, _) = counting(Reply::Unit);
        let handler = CompositeHandler::new().with_database(database);

        let effect = Effect::SendText {
            text: "hi".to_string(),
        };
        let result = handler.handle(effect.clone()).await;
        assert_eq!(
            result,
            Outcome::Err(Error::Unhandled {
                effect,
                dispatcher_name: "CompositeHandler",
            })
        );
    }

    #[tokio::test]
    async fn test_empty_composite_rejects_everything() {
        let handler = CompositeHandler::new();
        for effect in [
            Effect::ReceiveText,
            Effect::GetUserById {
                user_id: uuid::Uuid::nil(),
            },
            Effect::consume_message("s"),
            Effect::list_objects("b"),
            Effect::ResetMetrics,
        ] {
            let result = handler.handle(effect).await;
            assert!(matches!(result, Outcome::Err(Error::Unhandled { .. })));
        }
    }

    #[tokio::test]
    async fn test_sub_handler_outcome_flows_through_unchanged() {
        let (metrics, _) = counting(Reply::MetricRecordingFailed {
            reason: "type_mismatch".to_string(),
        });
        let handler = CompositeHandler::new().with_metrics(metrics);

        let result = handler.handle(Effect::ResetMetrics).await;
        assert_eq!(
            result,
            Outcome::Ok(Reply::MetricRecordingFailed {
                reason: "type_mismatch".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_every_family_routes_to_its_slot() {
        let (websocket, ws_calls) = counting(Reply::Unit);
        let (database, db_calls) = counting(Reply::Unit);
        let (cache, cache_calls) = counting(Reply::Unit);
        let (messaging, msg_calls) = counting(Reply::Unit);
        let (storage, storage_calls) = counting(Reply::Unit);
        let (auth, auth_calls) = counting(Reply::Unit);
        let (metrics, metrics_calls) = counting(Reply::Unit);

        let handler = CompositeHandler::new()
            .with_websocket(websocket)
            .with_database(database)
            .with_cache(cache)
            .with_messaging(messaging)
            .with_storage(storage)
            .with_auth(auth)
            .with_metrics(metrics);

        let probes = [
            Effect::ReceiveText,
            Effect::GetUserById {
                user_id: uuid::Uuid::nil(),
            },
            Effect::GetCachedProfile {
                user_id: uuid::Uuid::nil(),
            },
            Effect::consume_message("s"),
            Effect::list_objects("b"),
            Effect::RevokeToken {
                token: "t".to_string(),
            },
            Effect::ResetMetrics,
        ];
        for effect in probes {
            handler.handle(effect).await.unwrap_ok();
        }

        for calls in [
            ws_calls,
            db_calls,
            cache_calls,
            msg_calls,
            storage_calls,
            auth_calls,
            metrics_calls,
        ] {
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}

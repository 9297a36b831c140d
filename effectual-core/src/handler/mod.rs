//! The handler contract, the composite dispatcher, and the per-family handlers
//!
//! A handler turns an effect description into an [`Outcome`]: `Ok` with a
//! reply from the effect's designated set, or `Err` with a structured runtime
//! error. Specialized handlers own exactly one family and delegate all I/O to
//! an embedder-implemented port; the [`CompositeHandler`] routes whole
//! programs across families.

use async_trait::async_trait;

use crate::effect::Effect;
use crate::error::Error;
use crate::outcome::Outcome;
use crate::reply::Reply;

mod auth;
mod cache;
mod composite;
mod database;
mod messaging;
mod metrics;
mod storage;
mod websocket;

pub use auth::{AuthHandler, AuthPort, RefreshOutcome, TokenCheck};
pub use cache::{CacheHandler, CacheLookup, CachePort};
pub use composite::CompositeHandler;
pub use database::{DatabaseHandler, DatabasePort};
pub use messaging::{ConsumeOutcome, MessagingHandler, MessagingPort};
pub use metrics::{CollectorError, CollectorState, MetricsHandler, MetricsPort};
pub use storage::{ObjectFetch, StorageHandler, StoragePort};
pub use websocket::{PeerClosed, WebSocketHandler, WebSocketPort};

/// Turns one effect into one outcome.
///
/// Guarantees expected from every implementation:
///
/// - **Totality** over its declared effect subset: every claimed effect gets
///   a result in bounded time relative to the backend.
/// - **Side-effect isolation**: all externally observable I/O happens inside
///   [`handle`](HandlerContract::handle), against the injected port only.
/// - **Idempotent accessors** where natural: consecutive reads of the same
///   key yield equivalent replies absent concurrent writes.
#[async_trait]
pub trait HandlerContract: Send + Sync {
    /// Execute one effect and produce its reply or a runtime error.
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error>;
}

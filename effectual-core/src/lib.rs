//! # effectual-core
//!
//! An effect-description runtime: programs describe side effects as immutable
//! data values, and swappable handlers execute them. Pure business logic says
//! *what* should happen; injected ports decide *how* it happens against
//! databases, caches, message brokers, object stores, identity providers,
//! WebSocket peers, and a metrics collector.
//!
//! ## How it fits together
//!
//! - A [`Program`](program::Program) alternately yields an
//!   [`Effect`](effect::Effect) and consumes a typed
//!   [`Reply`](reply::Reply).
//! - [`run_program`](driver::run_program) steps the program, dispatching each
//!   effect through a [`HandlerContract`](handler::HandlerContract) and
//!   folding `Ok` replies back in. The first handler `Err` ends the run:
//!   fail-fast, no retry, no reordering.
//! - The [`CompositeHandler`](handler::CompositeHandler) routes each effect
//!   family to its specialized handler; each specialized handler delegates to
//!   an embedder-implemented port trait.
//! - Expected domain states (cache miss, expired token, consume timeout,
//!   absent object) are reply variants. Errors are for infrastructure, and
//!   metrics failures are never errors at all.
//!
//! ## Example
//!
//! ```rust,ignore
//! use effectual_core::prelude::*;
//!
//! let config = Config::load()?;
//! init_tracing(&config);
//!
//! let handler = CompositeHandler::new()
//!     .with_database(DatabaseHandler::new(my_pg_port))
//!     .with_cache(CacheHandler::new(my_redis_port));
//!
//! let program = Program::perform(Effect::GetUserById { user_id })
//!     .and_then(|reply| match reply {
//!         Reply::User(user) => Program::perform(Effect::SendText {
//!             text: format!("Hello {}!", user.name),
//!         })
//!         .map(|_| "greeted"),
//!         _ => Program::completed("unknown caller"),
//!     });
//!
//! let outcome = run_program(program, &handler).await;
//! ```

pub mod config;
pub mod domain;
pub mod driver;
pub mod effect;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod observability;
pub mod outcome;
pub mod program;
pub mod reply;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        CacheConfig, Config, ConfigError, MessagingConfig, MetricsConfig, ServiceConfig,
        StorageConfig,
    };

    pub use crate::outcome::Outcome;

    pub use crate::effect::{
        CloseReason, Effect, EffectFamily, DEFAULT_CONSUME_TIMEOUT_MS, DEFAULT_LIST_MAX_KEYS,
        DEFAULT_NACK_DELAY_MS,
    };
    pub use crate::reply::Reply;

    pub use crate::domain::{
        ChatMessage, MessageEnvelope, MissingUserReason, OptionalValue, ProfileData, S3Object,
        User, UserLookup,
    };

    pub use crate::error::{
        AuthFault, AuthFaultKind, CacheFault, CacheFaultKind, DatabaseFault, DatabaseFaultKind,
        Error, MessagingFault, MessagingFaultKind, MetricsFault, MetricsFaultKind, StorageFault,
        StorageFaultKind,
    };

    pub use crate::handler::{
        AuthHandler, AuthPort, CacheHandler, CacheLookup, CachePort, CollectorError,
        CollectorState, CompositeHandler, ConsumeOutcome, DatabaseHandler, DatabasePort,
        HandlerContract, MessagingHandler, MessagingPort, MetricsHandler, MetricsPort,
        ObjectFetch, RefreshOutcome, StorageHandler, StoragePort, TokenCheck, WebSocketHandler,
        WebSocketPort, PeerClosed,
    };

    pub use crate::program::{delegate, Continuation, Program};

    pub use crate::driver::run_program;

    pub use crate::metrics::{
        monotonic_now_seconds, render_prometheus, CounterDefinition, GaugeDefinition,
        HistogramDefinition, InMemoryCollector, MetricKind, MetricsRegistry, Rejection,
        RegistryError, SummaryDefinition,
    };

    pub use crate::observability::init_tracing;

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export async-trait for port implementations
    pub use async_trait::async_trait;

    // Re-export error handling utilities (the derive macro lives in the macro
    // namespace, so it coexists with the runtime Error enum)
    pub use anyhow::{self, Context as AnyhowContext};
    pub use thiserror::Error;

    // Re-export time utilities
    pub use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};

    // Re-export UUID
    pub use uuid::Uuid;
}

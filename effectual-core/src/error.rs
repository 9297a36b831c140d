//! Handler error kinds with structured context and retryability classification

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effect::Effect;

// ============================================================================
// Database faults
// ============================================================================

/// Category of database fault, supplied by the port.
///
/// Retryability is a property of the kind, never of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseFaultKind {
    /// The connection dropped mid-operation
    ConnectionReset,
    /// The operation exceeded the backend deadline
    Timeout,
    /// No pooled connection became available
    PoolExhausted,
    /// Unique, foreign-key, or check constraint violation
    ConstraintViolation,
    /// The query referenced a missing table or column
    Schema,
    /// The query failed for another backend-reported reason
    QueryFailed,
    /// The backend refused the operation
    PermissionDenied,
}

impl DatabaseFaultKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionReset | Self::Timeout | Self::PoolExhausted
        )
    }
}

impl fmt::Display for DatabaseFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionReset => write!(f, "connection_reset"),
            Self::Timeout => write!(f, "timeout"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::Schema => write!(f, "schema"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::PermissionDenied => write!(f, "permission_denied"),
        }
    }
}

/// Structured database failure reported by a [`crate::handler::DatabasePort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFault {
    /// Failure category
    pub kind: DatabaseFaultKind,
    /// Human-readable backend detail
    pub message: String,
}

impl DatabaseFault {
    /// Create a fault of the given kind
    pub fn new(kind: DatabaseFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection dropped mid-operation
    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::new(DatabaseFaultKind::ConnectionReset, message)
    }

    /// Backend deadline exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DatabaseFaultKind::Timeout, message)
    }

    /// Constraint violation (duplicate key, foreign key, check)
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(DatabaseFaultKind::ConstraintViolation, message)
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for DatabaseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Cache faults
// ============================================================================

/// Category of cache fault, supplied by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFaultKind {
    /// The operation exceeded the backend deadline
    Timeout,
    /// The connection dropped mid-operation
    ConnectionLost,
    /// The value exceeds the backend's size limit
    ValueTooLarge,
    /// The payload could not be encoded or decoded
    Codec,
}

impl CacheFaultKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionLost)
    }
}

impl fmt::Display for CacheFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionLost => write!(f, "connection_lost"),
            Self::ValueTooLarge => write!(f, "value_too_large"),
            Self::Codec => write!(f, "codec"),
        }
    }
}

/// Structured cache failure reported by a [`crate::handler::CachePort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFault {
    /// Failure category
    pub kind: CacheFaultKind,
    /// Human-readable backend detail
    pub message: String,
}

impl CacheFault {
    /// Create a fault of the given kind
    pub fn new(kind: CacheFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Backend deadline exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CacheFaultKind::Timeout, message)
    }

    /// Value exceeds the backend's size limit
    pub fn value_too_large(message: impl Into<String>) -> Self {
        Self::new(CacheFaultKind::ValueTooLarge, message)
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for CacheFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Messaging faults
// ============================================================================

/// Category of broker fault, supplied by the port as an explicit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingFaultKind {
    /// The broker did not answer within its deadline
    Timeout,
    /// A producer or topic quota was exceeded
    QuotaExceeded,
    /// The connection to the broker failed
    Connection,
    /// The broker is temporarily unavailable
    Unavailable,
    /// The broker is shedding load
    Backpressure,
    /// The topic does not exist
    TopicNotFound,
    /// The client failed to authenticate
    Authentication,
    /// The client is not authorized for the operation
    Authorization,
    /// The broker rejected the payload
    InvalidPayload,
    /// An acknowledge referenced an id the broker does not know
    UnknownMessageId,
}

impl MessagingFaultKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::QuotaExceeded
                | Self::Connection
                | Self::Unavailable
                | Self::Backpressure
        )
    }
}

impl fmt::Display for MessagingFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::QuotaExceeded => write!(f, "quota_exceeded"),
            Self::Connection => write!(f, "connection"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Backpressure => write!(f, "backpressure"),
            Self::TopicNotFound => write!(f, "topic_not_found"),
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::InvalidPayload => write!(f, "invalid_payload"),
            Self::UnknownMessageId => write!(f, "unknown_message_id"),
        }
    }
}

/// Structured broker failure reported by a [`crate::handler::MessagingPort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingFault {
    /// Failure category
    pub kind: MessagingFaultKind,
    /// Human-readable backend detail
    pub message: String,
}

impl MessagingFault {
    /// Create a fault of the given kind
    pub fn new(kind: MessagingFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Acknowledge referenced an unknown message id
    pub fn unknown_message_id(message: impl Into<String>) -> Self {
        Self::new(MessagingFaultKind::UnknownMessageId, message)
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for MessagingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Storage faults
// ============================================================================

/// Category of object-store fault, supplied by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageFaultKind {
    /// A size or request quota was exceeded
    QuotaExceeded,
    /// The store could not be reached
    Network,
    /// The store did not answer within its deadline
    Timeout,
    /// The caller may not perform this operation
    PermissionDenied,
    /// The bucket does not exist
    BucketMissing,
    /// The key is not valid for the backend
    InvalidKey,
}

impl StorageFaultKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::Network | Self::Timeout)
    }
}

impl fmt::Display for StorageFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "quota_exceeded"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::PermissionDenied => write!(f, "permission_denied"),
            Self::BucketMissing => write!(f, "bucket_missing"),
            Self::InvalidKey => write!(f, "invalid_key"),
        }
    }
}

/// Structured object-store failure reported by a
/// [`crate::handler::StoragePort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFault {
    /// Failure category
    pub kind: StorageFaultKind,
    /// Human-readable backend detail
    pub message: String,
}

impl StorageFault {
    /// Create a fault of the given kind
    pub fn new(kind: StorageFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The caller may not perform this operation
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StorageFaultKind::PermissionDenied, message)
    }

    /// The bucket does not exist
    pub fn bucket_missing(message: impl Into<String>) -> Self {
        Self::new(StorageFaultKind::BucketMissing, message)
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for StorageFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Auth faults
// ============================================================================

/// Category of auth backend fault, supplied by the port.
///
/// A token that fails verification is a reply
/// ([`crate::reply::Reply::TokenInvalid`]), not a fault; faults cover the
/// backend itself failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFaultKind {
    /// The signing or hashing primitive failed
    Crypto,
    /// The key store or identity backend could not be reached
    BackendUnavailable,
    /// Keys or parameters are misconfigured
    KeyConfiguration,
}

impl AuthFaultKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable)
    }
}

impl fmt::Display for AuthFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::BackendUnavailable => write!(f, "backend_unavailable"),
            Self::KeyConfiguration => write!(f, "key_configuration"),
        }
    }
}

/// Structured auth failure reported by an [`crate::handler::AuthPort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFault {
    /// Failure category
    pub kind: AuthFaultKind,
    /// Human-readable backend detail
    pub message: String,
}

impl AuthFault {
    /// Create a fault of the given kind
    pub fn new(kind: AuthFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Signing or hashing primitive failed
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::new(AuthFaultKind::Crypto, message)
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for AuthFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// Metrics faults
// ============================================================================

/// Category of metrics-runtime fault.
///
/// Ordinary recording failures are replies; a fault here means programmer-level
/// misuse of the metrics machinery itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFaultKind {
    /// The registry handed to the handler is internally inconsistent
    InvalidRegistry,
    /// The collector poisoned itself and cannot continue
    CollectorPanicked,
}

impl MetricsFaultKind {
    /// Metrics faults indicate misuse; none are retryable
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl fmt::Display for MetricsFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegistry => write!(f, "invalid_registry"),
            Self::CollectorPanicked => write!(f, "collector_panicked"),
        }
    }
}

/// Structured metrics-runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsFault {
    /// Failure category
    pub kind: MetricsFaultKind,
    /// Human-readable detail
    pub message: String,
}

impl MetricsFault {
    /// Create a fault of the given kind
    pub fn new(kind: MetricsFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a retry may succeed (derived from the kind)
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for MetricsFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ============================================================================
// The runtime error union
// ============================================================================

/// A handler failure that aborts the running program.
///
/// Every kind except [`Error::Unhandled`] and [`Error::IllTypedReply`] carries
/// the effect that triggered it and a structured per-family fault. Expected
/// domain states (user not found, cache miss, expired token, consume timeout)
/// are never errors; they travel as [`crate::reply::Reply`] variants.
///
/// Serializes for structured logs; the static diagnostic tags keep it from
/// round-tripping back in.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Error {
    /// A database port operation failed
    #[error("database fault while handling {effect}: {fault}")]
    Database {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: DatabaseFault,
    },

    /// A cache port operation failed
    #[error("cache fault while handling {effect}: {fault}")]
    Cache {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: CacheFault,
    },

    /// The WebSocket peer is gone
    #[error("websocket closed (code {close_code}) while handling {effect}: {reason}")]
    WebSocketClosed {
        /// The triggering effect
        effect: Effect,
        /// Observed close code (1006 when the peer vanished without one)
        close_code: u16,
        /// Close reason text
        reason: String,
    },

    /// A broker port operation failed
    #[error("messaging fault while handling {effect}: {fault}")]
    Messaging {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: MessagingFault,
    },

    /// An object-store port operation failed
    #[error("storage fault while handling {effect}: {fault}")]
    Storage {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: StorageFault,
    },

    /// An auth port operation failed
    #[error("auth fault while handling {effect}: {fault}")]
    Auth {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: AuthFault,
    },

    /// The metrics machinery was misused
    #[error("metrics fault while handling {effect}: {fault}")]
    Metrics {
        /// The triggering effect
        effect: Effect,
        /// Structured failure detail
        fault: MetricsFault,
    },

    /// No configured handler claims the effect's family
    #[error("no handler configured for {effect} (dispatcher {dispatcher_name})")]
    Unhandled {
        /// The orphaned effect
        effect: Effect,
        /// Which dispatcher gave up on it
        dispatcher_name: &'static str,
    },

    /// A handler answered with a reply outside the effect's designated set
    #[error("handler returned ill-typed reply {reply_tag} for {effect}")]
    IllTypedReply {
        /// The effect that was being handled
        effect: Effect,
        /// Tag of the out-of-set reply
        reply_tag: &'static str,
    },
}

impl Error {
    /// Whether the failed operation may succeed on retry.
    ///
    /// Contract violations ([`Error::Unhandled`], [`Error::IllTypedReply`]) and
    /// closed sockets are never retryable; the rest defer to their fault kind.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database { fault, .. } => fault.is_retryable(),
            Self::Cache { fault, .. } => fault.is_retryable(),
            Self::Messaging { fault, .. } => fault.is_retryable(),
            Self::Storage { fault, .. } => fault.is_retryable(),
            Self::Auth { fault, .. } => fault.is_retryable(),
            Self::Metrics { fault, .. } => fault.is_retryable(),
            Self::WebSocketClosed { .. } | Self::Unhandled { .. } | Self::IllTypedReply { .. } => {
                false
            }
        }
    }

    /// The effect that triggered this error, for structured diagnostics.
    pub fn effect(&self) -> &Effect {
        match self {
            Self::Database { effect, .. }
            | Self::Cache { effect, .. }
            | Self::WebSocketClosed { effect, .. }
            | Self::Messaging { effect, .. }
            | Self::Storage { effect, .. }
            | Self::Auth { effect, .. }
            | Self::Metrics { effect, .. }
            | Self::Unhandled { effect, .. }
            | Self::IllTypedReply { effect, .. } => effect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_effect() -> Effect {
        Effect::GetUserById {
            user_id: uuid::Uuid::nil(),
        }
    }

    #[test]
    fn test_database_fault_retryability_table() {
        assert!(DatabaseFault::connection_reset("reset by peer").is_retryable());
        assert!(DatabaseFault::timeout("deadline exceeded").is_retryable());
        assert!(DatabaseFault::new(DatabaseFaultKind::PoolExhausted, "no conn").is_retryable());

        assert!(!DatabaseFault::constraint_violation("duplicate key").is_retryable());
        assert!(!DatabaseFault::new(DatabaseFaultKind::Schema, "no such column").is_retryable());
        assert!(!DatabaseFault::new(DatabaseFaultKind::QueryFailed, "syntax").is_retryable());
        assert!(
            !DatabaseFault::new(DatabaseFaultKind::PermissionDenied, "denied").is_retryable()
        );
    }

    #[test]
    fn test_cache_fault_retryability_table() {
        assert!(CacheFault::timeout("slow").is_retryable());
        assert!(CacheFault::new(CacheFaultKind::ConnectionLost, "gone").is_retryable());
        assert!(!CacheFault::value_too_large("8mb").is_retryable());
        assert!(!CacheFault::new(CacheFaultKind::Codec, "bad payload").is_retryable());
    }

    #[test]
    fn test_messaging_fault_retryability_table() {
        for kind in [
            MessagingFaultKind::Timeout,
            MessagingFaultKind::QuotaExceeded,
            MessagingFaultKind::Connection,
            MessagingFaultKind::Unavailable,
            MessagingFaultKind::Backpressure,
        ] {
            assert!(kind.is_retryable(), "{kind} should be retryable");
        }
        for kind in [
            MessagingFaultKind::TopicNotFound,
            MessagingFaultKind::Authentication,
            MessagingFaultKind::Authorization,
            MessagingFaultKind::InvalidPayload,
            MessagingFaultKind::UnknownMessageId,
        ] {
            assert!(!kind.is_retryable(), "{kind} should be permanent");
        }
    }

    #[test]
    fn test_storage_fault_retryability_table() {
        assert!(StorageFault::new(StorageFaultKind::QuotaExceeded, "over").is_retryable());
        assert!(StorageFault::new(StorageFaultKind::Network, "refused").is_retryable());
        assert!(StorageFault::new(StorageFaultKind::Timeout, "slow").is_retryable());
        assert!(!StorageFault::permission_denied("denied").is_retryable());
        assert!(!StorageFault::bucket_missing("no bucket").is_retryable());
        assert!(!StorageFault::new(StorageFaultKind::InvalidKey, "bad key").is_retryable());
    }

    #[test]
    fn test_auth_fault_retryability_table() {
        assert!(AuthFault::new(AuthFaultKind::BackendUnavailable, "down").is_retryable());
        assert!(!AuthFault::crypto("bad key material").is_retryable());
        assert!(!AuthFault::new(AuthFaultKind::KeyConfiguration, "no key").is_retryable());
    }

    #[test]
    fn test_metrics_fault_never_retryable() {
        assert!(!MetricsFault::new(MetricsFaultKind::InvalidRegistry, "dup").is_retryable());
        assert!(
            !MetricsFault::new(MetricsFaultKind::CollectorPanicked, "poisoned").is_retryable()
        );
    }

    #[test]
    fn test_error_carries_effect_and_retryability() {
        let error = Error::Database {
            effect: probe_effect(),
            fault: DatabaseFault::connection_reset("reset"),
        };
        assert!(error.is_retryable());
        assert_eq!(error.effect().tag(), "get_user_by_id");

        let error = Error::Unhandled {
            effect: probe_effect(),
            dispatcher_name: "CompositeHandler",
        };
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_display_includes_effect_tag() {
        let error = Error::Database {
            effect: probe_effect(),
            fault: DatabaseFault::timeout("deadline exceeded"),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("get_user_by_id"));
        assert!(rendered.contains("timeout"));
        assert!(rendered.contains("deadline exceeded"));
    }

    #[test]
    fn test_unhandled_display_names_dispatcher() {
        let error = Error::Unhandled {
            effect: Effect::SendText {
                text: "hi".to_string(),
            },
            dispatcher_name: "CompositeHandler",
        };
        let rendered = error.to_string();
        assert!(rendered.contains("send_text"));
        assert!(rendered.contains("CompositeHandler"));
    }

    #[test]
    fn test_fault_kind_display_is_snake_case() {
        assert_eq!(DatabaseFaultKind::ConnectionReset.to_string(), "connection_reset");
        assert_eq!(MessagingFaultKind::QuotaExceeded.to_string(), "quota_exceeded");
        assert_eq!(StorageFaultKind::BucketMissing.to_string(), "bucket_missing");
        assert_eq!(AuthFaultKind::BackendUnavailable.to_string(), "backend_unavailable");
        assert_eq!(MetricsFaultKind::InvalidRegistry.to_string(), "invalid_registry");
    }
}

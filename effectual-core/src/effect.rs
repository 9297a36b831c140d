//! Effect descriptions: immutable values naming a side effect and its inputs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ProfileData;
use crate::reply::Reply;

/// Default broker consume timeout when none is given.
pub const DEFAULT_CONSUME_TIMEOUT_MS: u32 = 5_000;

/// Default negative-acknowledge redelivery delay.
pub const DEFAULT_NACK_DELAY_MS: u32 = 0;

/// Default page size for object listings.
pub const DEFAULT_LIST_MAX_KEYS: u32 = 1_000;

/// Reason supplied when closing a WebSocket connection.
///
/// Maps onto the RFC 6455 close codes via [`CloseReason::wire_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Orderly close after a completed exchange (1000)
    Normal,
    /// The endpoint is shutting down (1001)
    GoingAway,
    /// The peer violated the protocol (1002)
    ProtocolError,
    /// The peer sent a message the policy forbids (1008)
    PolicyViolation,
}

impl CloseReason {
    /// The RFC 6455 close code for this reason
    pub fn wire_code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::PolicyViolation => 1008,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::GoingAway => write!(f, "going_away"),
            Self::ProtocolError => write!(f, "protocol_error"),
            Self::PolicyViolation => write!(f, "policy_violation"),
        }
    }
}

/// The seven effect families the runtime understands.
///
/// Family ownership drives composite dispatch; it is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectFamily {
    /// WebSocket peer I/O
    WebSocket,
    /// Relational persistence
    Database,
    /// Profile cache
    Cache,
    /// Broker publish/consume
    Messaging,
    /// Bucket object storage
    Storage,
    /// Tokens, passwords, identity
    Auth,
    /// Metric recording and queries
    Metrics,
}

impl fmt::Display for EffectFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "websocket"),
            Self::Database => write!(f, "database"),
            Self::Cache => write!(f, "cache"),
            Self::Messaging => write!(f, "messaging"),
            Self::Storage => write!(f, "storage"),
            Self::Auth => write!(f, "auth"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

/// An immutable description of one side effect.
///
/// Variants carry inputs only; the reply flows back through the producer
/// protocol, never through the effect itself. The set is closed: handlers
/// dispatch on [`Effect::family`] and the driver checks replies against
/// [`Effect::accepts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    // -- WebSocket -----------------------------------------------------------
    /// Send a text frame to the peer
    SendText {
        /// Frame body
        text: String,
    },
    /// Wait for the next text frame from the peer
    ReceiveText,
    /// Close the connection
    Close {
        /// Close reason, mapped to a wire code
        reason: CloseReason,
    },

    // -- Database ------------------------------------------------------------
    /// Look up a user by primary id
    GetUserById {
        /// User primary id
        user_id: Uuid,
    },
    /// Persist a chat message authored by a user
    SaveChatMessage {
        /// Author
        user_id: Uuid,
        /// Message body
        text: String,
    },

    // -- Cache ---------------------------------------------------------------
    /// Fetch a cached profile
    GetCachedProfile {
        /// Profile owner
        user_id: Uuid,
    },
    /// Store a profile with a TTL
    PutCachedProfile {
        /// Profile owner
        user_id: Uuid,
        /// Payload to cache
        profile: ProfileData,
        /// Time to live in seconds
        ttl_seconds: u32,
    },

    // -- Messaging -----------------------------------------------------------
    /// Publish a payload to a topic
    PublishMessage {
        /// Destination topic
        topic: String,
        /// Payload bytes
        payload: Vec<u8>,
        /// Broker properties
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    /// Wait up to `timeout_ms` for the next message on a subscription
    ConsumeMessage {
        /// Subscription name
        subscription: String,
        /// How long to wait before replying with a timeout
        timeout_ms: u32,
    },
    /// Acknowledge a delivered message
    AcknowledgeMessage {
        /// Broker message id
        message_id: String,
    },
    /// Reject a delivered message; the broker redelivers no earlier than
    /// `delay_ms` after this call
    NegativeAcknowledge {
        /// Broker message id
        message_id: String,
        /// Minimum redelivery delay
        delay_ms: u32,
    },

    // -- Storage -------------------------------------------------------------
    /// Fetch an object
    GetObject {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },
    /// Store an object, overwriting any existing content
    PutObject {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Object content
        content: Vec<u8>,
        /// User metadata
        #[serde(default)]
        metadata: BTreeMap<String, String>,
        /// MIME content type
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// Delete an object; deleting a missing key succeeds
    DeleteObject {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },
    /// List keys under an optional prefix, truncated to `max_keys`
    ListObjects {
        /// Bucket name
        bucket: String,
        /// Key prefix filter
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        /// Page size cap
        max_keys: u32,
    },

    // -- Auth ----------------------------------------------------------------
    /// Check a token's signature, expiry, and claims
    ValidateToken {
        /// Encoded token
        token: String,
    },
    /// Mint a token for a user
    GenerateToken {
        /// Subject
        user_id: Uuid,
        /// Claims embedded in the token
        claims: BTreeMap<String, String>,
        /// Token lifetime in seconds
        ttl_seconds: u32,
    },
    /// Exchange a refresh token for a new access token
    RefreshToken {
        /// Encoded refresh token
        refresh_token: String,
    },
    /// Revoke a token; revoking an unknown token succeeds
    RevokeToken {
        /// Encoded token
        token: String,
    },
    /// Hash a password with the backend's slow KDF
    HashPassword {
        /// Plaintext password
        password: String,
    },
    /// Verify a password against a stored hash
    ValidatePassword {
        /// Plaintext candidate
        password: String,
        /// Stored hash
        password_hash: String,
    },
    /// Look up a user by email
    GetUserByEmail {
        /// Login email
        email: String,
    },

    // -- Metrics -------------------------------------------------------------
    /// Add to a counter series
    IncrementCounter {
        /// Registered counter name
        metric_name: String,
        /// Label values, keyed exactly by the registered label names
        labels: BTreeMap<String, String>,
        /// Increment, which must be finite and non-negative
        value: f64,
    },
    /// Set a gauge series
    RecordGauge {
        /// Registered gauge name
        metric_name: String,
        /// Label values, keyed exactly by the registered label names
        labels: BTreeMap<String, String>,
        /// New gauge value
        value: f64,
    },
    /// Observe a histogram sample
    ObserveHistogram {
        /// Registered histogram name
        metric_name: String,
        /// Label values, keyed exactly by the registered label names
        labels: BTreeMap<String, String>,
        /// Observed sample
        value: f64,
    },
    /// Observe a summary sample
    RecordSummary {
        /// Registered summary name
        metric_name: String,
        /// Label values, keyed exactly by the registered label names
        labels: BTreeMap<String, String>,
        /// Observed sample
        value: f64,
    },
    /// Read current values for a metric
    QueryMetrics {
        /// Registered metric name
        metric_name: String,
        /// Optional label filter; when present, must match the registered
        /// label names exactly
        #[serde(default, skip_serializing_if = "Option::is_none")]
        labels: Option<BTreeMap<String, String>>,
    },
    /// Clear all collected series. Test environments only; gated by policy.
    ResetMetrics,
}

impl Effect {
    /// Build a [`Effect::ConsumeMessage`] with the default timeout.
    pub fn consume_message(subscription: impl Into<String>) -> Self {
        Self::ConsumeMessage {
            subscription: subscription.into(),
            timeout_ms: DEFAULT_CONSUME_TIMEOUT_MS,
        }
    }

    /// Build a [`Effect::NegativeAcknowledge`] with no redelivery delay.
    pub fn negative_acknowledge(message_id: impl Into<String>) -> Self {
        Self::NegativeAcknowledge {
            message_id: message_id.into(),
            delay_ms: DEFAULT_NACK_DELAY_MS,
        }
    }

    /// Build a [`Effect::ListObjects`] over a whole bucket with the default
    /// page size.
    pub fn list_objects(bucket: impl Into<String>) -> Self {
        Self::ListObjects {
            bucket: bucket.into(),
            prefix: None,
            max_keys: DEFAULT_LIST_MAX_KEYS,
        }
    }

    /// Build a [`Effect::PublishMessage`] without properties.
    pub fn publish_message(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::PublishMessage {
            topic: topic.into(),
            payload: payload.into(),
            properties: BTreeMap::new(),
        }
    }

    /// The family that owns this effect.
    pub fn family(&self) -> EffectFamily {
        match self {
            Self::SendText { .. } | Self::ReceiveText | Self::Close { .. } => {
                EffectFamily::WebSocket
            }
            Self::GetUserById { .. } | Self::SaveChatMessage { .. } => EffectFamily::Database,
            Self::GetCachedProfile { .. } | Self::PutCachedProfile { .. } => EffectFamily::Cache,
            Self::PublishMessage { .. }
            | Self::ConsumeMessage { .. }
            | Self::AcknowledgeMessage { .. }
            | Self::NegativeAcknowledge { .. } => EffectFamily::Messaging,
            Self::GetObject { .. }
            | Self::PutObject { .. }
            | Self::DeleteObject { .. }
            | Self::ListObjects { .. } => EffectFamily::Storage,
            Self::ValidateToken { .. }
            | Self::GenerateToken { .. }
            | Self::RefreshToken { .. }
            | Self::RevokeToken { .. }
            | Self::HashPassword { .. }
            | Self::ValidatePassword { .. }
            | Self::GetUserByEmail { .. } => EffectFamily::Auth,
            Self::IncrementCounter { .. }
            | Self::RecordGauge { .. }
            | Self::ObserveHistogram { .. }
            | Self::RecordSummary { .. }
            | Self::QueryMetrics { .. }
            | Self::ResetMetrics => EffectFamily::Metrics,
        }
    }

    /// Stable snake_case tag for this variant, suitable for log grouping.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::ReceiveText => "receive_text",
            Self::Close { .. } => "close",
            Self::GetUserById { .. } => "get_user_by_id",
            Self::SaveChatMessage { .. } => "save_chat_message",
            Self::GetCachedProfile { .. } => "get_cached_profile",
            Self::PutCachedProfile { .. } => "put_cached_profile",
            Self::PublishMessage { .. } => "publish_message",
            Self::ConsumeMessage { .. } => "consume_message",
            Self::AcknowledgeMessage { .. } => "acknowledge_message",
            Self::NegativeAcknowledge { .. } => "negative_acknowledge",
            Self::GetObject { .. } => "get_object",
            Self::PutObject { .. } => "put_object",
            Self::DeleteObject { .. } => "delete_object",
            Self::ListObjects { .. } => "list_objects",
            Self::ValidateToken { .. } => "validate_token",
            Self::GenerateToken { .. } => "generate_token",
            Self::RefreshToken { .. } => "refresh_token",
            Self::RevokeToken { .. } => "revoke_token",
            Self::HashPassword { .. } => "hash_password",
            Self::ValidatePassword { .. } => "validate_password",
            Self::GetUserByEmail { .. } => "get_user_by_email",
            Self::IncrementCounter { .. } => "increment_counter",
            Self::RecordGauge { .. } => "record_gauge",
            Self::ObserveHistogram { .. } => "observe_histogram",
            Self::RecordSummary { .. } => "record_summary",
            Self::QueryMetrics { .. } => "query_metrics",
            Self::ResetMetrics => "reset_metrics",
        }
    }

    /// Whether `reply` is in this effect's designated reply set.
    ///
    /// The driver checks this after every successful `handle` call; a reply
    /// outside the set is a contract violation, not a domain state.
    pub fn accepts(&self, reply: &Reply) -> bool {
        use Effect as E;
        use Reply as R;
        matches!(
            (self, reply),
            (E::SendText { .. }, R::Unit)
                | (E::ReceiveText, R::Text { .. })
                | (E::Close { .. }, R::Unit)
                | (E::GetUserById { .. }, R::User(_) | R::UserNotFound { .. })
                | (E::SaveChatMessage { .. }, R::ChatMessage(_))
                | (E::GetCachedProfile { .. }, R::ProfileData(_) | R::CacheMiss { .. })
                | (E::PutCachedProfile { .. }, R::Unit)
                | (E::PublishMessage { .. }, R::MessageIdString { .. })
                | (E::ConsumeMessage { .. }, R::MessageEnvelope(_) | R::MessageTimeout)
                | (E::AcknowledgeMessage { .. }, R::Unit)
                | (E::NegativeAcknowledge { .. }, R::Unit)
                | (E::GetObject { .. }, R::S3Object(_) | R::ObjectAbsent)
                | (E::PutObject { .. }, R::PutSuccess { .. })
                | (E::DeleteObject { .. }, R::Unit)
                | (E::ListObjects { .. }, R::KeyList { .. })
                | (
                    E::ValidateToken { .. },
                    R::TokenValid { .. } | R::TokenExpired { .. } | R::TokenInvalid { .. }
                )
                | (E::GenerateToken { .. }, R::Text { .. })
                | (
                    E::RefreshToken { .. },
                    R::TokenRefreshed { .. } | R::TokenRefreshFailed
                )
                | (E::RevokeToken { .. }, R::Unit)
                | (E::HashPassword { .. }, R::Hash { .. })
                | (E::ValidatePassword { .. }, R::PasswordValid { .. })
                | (E::GetUserByEmail { .. }, R::User(_) | R::UserNotFound { .. })
                | (
                    E::IncrementCounter { .. }
                        | E::RecordGauge { .. }
                        | E::ObserveHistogram { .. }
                        | E::RecordSummary { .. }
                        | E::ResetMetrics,
                    R::MetricRecorded { .. } | R::MetricRecordingFailed { .. }
                )
                | (
                    E::QueryMetrics { .. },
                    R::QuerySuccess { .. } | R::QueryFailure { .. }
                )
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

//! Typed values handlers return to a suspended producer

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChatMessage, MessageEnvelope, MissingUserReason, ProfileData, S3Object, User};

/// The value a handler produces for a yielded effect.
///
/// This is a closed union: every effect variant designates a non-empty subset
/// of it (see [`crate::effect::Effect::accepts`]). Expected domain states such
/// as a cache miss or an expired token are reply variants, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    /// The effect completed and carries no data
    Unit,
    /// A text value (received frame, minted token)
    Text {
        /// The carried text
        text: String,
    },
    /// A user row
    User(User),
    /// A user lookup came back empty
    UserNotFound {
        /// The id that was looked up (nil for email lookups)
        user_id: Uuid,
        /// Why the lookup came back empty
        reason: MissingUserReason,
    },
    /// A persisted chat message with its assigned id and timestamp
    ChatMessage(ChatMessage),
    /// A cached profile hit
    ProfileData(ProfileData),
    /// The cache had no entry for the key
    CacheMiss {
        /// The key that missed
        key: String,
        /// Backend-supplied miss reason (for example `not_found`, `expired`)
        reason: String,
    },
    /// The token verified and is current
    TokenValid {
        /// Token subject
        user_id: Uuid,
        /// Claims carried by the token
        claims: BTreeMap<String, String>,
    },
    /// The token verified but its lifetime has passed
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// The token failed verification
    TokenInvalid {
        /// Why verification failed (for example `bad_signature`,
        /// `algorithm_mismatch`)
        reason: String,
    },
    /// A refresh exchange minted a new access token
    TokenRefreshed {
        /// The new access token
        access_token: String,
    },
    /// The refresh token was not accepted
    TokenRefreshFailed,
    /// A message delivered from a subscription
    MessageEnvelope(MessageEnvelope),
    /// No message arrived within the consume timeout
    MessageTimeout,
    /// The broker-assigned id of a published message
    MessageIdString {
        /// Broker message id
        id: String,
    },
    /// An object fetched from a bucket
    S3Object(S3Object),
    /// The bucket has no object at the key
    ObjectAbsent,
    /// An object write was accepted
    PutSuccess {
        /// Object key
        key: String,
        /// Bucket name
        bucket: String,
        /// Backend version id, when versioning is enabled
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version_id: Option<String>,
    },
    /// Keys found by a listing, truncated to the requested page size
    KeyList {
        /// Matching keys in the port's order
        keys: Vec<String>,
    },
    /// A password hash in the backend's self-describing format
    Hash {
        /// The hash string
        hash: String,
    },
    /// Result of a password check
    PasswordValid {
        /// Whether the candidate matched
        valid: bool,
    },
    /// A metric sample was accepted by the collector
    MetricRecorded {
        /// Monotonic seconds since process start
        timestamp: f64,
    },
    /// A metric sample was rejected; recording failures are replies, never
    /// errors
    MetricRecordingFailed {
        /// Machine-matchable reason, such as `type_mismatch` or
        /// `missing_label: status`
        reason: String,
    },
    /// Current values for a queried metric
    QuerySuccess {
        /// Fully-rendered series name to current value
        metrics: BTreeMap<String, f64>,
        /// Monotonic seconds since process start
        timestamp: f64,
    },
    /// The query could not be answered
    QueryFailure {
        /// Machine-matchable reason
        reason: String,
    },
}

impl Reply {
    /// Stable snake_case tag for this variant, suitable for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Text { .. } => "text",
            Self::User(_) => "user",
            Self::UserNotFound { .. } => "user_not_found",
            Self::ChatMessage(_) => "chat_message",
            Self::ProfileData(_) => "profile_data",
            Self::CacheMiss { .. } => "cache_miss",
            Self::TokenValid { .. } => "token_valid",
            Self::TokenExpired { .. } => "token_expired",
            Self::TokenInvalid { .. } => "token_invalid",
            Self::TokenRefreshed { .. } => "token_refreshed",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::MessageEnvelope(_) => "message_envelope",
            Self::MessageTimeout => "message_timeout",
            Self::MessageIdString { .. } => "message_id_string",
            Self::S3Object(_) => "s3_object",
            Self::ObjectAbsent => "object_absent",
            Self::PutSuccess { .. } => "put_success",
            Self::KeyList { .. } => "key_list",
            Self::Hash { .. } => "hash",
            Self::PasswordValid { .. } => "password_valid",
            Self::MetricRecorded { .. } => "metric_recorded",
            Self::MetricRecordingFailed { .. } => "metric_recording_failed",
            Self::QuerySuccess { .. } => "query_success",
            Self::QueryFailure { .. } => "query_failure",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

//! Immutable domain entities shared across effect families

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary identifier
    pub id: Uuid,
    /// Login email, unique per user
    pub email: String,
    /// Display name
    pub name: String,
}

impl User {
    /// Create a new user record
    pub fn new(id: Uuid, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
        }
    }
}

/// A persisted chat message with its storage-assigned id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Storage-assigned identifier
    pub id: Uuid,
    /// Author
    pub user_id: Uuid,
    /// Message body
    pub text: String,
    /// Storage-assigned creation time
    pub created_at: DateTime<Utc>,
}

/// Cached profile payload.
///
/// The id is a free-form string rather than a [`Uuid`] because cache keys may
/// be derived from external identity providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    /// Profile identifier (cache key component)
    pub id: String,
    /// Display name
    pub name: String,
    /// Email, when the upstream source provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileData {
    /// Create a profile without an email
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    /// Attach an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A message delivered from a broker subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Broker-assigned message id
    pub message_id: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Broker properties attached at publish time
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Broker publish timestamp
    pub publish_time: DateTime<Utc>,
    /// Topic the message was published to
    pub topic: String,
}

/// An object fetched from a bucket store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Object key within its bucket
    pub key: String,
    /// Object content
    pub content: Vec<u8>,
    /// User metadata stored alongside the object
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// MIME content type, when recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Content length in bytes
    pub size: u64,
}

/// A field value whose absence carries a reason, distinct from "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionalValue<T> {
    /// The value is present
    Provided {
        /// The carried value
        value: T,
    },
    /// The value is absent for a stated reason
    Absent {
        /// Why the value is missing
        reason: String,
    },
}

impl<T> OptionalValue<T> {
    /// Wrap a present value
    pub fn provided(value: T) -> Self {
        Self::Provided { value }
    }

    /// Record an absence with its reason
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: reason.into(),
        }
    }

    /// Returns the value if present
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Provided { value } => Some(value),
            Self::Absent { .. } => None,
        }
    }
}

/// Why a user lookup came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingUserReason {
    /// No row exists for the identifier
    DoesNotExist,
    /// The row exists but is soft-deleted
    Deleted,
    /// The caller may not see this row
    AccessDenied,
    /// An email lookup matched no account
    EmailNotFound,
}

impl fmt::Display for MissingUserReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoesNotExist => write!(f, "does_not_exist"),
            Self::Deleted => write!(f, "deleted"),
            Self::AccessDenied => write!(f, "access_denied"),
            Self::EmailNotFound => write!(f, "email_not_found"),
        }
    }
}

/// Result of a user lookup at the database or auth port.
///
/// Absence is an expected state, not an error; infrastructure failures travel
/// separately as faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserLookup {
    /// The user was found
    Found(User),
    /// No user matched
    NotFound {
        /// The id that was looked up (nil for email lookups)
        user_id: Uuid,
        /// Why the lookup came back empty
        reason: MissingUserReason,
    },
}

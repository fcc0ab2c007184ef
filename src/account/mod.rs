//! Registered account records and the registry that owns them.

mod registry;

pub use registry::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registered account, as saved on the local record store.
///
/// Serialized in camelCase so the persisted JSON matches the payloads the
/// original site wrote under its `registeredUsers` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Opaque identifier assigned at creation, never reused.
    pub id: String,
    /// Display name, unique across all records (case-insensitive).
    pub username: String,
    /// Unique across all records (case-insensitive), restricted to the
    /// configured mail domain.
    pub email: String,
    /// Stored verbatim. Weak by design, inherited from the source site.
    pub password: String,
    /// Set at creation, immutable thereafter.
    pub registration_date: DateTime<Utc>,
    /// False at creation, flipped to true exactly once by a successful
    /// verification. Never reverts.
    pub is_verified: bool,
    /// Code issued at registration. Stale once verified, and a resend does
    /// not refresh it.
    pub verification_code: String,
}

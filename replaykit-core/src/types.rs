//! Wire models for the replay-management API.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// An access/refresh credential pair.
///
/// The two tokens travel together: they are written and cleared atomically,
/// never persisted one without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Short-lived bearer credential authorizing API calls.
    pub access_token: String,
    /// Longer-lived credential exchanged for a new pair on expiry.
    pub refresh_token: String,
}

/// Envelope returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Credential for the next refresh exchange.
    pub refresh_token: String,
    /// Token scheme, `"bearer"`.
    #[serde(default)]
    pub token_type: String,
    /// Access token validity in seconds.
    #[serde(default)]
    pub expires_in: i64,
}

impl TokenResponse {
    /// Extracts the credential pair from the envelope.
    #[must_use]
    pub fn into_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Authorization role attached to a user account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Full management access, including deletes.
    Admin,
    /// Read access plus audit surfaces.
    Auditor,
    /// Read-only access. The default when no profile is held.
    #[default]
    Viewer,
}

/// Authenticated user profile, as returned by `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable account identifier.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Contact address, when set.
    #[serde(default)]
    pub email: Option<String>,
    /// Human-readable name, when set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Authorization role.
    #[serde(default)]
    pub role: Role,
    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Lifecycle status of a stored replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReplayStatus {
    /// Available for playback.
    Active,
    /// Moved out of the active listing but retained.
    Archived,
    /// Soft-deleted.
    Deleted,
}

/// A recorded session replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Stable replay identifier.
    pub id: Uuid,
    /// Recording file name.
    pub filename: String,
    /// Session label, when captured.
    #[serde(default)]
    pub session_name: Option<String>,
    /// Username the session belonged to.
    #[serde(default)]
    pub owner_username: Option<String>,
    /// Client address the session originated from.
    #[serde(default)]
    pub client_ip: Option<String>,
    /// Recording size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Recording duration in seconds.
    #[serde(default)]
    pub duration_seconds: u64,
    /// Session start timestamp (ISO 8601), when captured.
    #[serde(default)]
    pub session_start: Option<String>,
    /// Session end timestamp (ISO 8601), when captured.
    #[serde(default)]
    pub session_end: Option<String>,
    /// When the recording entered the archive (ISO 8601).
    #[serde(default)]
    pub imported_at: Option<String>,
    /// Lifecycle status.
    pub status: ReplayStatus,
    /// Remote-access protocol of the recorded session.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Host the session connected to.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Connection label of the recorded session.
    #[serde(default)]
    pub connection_name: Option<String>,
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page; never more than `page_size` entries.
    pub items: Vec<T>,
    /// Size of the full filtered collection, not of `items`.
    pub total: u64,
    /// 1-based page index.
    #[serde(default)]
    pub page: u64,
    /// Requested page size.
    #[serde(default)]
    pub page_size: u64,
    /// Server-computed page count.
    #[serde(default)]
    pub total_pages: u64,
}

/// Dashboard overview statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOverview {
    /// Count of active replays.
    #[serde(default)]
    pub total_replays: u64,
    /// Count of active user accounts.
    #[serde(default)]
    pub total_users: u64,
    /// Bytes of replay storage in use.
    #[serde(default)]
    pub total_storage_bytes: u64,
    /// Replays imported since midnight.
    #[serde(default)]
    pub replays_today: u64,
    /// Replays imported since the start of the week.
    #[serde(default)]
    pub replays_this_week: u64,
    /// Sessions currently being recorded.
    #[serde(default)]
    pub active_sessions: u64,
}

/// Entry in the top-users-by-replay-count ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUser {
    /// Login name.
    pub username: String,
    /// Human-readable name, when set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Replays owned by this user.
    #[serde(default)]
    pub replay_count: u64,
    /// Combined duration of this user's replays, in seconds.
    #[serde(default)]
    pub total_duration_seconds: u64,
}

/// Daily bucket of the replays-over-time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaysByDay {
    /// Bucket day, `YYYY-MM-DD`.
    pub date: String,
    /// Replays imported that day.
    #[serde(default)]
    pub count: u64,
    /// Combined duration of that day's replays, in seconds.
    #[serde(default)]
    pub total_duration_seconds: u64,
}

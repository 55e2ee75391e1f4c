//! Session-related types.
//!
//! Types stored in the session for authentication state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::UserId;

/// Session-stored user identity.
///
/// Written by whatever signs the user in; the order API only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's ID in the identity provider.
    pub id: UserId,
    /// When the session was authenticated.
    pub authenticated_at: DateTime<Utc>,
}

impl CurrentUser {
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            authenticated_at: Utc::now(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

//! User identity and auth events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Auth state changes, delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A session was established for the user
    SignedIn { user_id: Uuid },
    /// A session was cleared
    SignedOut { user_id: Uuid },
}

impl AuthEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            AuthEvent::SignedIn { user_id } | AuthEvent::SignedOut { user_id } => *user_id,
        }
    }
}

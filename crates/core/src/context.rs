//! Per-request identity handed to every engine call.

use serde::{Deserialize, Serialize};

/// The user on whose behalf an operation runs.
///
/// Set by the caller (HTTP layer or scheduler); engines never look up a
/// "current user" on their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// True when `owner_id` is this context's user.
    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id == owner_id
    }
}

//! Allowlist policy — who may use the relay.
//!
//! Authorization is the first gate of every relay operation: a denied caller
//! never reaches moderation, the session store, or a backend.

use std::collections::HashSet;

use chatrelay_core::UserId;

/// Result of checking a user against the allowlist.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// User is allowed
    Allowed,
    /// User is denied
    Denied { user_id: String, reason: String },
}

/// Static allow-list of user identifiers.
///
/// Rules:
/// - Empty list → deny all (fail closed)
/// - List contains `"*"` → allow all
/// - Otherwise, the user must be in the list
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    allowed: HashSet<String>,
    allow_all: bool,
}

impl AccessControl {
    pub fn new<I, S>(allowed_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed = HashSet::new();
        let mut allow_all = false;
        for user in allowed_users {
            let user = user.into();
            if user == "*" {
                allow_all = true;
            } else {
                allowed.insert(user);
            }
        }
        Self { allowed, allow_all }
    }

    pub fn from_config(config: &chatrelay_config::AppConfig) -> Self {
        Self::new(config.allowed_users.iter().cloned())
    }

    pub fn is_authorized(&self, user_id: &UserId) -> bool {
        matches!(self.check(user_id), AccessDecision::Allowed)
    }

    /// Check a user and explain a denial.
    pub fn check(&self, user_id: &UserId) -> AccessDecision {
        if self.allow_all {
            return AccessDecision::Allowed;
        }

        if self.allowed.is_empty() {
            return AccessDecision::Denied {
                user_id: user_id.to_string(),
                reason: "No users configured (deny by default)".into(),
            };
        }

        if self.allowed.contains(user_id.as_str()) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied {
                user_id: user_id.to_string(),
                reason: format!(
                    "User '{}' not in allowlist ({} users configured)",
                    user_id,
                    self.allowed.len()
                ),
            }
        }
    }
}

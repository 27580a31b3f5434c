//! Moderation filter — what may enter a conversation.
//!
//! Stateless. Runs after authorization and before any history mutation, so a
//! rejected message never reaches the session store or a backend.

use serde::{Deserialize, Serialize};

/// Why a message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooLong,
    BannedTerm,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TooLong => f.write_str("too_long"),
            RejectReason::BannedTerm => f.write_str("banned_term"),
        }
    }
}

/// Result of a moderation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Rejected(RejectReason),
}

/// Length bound and banned substrings. Terms are stored lowercase.
#[derive(Debug, Clone)]
pub struct ModerationPolicy {
    pub max_length: usize,
    pub banned_terms: Vec<String>,
}

impl ModerationPolicy {
    pub fn new<I, S>(max_length: usize, banned_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let banned_terms = banned_terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            max_length,
            banned_terms,
        }
    }

    pub fn from_config(config: &chatrelay_config::ModerationConfig) -> Self {
        Self::new(config.max_length, &config.banned_terms)
    }
}

#[derive(Debug, Clone)]
pub struct ModerationFilter {
    policy: ModerationPolicy,
}

impl ModerationFilter {
    pub fn new(policy: ModerationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    /// Length is checked first, in characters, regardless of content.
    pub fn check(&self, text: &str) -> Verdict {
        if text.chars().count() > self.policy.max_length {
            return Verdict::Rejected(RejectReason::TooLong);
        }

        let lowered = text.to_lowercase();
        if self
            .policy
            .banned_terms
            .iter()
            .any(|term| lowered.contains(term.as_str()))
        {
            return Verdict::Rejected(RejectReason::BannedTerm);
        }

        Verdict::Allowed
    }
}

//! Security module for ChatRelay — access control, moderation, and audit logging.
//!
//! Provides:
//! - **Allowlist**: which users may talk to the relay at all
//! - **Moderation**: which messages may enter a conversation
//! - **Audit logging**: structured record of every relay decision

pub mod allowlist;
pub mod audit;
pub mod moderation;

pub use allowlist::{AccessControl, AccessDecision};
pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use moderation::{ModerationFilter, ModerationPolicy, RejectReason, Verdict};

//! # ChatRelay Core
//!
//! Domain types, traits, and error definitions for the ChatRelay
//! conversational relay. This crate has **no I/O of its own** — it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Text generation backends and the message catalog are traits here;
//! implementations live in their respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod i18n;
pub mod message;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use backend::Backend;
pub use error::{BackendError, RelayError};
pub use i18n::{Language, MessageCatalog, MessageId, StaticCatalog};
pub use message::{Role, Turn, UserId};
pub use session::UserSession;

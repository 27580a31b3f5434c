//! The relay pipeline — the heart of ChatRelay.
//!
//! Every query runs the same sequence:
//!
//! 1. **Authorize** the caller against the allow-list
//! 2. **Moderate** the text (length bound, banned terms)
//! 3. **Append** the user turn under the user's session lock
//! 4. **Trim** history to the character budget, newest turns first
//! 5. **Build** a role-tagged prompt
//! 6. **Execute** against the session's backend with retries; on exhaustion
//!    the session fails over to the next backend for its *next* query
//! 7. **Append** the reply and return it, or return a localized error

pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod session;

pub use context::{ContextTrimmer, PromptBuilder, build_prompt, trim};
pub use executor::{Executor, RetryPolicy};
pub use orchestrator::{Query, Relay, Reply};
pub use session::SessionStore;

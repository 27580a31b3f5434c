//! History → prompt pipeline.
//!
//! | Step | Module | Guarantee |
//! |------|--------|-----------|
//! | Trim | [`trimmer`] | Newest turns kept, oldest dropped, no gaps |
//! | Build | [`prompt`] | Deterministic `Role: content` lines + `Assistant: ` cue |

pub mod prompt;
pub mod trimmer;

pub use prompt::{PromptBuilder, build_prompt};
pub use trimmer::{ContextTrimmer, trim};

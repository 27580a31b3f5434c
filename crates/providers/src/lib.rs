//! Text generation backends for ChatRelay.
//!
//! All backends implement the `chatrelay_core::Backend` trait.
//! The pool holds them in configured order and performs single, timed,
//! classified attempts; retrying is left to the relay's executor.

mod http;
pub mod huggingface;
pub mod openai_compat;
pub mod pool;

pub use huggingface::HuggingFaceBackend;
pub use openai_compat::OpenAiCompatBackend;
pub use pool::{BackendPool, build_from_config};

//! Prompt builder — bounded history → single textual prompt.
//!
//! Format, one line per turn in chronological order:
//!
//! ```text
//! User: What is a null object?
//! Assistant: An empty transform used as a parent.
//! User: How do I add one?
//! Assistant:
//! ```
//!
//! The final `"Assistant: "` cue has no newline; generation starts there.
//! Labels are fixed English strings whatever the user's UI language.

use chatrelay_config::PromptConfig;
use chatrelay_core::{Language, Role, Turn};

/// System instruction placed ahead of the question in the rephrase flow.
pub const REPHRASE_INSTRUCTION: &str =
    "Rephrase the user's question so it is clear and self-contained. Reply with the question only.";

/// Serialize bounded history into a prompt.
pub fn build_prompt(history: &[Turn]) -> String {
    let mut prompt = String::with_capacity(history.iter().map(|t| t.content.len() + 12).sum::<usize>() + 11);
    for turn in history {
        push_line(&mut prompt, turn.role.label(), &turn.content);
    }
    prompt.push_str(Role::Assistant.label());
    prompt.push_str(": ");
    prompt
}

fn push_line(prompt: &mut String, label: &str, content: &str) {
    prompt.push_str(label);
    prompt.push_str(": ");
    prompt.push_str(content);
    prompt.push('\n');
}

/// Prompt builder with an optional leading system line.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    preamble: Option<String>,
}

impl PromptBuilder {
    pub fn new(preamble: Option<String>) -> Self {
        Self {
            preamble: preamble.filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.preamble.clone())
    }

    /// Build the prompt for a user speaking `language`. Without a preamble
    /// this is exactly [`build_prompt`].
    pub fn build(&self, history: &[Turn], language: Language) -> String {
        let mut prompt = self.system(language);
        prompt.push_str(&build_prompt(history));
        prompt
    }

    /// Build a rephrase prompt. `question` is the already-bounded question
    /// history; the instruction is a separate system line so trimming never
    /// competes with it.
    pub fn rephrase(&self, question: &[Turn], language: Language) -> String {
        let mut prompt = self.system(language);
        push_line(&mut prompt, "System", REPHRASE_INSTRUCTION);
        prompt.push_str(&build_prompt(question));
        prompt
    }

    fn system(&self, language: Language) -> String {
        let mut prompt = String::new();
        if let Some(preamble) = &self.preamble {
            let system = preamble.replace("{language}", language.english_name());
            push_line(&mut prompt, "System", &system);
        }
        prompt
    }
}

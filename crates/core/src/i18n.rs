//! Languages and the localized message catalog.
//!
//! The relay never composes user-facing prose. It picks a [`MessageId`] and
//! asks a [`MessageCatalog`] for the text in the user's [`Language`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A UI language the relay can answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ar];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    /// English name, used in prompt preambles.
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ar => "Arabic",
        }
    }

    /// Parse a language code or one of the keyboard labels offered by the
    /// chat front end. Returns `None` for anything else.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "🇬🇧 English" => return Some(Language::En),
            "🇸🇦 العربية" => return Some(Language::Ar),
            _ => {}
        }
        match input.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "ar" | "arabic" | "العربية" => Some(Language::Ar),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Identifier of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageId {
    /// Generic failure (permanent backend error, nothing to rephrase).
    Error,
    /// Backend retries exhausted; try again later.
    Timeout,
    /// Input rejected by moderation.
    Rejected,
    /// Caller is not on the allow-list.
    Blocked,
    /// Session ready (after reset or language change).
    Ready,
    /// Requested language is not supported.
    InvalidLanguage,
}

impl MessageId {
    pub const ALL: [MessageId; 6] = [
        MessageId::Error,
        MessageId::Timeout,
        MessageId::Rejected,
        MessageId::Blocked,
        MessageId::Ready,
        MessageId::InvalidLanguage,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MessageId::Error => "error",
            MessageId::Timeout => "timeout",
            MessageId::Rejected => "rejected",
            MessageId::Blocked => "blocked",
            MessageId::Ready => "ready",
            MessageId::InvalidLanguage => "invalid_language",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }
}

/// Source of localized strings.
pub trait MessageCatalog: Send + Sync {
    fn lookup(&self, id: MessageId, language: Language) -> String;
}

/// Built-in English/Arabic catalog with optional per-language overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    overrides: HashMap<(Language, MessageId), String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a single entry.
    pub fn with_override(mut self, language: Language, id: MessageId, text: impl Into<String>) -> Self {
        self.overrides.insert((language, id), text.into());
        self
    }

    /// Apply overrides keyed by language code, then message key.
    /// Unknown languages or keys are skipped with a warning.
    pub fn with_overrides(mut self, table: &HashMap<String, HashMap<String, String>>) -> Self {
        for (code, entries) in table {
            let Some(language) = Language::parse(code) else {
                tracing::warn!(language = %code, "Ignoring message overrides for unknown language");
                continue;
            };
            for (key, text) in entries {
                match MessageId::from_key(key) {
                    Some(id) => {
                        self.overrides.insert((language, id), text.clone());
                    }
                    None => {
                        tracing::warn!(language = %code, key = %key, "Ignoring unknown message key");
                    }
                }
            }
        }
        self
    }

    fn builtin(id: MessageId, language: Language) -> &'static str {
        match (language, id) {
            (Language::En, MessageId::Error) => "❌ Something went wrong. Please try again.",
            (Language::Ar, MessageId::Error) => "❌ حدث خطأ. حاول مرة أخرى.",
            (Language::En, MessageId::Timeout) => {
                "⏳ The assistant is not responding right now. Please try again in a moment."
            }
            (Language::Ar, MessageId::Timeout) => "⏳ المساعد لا يستجيب حاليًا. حاول مرة أخرى بعد قليل.",
            (Language::En, MessageId::Rejected) => {
                "🚫 Your message was rejected. Please keep it short and on topic."
            }
            (Language::Ar, MessageId::Rejected) => "🚫 تم رفض رسالتك. يرجى أن تكون قصيرة وضمن الموضوع.",
            (Language::En, MessageId::Blocked) => "⛔ You are not allowed to use this bot.",
            (Language::Ar, MessageId::Blocked) => "⛔ غير مسموح لك باستخدام هذا البوت.",
            (Language::En, MessageId::Ready) => "✅ Ready. Ask me anything!",
            (Language::Ar, MessageId::Ready) => "✅ جاهز. اسألني أي شيء!",
            (Language::En, MessageId::InvalidLanguage) => "Invalid choice / اختيار غير صالح",
            (Language::Ar, MessageId::InvalidLanguage) => "اختيار غير صالح / Invalid choice",
        }
    }
}

impl MessageCatalog for StaticCatalog {
    fn lookup(&self, id: MessageId, language: Language) -> String {
        self.overrides
            .get(&(language, id))
            .cloned()
            .unwrap_or_else(|| Self::builtin(id, language).to_string())
    }
}

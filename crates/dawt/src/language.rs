//! Supported languages, their engine codes and the dialect keyword table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Languages a caller may declare. `En` is the default; the order of
/// [`Language::ALL`] is the scan order used by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pidgin,
    Twi,
    Igbo,
    Yoruba,
    Hausa,
    Swahili,
    Amharic,
    French,
    Portuguese,
    Ewe,
    Dagbani,
}

impl Language {
    pub const ALL: [Language; 12] = [
        Language::En,
        Language::Pidgin,
        Language::Twi,
        Language::Igbo,
        Language::Yoruba,
        Language::Hausa,
        Language::Swahili,
        Language::Amharic,
        Language::French,
        Language::Portuguese,
        Language::Ewe,
        Language::Dagbani,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pidgin => "pidgin",
            Language::Twi => "twi",
            Language::Igbo => "igbo",
            Language::Yoruba => "yoruba",
            Language::Hausa => "hausa",
            Language::Swahili => "swahili",
            Language::Amharic => "amharic",
            Language::French => "french",
            Language::Portuguese => "portuguese",
            Language::Ewe => "ewe",
            Language::Dagbani => "dagbani",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Language::En
    }

    /// Language hint passed to the speech-to-text engine.
    ///
    /// Dialects map to their closest standard code; languages the engine
    /// has no model for return `None` (auto-detect).
    pub fn engine_hint(&self) -> Option<&'static str> {
        match self {
            Language::En | Language::Pidgin => Some("en"),
            Language::Yoruba => Some("yo"),
            Language::Hausa => Some("ha"),
            Language::Swahili => Some("sw"),
            Language::Amharic => Some("am"),
            Language::French => Some("fr"),
            Language::Portuguese => Some("pt"),
            Language::Twi | Language::Igbo | Language::Ewe | Language::Dagbani => None,
        }
    }

    /// Code sent to the translation engine. English is never translated.
    pub fn translation_code(&self) -> Option<&'static str> {
        match self {
            Language::En => None,
            Language::Pidgin => Some("pcm"),
            Language::Twi => Some("tw"),
            Language::Igbo => Some("ig"),
            Language::Yoruba => Some("yo"),
            Language::Hausa => Some("ha"),
            Language::Swahili => Some("sw"),
            Language::Amharic => Some("am"),
            Language::French => Some("fr"),
            Language::Portuguese => Some("pt"),
            Language::Ewe => Some("ee"),
            Language::Dagbani => Some("dag"),
        }
    }

    /// Hint keywords whose presence in a transcript suggests this language.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Language::En => &[],
            Language::Pidgin => &["abeg", "wetin", "dey", "na", "fit"],
            Language::Twi => &["medaase", "ɛyɛ", "yɛ", "wo", "me"],
            Language::Igbo => &["biko", "kedu", "nwanne", "nnọọ"],
            Language::Yoruba => &["ẹ ṣeun", "jọwọ", "bawo", "ẹ ku"],
            Language::Hausa => &["sannu", "ina", "ka", "kana"],
            Language::Swahili => &["asante", "pumua", "habari", "ndiyo"],
            Language::Amharic => &["ሰላም", "አመሰግናለሁ", "እንዴት", "ነህ"],
            Language::French => &["merci", "respire", "bonjour", "comment"],
            Language::Portuguese => &["obrigado", "sinta", "olá", "como"],
            Language::Ewe => &["mede akpe", "yɔ", "afɔ", "wò"],
            Language::Dagbani => &["a yili", "zahir", "naa", "ti"],
        }
    }

    /// Parses a caller-supplied language, producing the classified error on failure.
    pub fn parse_requested(value: &str) -> Result<Self, JobError> {
        value
            .parse()
            .map_err(|_| JobError::invalid_language(value))
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Language::ALL
            .iter()
            .find(|lang| lang.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Invalid language: {}", s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

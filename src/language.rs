//! The closed set of chat languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A language the chat client can switch between.
///
/// Each language is bound to its own model profile; switching languages
/// reloads the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Hungarian.
    Hu,
}

impl Language {
    /// Every recognized language, in display order.
    pub const ALL: [Language; 2] = [Language::En, Language::Hu];

    /// Lowercase language code, as typed by the user.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hu => "hu",
        }
    }

    /// Uppercase language code, as written into the transcript.
    pub fn upper_code(self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Hu => "HU",
        }
    }

    /// Human-readable name in the language itself.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hu => "Magyar",
        }
    }

    /// Parses a language code case-insensitively, returning `None` for
    /// anything outside the closed set.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s.trim()).ok_or_else(|| {
            format!(
                "Invalid language: {}. Valid options: {}",
                s,
                Self::ALL.map(Language::code).join(", ")
            )
        })
    }
}

//! Supported synthesis languages.

use serde::{Deserialize, Serialize};

use super::TtsError;

/// Languages accepted by the synthesis providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    German,
    French,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
    Russian,
    ChineseSimplified,
    Japanese,
    Korean,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::English,
        Language::German,
        Language::French,
        Language::Spanish,
        Language::Italian,
        Language::Portuguese,
        Language::Dutch,
        Language::Russian,
        Language::ChineseSimplified,
        Language::Japanese,
        Language::Korean,
    ];

    /// Language code as sent to the provider.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
            Language::French => "fr",
            Language::Spanish => "es",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Dutch => "nl",
            Language::Russian => "ru",
            Language::ChineseSimplified => "zh-cn",
            Language::Japanese => "ja",
            Language::Korean => "ko",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::German => "German",
            Language::French => "French",
            Language::Spanish => "Spanish",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Dutch => "Dutch",
            Language::Russian => "Russian",
            Language::ChineseSimplified => "Chinese (Simplified)",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = TtsError;

    /// Accepts a code (`en`, `zh-CN`, `zh_cn`) or an English display name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Language::ALL
            .into_iter()
            .find(|lang| {
                lang.code() == normalized || lang.display_name().to_lowercase() == normalized
            })
            .ok_or_else(|| TtsError::UnsupportedLanguage(s.to_string()))
    }
}

impl TryFrom<String> for Language {
    type Error = TtsError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.code().to_string()
    }
}

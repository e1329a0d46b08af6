//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML
//! profile file, and the resolved [`ChatConfig`] that is built once at start-up
//! and passed down to the process loop and session controller.
//!
//! Settings are layered: built-in defaults, then the profile file, then
//! command-line flags.

use std::collections::BTreeMap;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};
use utf8path::Path;

use crate::backend::{BackendKind, SamplingParams};
use crate::error::{Error, Result};
use crate::language::Language;
use crate::template::PromptTemplate;

/// Default directory holding model files.
const DEFAULT_MODEL_DIR: &str = "models";

/// Default directory for transcripts.
const DEFAULT_LOG_DIR: &str = "chat_logs";

/// Default inference device.
const DEFAULT_DEVICE: &str = "cuda";

/// Default system prompt shared by every language.
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Keep answers concise and remember prior turns.";

/// Default welcome line, shown and logged at the start of every model binding.
const DEFAULT_WELCOME: &str = "Welcome! How can I help you today?";

/// Command-line arguments for the lingua-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Language to start in; prompts when absent.
    #[arrrg(optional, "Language to start in: en or hu (default: ask)", "LANG")]
    pub lang: Option<String>,

    /// Directory holding the model files.
    #[arrrg(optional, "Directory holding model files (default: models)", "DIR")]
    pub model_dir: Option<String>,

    /// Device to run inference on.
    #[arrrg(optional, "Inference device, e.g. cuda or cpu (default: cuda)", "DEVICE")]
    pub device: Option<String>,

    /// Directory transcripts are written to.
    #[arrrg(optional, "Directory for transcripts (default: chat_logs)", "DIR")]
    pub log_dir: Option<String>,

    /// YAML profile file.
    #[arrrg(optional, "YAML file with models, prompts and sampling settings", "FILE")]
    pub profiles: Option<String>,

    /// Model backend.
    #[arrrg(optional, "Backend: llama or echo (default: llama)", "BACKEND")]
    pub backend: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// The model bound to one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// The language this profile serves.
    pub language: Language,
    /// Model file name, relative to the model directory.
    pub model: String,
    /// Prompt layout the model expects.
    pub template: PromptTemplate,
}

impl LanguageProfile {
    /// The built-in profile for `language`.
    pub fn builtin(language: Language) -> Self {
        match language {
            Language::En => Self {
                language,
                model: "Meta-Llama-3-8B-Instruct.Q4_0.gguf".to_string(),
                template: PromptTemplate::Llama3,
            },
            Language::Hu => Self {
                language,
                model: "SambaLingo-Hungarian-Chat-Q5_K_S.gguf".to_string(),
                template: PromptTemplate::Zephyr,
            },
        }
    }
}

/// One language entry of a [`ProfileFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileEntry {
    /// Model file name.
    pub model: String,
    /// Prompt layout; defaults to the built-in profile's.
    #[serde(default)]
    pub template: Option<PromptTemplate>,
}

/// The on-disk YAML profile file.
///
/// ```yaml
/// device: cpu
/// model_dir: /srv/models
/// sampling:
///   temperature: 0.7
/// languages:
///   hu:
///     model: SambaLingo-Hungarian-Chat-Q4_K_M.gguf
///     template: zephyr
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileFile {
    /// Directory holding the model files.
    pub model_dir: Option<String>,
    /// Inference device.
    pub device: Option<String>,
    /// Directory for transcripts.
    pub log_dir: Option<String>,
    /// System prompt for every language.
    pub system_prompt: Option<String>,
    /// Welcome line.
    pub welcome: Option<String>,
    /// Sampling settings; unspecified fields keep their defaults.
    pub sampling: Option<SamplingParams>,
    /// Per-language model overrides.
    pub languages: BTreeMap<Language, ProfileEntry>,
}

impl ProfileFile {
    /// Parses a profile file from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a profile file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read profile file {}", path.as_str()), err)
        })?;
        Self::from_yaml(&content)
    }
}

/// Configuration for the chat application.
///
/// This struct holds the resolved configuration values after layering the
/// profile file and command-line arguments over the defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Language to start in; `None` asks at start-up.
    pub initial_language: Option<Language>,

    /// Directory holding the model files.
    pub model_dir: Path<'static>,

    /// Inference device, reported in the transcript after every turn.
    pub device: String,

    /// Directory for transcripts.
    pub log_dir: Path<'static>,

    /// Which backend loads models.
    pub backend: BackendKind,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// System prompt given to every model.
    pub system_prompt: String,

    /// Welcome line shown at the start of every model binding.
    pub welcome: String,

    /// Sampling parameters, passed unchanged to every generation call.
    pub sampling: SamplingParams,

    /// Model profile for each language.
    pub profiles: BTreeMap<Language, LanguageProfile>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Language: ask at start-up
    /// - Models: Llama 3 8B Instruct (en), SambaLingo Hungarian Chat (hu)
    /// - Device: cuda
    /// - Logs: chat_logs/
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            initial_language: None,
            model_dir: Path::from(DEFAULT_MODEL_DIR).into_owned(),
            device: DEFAULT_DEVICE.to_string(),
            log_dir: Path::from(DEFAULT_LOG_DIR).into_owned(),
            backend: BackendKind::default(),
            use_color: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome: DEFAULT_WELCOME.to_string(),
            sampling: SamplingParams::default(),
            profiles: Language::ALL
                .into_iter()
                .map(|lang| (lang, LanguageProfile::builtin(lang)))
                .collect(),
        }
    }

    /// Sets the starting language.
    pub fn with_initial_language(mut self, language: Option<Language>) -> Self {
        self.initial_language = language;
        self
    }

    /// Sets the inference device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Sets the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the welcome line.
    pub fn with_welcome(mut self, welcome: impl Into<String>) -> Self {
        self.welcome = welcome.into();
        self
    }

    /// Sets the sampling parameters.
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Replaces the profile for one language.
    pub fn with_profile(mut self, profile: LanguageProfile) -> Self {
        self.profiles.insert(profile.language, profile);
        self
    }

    /// Returns the profile for `language`.
    pub fn profile(&self, language: Language) -> Result<&LanguageProfile> {
        self.profiles.get(&language).ok_or_else(|| {
            Error::config(
                format!("no model configured for {language}"),
                Some("languages".to_string()),
            )
        })
    }

    /// Layers a profile file over this configuration.
    pub fn apply_profile_file(mut self, file: ProfileFile) -> Self {
        if let Some(dir) = file.model_dir {
            self.model_dir = Path::from(dir.as_str()).into_owned();
        }
        if let Some(device) = file.device {
            self.device = device;
        }
        if let Some(dir) = file.log_dir {
            self.log_dir = Path::from(dir.as_str()).into_owned();
        }
        if let Some(prompt) = file.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(welcome) = file.welcome {
            self.welcome = welcome;
        }
        if let Some(sampling) = file.sampling {
            self.sampling = sampling;
        }
        for (language, entry) in file.languages {
            let builtin = LanguageProfile::builtin(language);
            self.profiles.insert(
                language,
                LanguageProfile {
                    language,
                    model: entry.model,
                    template: entry.template.unwrap_or(builtin.template),
                },
            );
        }
        self
    }

    /// Checks that the sampling parameters are usable.
    pub fn validate(&self) -> Result<()> {
        let sampling = &self.sampling;
        if sampling.max_tokens == 0 {
            return Err(Error::validation(
                "max_tokens must be positive",
                Some("sampling.max_tokens".to_string()),
            ));
        }
        if !(sampling.temperature.is_finite() && sampling.temperature >= 0.0) {
            return Err(Error::validation(
                "temperature must be a non-negative number",
                Some("sampling.temperature".to_string()),
            ));
        }
        if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
            return Err(Error::validation(
                "top_p must be in (0, 1]",
                Some("sampling.top_p".to_string()),
            ));
        }
        if !(sampling.repeat_penalty.is_finite() && sampling.repeat_penalty > 0.0) {
            return Err(Error::validation(
                "repeat_penalty must be positive",
                Some("sampling.repeat_penalty".to_string()),
            ));
        }
        if self.device.trim().is_empty() {
            return Err(Error::validation(
                "device must not be empty",
                Some("device".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(profiles) = args.profiles.as_deref() {
            let file = ProfileFile::from_file(&Path::from(profiles))?;
            config = config.apply_profile_file(file);
        }
        if let Some(lang) = args.lang {
            let language = lang
                .parse::<Language>()
                .map_err(|err| Error::config(err, Some("lang".to_string())))?;
            config.initial_language = Some(language);
        }
        if let Some(dir) = args.model_dir {
            config.model_dir = Path::from(dir.as_str()).into_owned();
        }
        if let Some(device) = args.device {
            config.device = device;
        }
        if let Some(dir) = args.log_dir {
            config.log_dir = Path::from(dir.as_str()).into_owned();
        }
        if let Some(backend) = args.backend {
            config.backend = backend
                .parse()
                .map_err(|err| Error::config(err, Some("backend".to_string())))?;
        }
        config.use_color = !args.no_color;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.initial_language, None);
        assert_eq!(config.model_dir.as_str(), "models");
        assert_eq!(config.log_dir.as_str(), "chat_logs");
        assert_eq!(config.device, "cuda");
        assert_eq!(config.backend, BackendKind::Llama);
        assert!(config.use_color);
        assert_eq!(config.welcome, "Welcome! How can I help you today?");
        assert_eq!(config.sampling, SamplingParams::default());
        assert_eq!(
            config.profile(Language::En).unwrap().model,
            "Meta-Llama-3-8B-Instruct.Q4_0.gguf"
        );
        assert_eq!(
            config.profile(Language::Hu).unwrap().template,
            PromptTemplate::Zephyr
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config.initial_language, None);
        assert_eq!(config.device, "cuda");
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            lang: Some("HU".to_string()),
            model_dir: Some("/srv/models".to_string()),
            device: Some("cpu".to_string()),
            log_dir: Some("/tmp/logs".to_string()),
            profiles: None,
            backend: Some("echo".to_string()),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.initial_language, Some(Language::Hu));
        assert_eq!(config.model_dir.as_str(), "/srv/models");
        assert_eq!(config.device, "cpu");
        assert_eq!(config.log_dir.as_str(), "/tmp/logs");
        assert_eq!(config.backend, BackendKind::Echo);
        assert!(!config.use_color);
    }

    #[test]
    fn config_from_args_rejects_unknown_language() {
        let args = ChatArgs {
            lang: Some("de".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn profile_file_layers_over_defaults() {
        let file = ProfileFile::from_yaml(
            "device: cpu\n\
             welcome: Szia!\n\
             sampling:\n  temperature: 0.5\n\
             languages:\n  hu:\n    model: tiny-hu.gguf\n  en:\n    model: tiny-en.gguf\n    template: chatml\n",
        )
        .unwrap();
        let config = ChatConfig::new().apply_profile_file(file);
        assert_eq!(config.device, "cpu");
        assert_eq!(config.welcome, "Szia!");
        assert_eq!(config.sampling.temperature, 0.5);
        assert_eq!(config.sampling.max_tokens, 8192);
        let hu = config.profile(Language::Hu).unwrap();
        assert_eq!(hu.model, "tiny-hu.gguf");
        assert_eq!(hu.template, PromptTemplate::Zephyr);
        let en = config.profile(Language::En).unwrap();
        assert_eq!(en.template, PromptTemplate::ChatMl);
    }

    #[test]
    fn profile_file_rejects_unknown_keys_and_languages() {
        assert!(ProfileFile::from_yaml("colour: red\n").is_err());
        assert!(ProfileFile::from_yaml("languages:\n  de:\n    model: x.gguf\n").is_err());
    }

    #[test]
    fn profile_file_from_disk_with_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.yaml");
        std::fs::write(&path, "device: cpu\nlog_dir: from-file\n").unwrap();
        let args = ChatArgs {
            profiles: Some(path.to_str().unwrap().to_string()),
            device: Some("metal".to_string()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.device, "metal");
        assert_eq!(config.log_dir.as_str(), "from-file");
    }

    #[test]
    fn validation_catches_bad_sampling() {
        let config = ChatConfig::new().with_sampling(SamplingParams {
            top_p: 1.5,
            ..SamplingParams::default()
        });
        assert!(config.validate().unwrap_err().is_validation());
        let config =
            ChatConfig::new().with_sampling(SamplingParams::default().with_max_tokens(0));
        assert!(config.validate().is_err());
        let config = ChatConfig::new().with_device("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_pattern() {
        let config = ChatConfig::new()
            .with_initial_language(Some(Language::En))
            .with_device("cpu")
            .with_backend(BackendKind::Echo)
            .without_color()
            .with_welcome("Hi")
            .with_profile(LanguageProfile {
                language: Language::En,
                model: "small.gguf".to_string(),
                template: PromptTemplate::Raw,
            });
        assert_eq!(config.initial_language, Some(Language::En));
        assert_eq!(config.device, "cpu");
        assert_eq!(config.backend, BackendKind::Echo);
        assert!(!config.use_color);
        assert_eq!(config.welcome, "Hi");
        assert_eq!(config.profile(Language::En).unwrap().model, "small.gguf");
    }
}

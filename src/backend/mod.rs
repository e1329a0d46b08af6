//! Model backends.
//!
//! The session controller only needs two things from a language model: a way
//! to load one for a language ([`ModelLoader`]) and a blocking generation call
//! that reports fragments through a callback as they are produced
//! ([`Generator`]). Everything about tokenization, sampling and device
//! placement stays behind these traits.

use serde::{Deserialize, Serialize};

use crate::chat::LanguageProfile;
use crate::error::Result;

pub mod echo;
#[cfg(feature = "llama")]
pub mod llama;

pub use echo::{EchoGenerator, EchoLoader};
#[cfg(feature = "llama")]
pub use llama::{LlamaGenerator, LlamaLoader};

/// Sampling configuration passed unchanged to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Upper bound on generated tokens per turn.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// Top-k truncation.
    pub top_k: u32,
    /// Repetition penalty.
    pub repeat_penalty: f32,
}

impl SamplingParams {
    /// Sets the maximum tokens per turn.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.8,
            top_p: 0.9,
            top_k: 50,
            repeat_penalty: 1.1,
        }
    }
}

/// A loaded model that can answer prompts.
///
/// Implementations keep whatever conversation memory they need between calls;
/// a fresh generator starts a fresh conversation.
pub trait Generator {
    /// Generates a response to `prompt`, blocking until generation completes.
    ///
    /// `on_fragment` is invoked synchronously, zero or more times, in the order
    /// fragments are produced. Fragments are UTF-8 bytes and may be either the
    /// cumulative response so far or unrelated pieces of it. Returns the full
    /// response text.
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&[u8]),
    ) -> Result<String>;
}

/// A model bound to a language, ready for a session.
pub struct LoadedModel {
    /// The generator for this binding.
    pub generator: Box<dyn Generator>,
    /// Identifier written to the transcript, typically the model file name.
    pub model_id: String,
}

/// Instantiates models for language profiles.
pub trait ModelLoader {
    /// Loads the model described by `profile`.
    ///
    /// Failure is returned to the caller; there is no retry.
    fn load(&mut self, profile: &LanguageProfile, system_prompt: &str) -> Result<LoadedModel>;
}

/// Which backend the binary should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// llama.cpp, available with the `llama` feature.
    #[default]
    Llama,
    /// Model-free echo backend for dry runs.
    Echo,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Llama => write!(f, "llama"),
            BackendKind::Echo => write!(f, "echo"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llama" | "llama.cpp" => Ok(BackendKind::Llama),
            "echo" => Ok(BackendKind::Echo),
            _ => Err(format!(
                "Invalid backend: {}. Valid options: llama, echo",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sampling_matches_policy() {
        let params = SamplingParams::default();
        assert_eq!(params.max_tokens, 8192);
        assert_eq!(params.temperature, 0.8);
        assert_eq!(params.top_p, 0.9);
        assert_eq!(params.top_k, 50);
        assert_eq!(params.repeat_penalty, 1.1);
    }

    #[test]
    fn sampling_from_partial_yaml_keeps_defaults() {
        let params: SamplingParams = serde_yaml::from_str("temperature: 0.2\n").unwrap();
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.top_k, 50);
    }

    #[test]
    fn backend_kind_parsing() {
        assert_eq!("echo".parse::<BackendKind>(), Ok(BackendKind::Echo));
        assert_eq!("LLAMA".parse::<BackendKind>(), Ok(BackendKind::Llama));
        assert!("gpt".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Echo.to_string(), "echo");
    }
}

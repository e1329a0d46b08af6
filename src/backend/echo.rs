//! A model-free backend that repeats the user's line back.
//!
//! Useful for trying the client, its transcript and language switching on a
//! machine without model files. Fragments are delivered cumulatively, one word
//! at a time, the way a well-behaved streaming generator reports them.

use super::{Generator, LoadedModel, ModelLoader, SamplingParams};
use crate::chat::LanguageProfile;
use crate::error::Result;

/// Streams the prompt back as the response.
#[derive(Debug, Default)]
pub struct EchoGenerator {
    turns: usize,
}

impl EchoGenerator {
    /// Creates a generator with no conversation history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prompts answered so far.
    pub fn turns(&self) -> usize {
        self.turns
    }
}

impl Generator for EchoGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&[u8]),
    ) -> Result<String> {
        self.turns += 1;
        let mut cumulative = String::new();
        for word in prompt.split_inclusive(char::is_whitespace).take(params.max_tokens as usize) {
            cumulative.push_str(word);
            on_fragment(cumulative.as_bytes());
        }
        Ok(cumulative)
    }
}

/// Loads [`EchoGenerator`]s, naming them after the profile's model file.
#[derive(Debug, Default)]
pub struct EchoLoader;

impl ModelLoader for EchoLoader {
    fn load(&mut self, profile: &LanguageProfile, _: &str) -> Result<LoadedModel> {
        log::info!("echo backend standing in for {}", profile.model);
        Ok(LoadedModel {
            generator: Box::new(EchoGenerator::new()),
            model_id: format!("echo:{}", profile.model),
        })
    }
}

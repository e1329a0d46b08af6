//! llama.cpp backend.
//!
//! Loads GGUF models through `llama-cpp-2`. Each [`LlamaGenerator`] owns its
//! model and the conversation so far; every turn re-renders the conversation
//! through the profile's prompt template and decodes it into a fresh context.
//! Fragments are reported as the cumulative bytes generated so far, so a token
//! that ends mid-character is completed by the next fragment.

use std::num::NonZeroU32;
use std::sync::Arc;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::LlamaModel;
use llama_cpp_2::sampling::LlamaSampler;
use utf8path::Path;

use super::{Generator, LoadedModel, ModelLoader, SamplingParams};
use crate::chat::LanguageProfile;
use crate::error::{Error, Result};
use crate::stream::decode_lossy;
use crate::template::{Conversation, PromptTemplate, StopScan, scan_for_stop};

/// Context window used when none is configured.
pub const DEFAULT_CONTEXT_TOKENS: u32 = 8192;

/// How many recent tokens the repetition penalty looks at.
const PENALTY_LAST_N: i32 = 64;

/// Device name that keeps every layer on the CPU.
const CPU_DEVICE: &str = "cpu";

/// Layer count that offloads every layer of any supported model.
const ALL_LAYERS: u32 = 1000;

/// Loads GGUF models from a directory onto the configured device.
pub struct LlamaLoader {
    backend: Arc<LlamaBackend>,
    model_dir: Path<'static>,
    device: String,
    context_tokens: u32,
}

impl LlamaLoader {
    /// Initializes llama.cpp. This may only happen once per process.
    pub fn new(model_dir: Path<'static>, device: impl Into<String>) -> Result<Self> {
        let backend = LlamaBackend::init().map_err(|err| {
            Error::model_load(format!("failed to init llama backend: {err}"), None)
        })?;
        Ok(Self {
            backend: Arc::new(backend),
            model_dir,
            device: device.into(),
            context_tokens: DEFAULT_CONTEXT_TOKENS,
        })
    }

    /// Sets the context window size in tokens.
    pub fn with_context_tokens(mut self, context_tokens: u32) -> Self {
        self.context_tokens = context_tokens;
        self
    }

}

/// Number of layers to offload for `device`.
fn gpu_layers(device: &str) -> u32 {
    if device.trim().eq_ignore_ascii_case(CPU_DEVICE) {
        0
    } else {
        ALL_LAYERS
    }
}

impl ModelLoader for LlamaLoader {
    fn load(&mut self, profile: &LanguageProfile, system_prompt: &str) -> Result<LoadedModel> {
        let path = self.model_dir.join(profile.model.as_str()).into_owned();
        if !path.exists() {
            return Err(Error::model_load(
                format!("model file does not exist: {}", path.as_str()),
                Some(profile.model.clone()),
            ));
        }
        let params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers(&self.device));
        let model = LlamaModel::load_from_file(&self.backend, &path, &params).map_err(|err| {
            Error::model_load(
                format!("failed to load model: {err}"),
                Some(profile.model.clone()),
            )
        })?;
        log::info!(
            "loaded {} on {} ({:?} template)",
            profile.model,
            self.device,
            profile.template
        );
        Ok(LoadedModel {
            generator: Box::new(LlamaGenerator {
                backend: Arc::clone(&self.backend),
                model,
                template: profile.template,
                conversation: Conversation::new(system_prompt),
                context_tokens: self.context_tokens,
            }),
            model_id: profile.model.clone(),
        })
    }
}

/// A loaded llama.cpp model plus its conversation memory.
pub struct LlamaGenerator {
    backend: Arc<LlamaBackend>,
    model: LlamaModel,
    template: PromptTemplate,
    conversation: Conversation,
    context_tokens: u32,
}

impl LlamaGenerator {
    fn run(
        &self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&[u8]),
    ) -> Result<String> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_tokens))
            .with_n_batch(self.context_tokens);
        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|err| generation_error("failed to create context", err))?;

        let vocab = self.model.vocab();
        let tokens = vocab.tokenize(prompt.as_bytes(), self.template.needs_bos(), true);
        if tokens.is_empty() {
            return Err(Error::generation("prompt produced no tokens", None));
        }
        if tokens.len() >= self.context_tokens as usize {
            return Err(Error::generation(
                format!(
                    "conversation is {} tokens; the context holds {}",
                    tokens.len(),
                    self.context_tokens
                ),
                None,
            ));
        }

        let mut batch = LlamaBatch::new(tokens.len(), 1);
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|err| generation_error("failed to add token to batch", err))?;
        }
        ctx.decode(&mut batch)
            .map_err(|err| generation_error("failed to decode prompt", err))?;

        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(42);
        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(
                self.model.n_vocab(),
                PENALTY_LAST_N,
                params.repeat_penalty,
                0.0,
                0.0,
            ),
            LlamaSampler::top_k(params.top_k as i32),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(seed),
        ]);

        let marker = self.template.stop_marker();
        let mut generated: Vec<u8> = Vec::new();
        let mut visible = 0;
        let mut n_cur = tokens.len();
        for _ in 0..params.max_tokens {
            if n_cur >= self.context_tokens as usize {
                log::warn!("context window full after {n_cur} tokens");
                break;
            }
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            if vocab.is_eog(token) {
                break;
            }
            generated.extend_from_slice(&vocab.token_to_piece(token, true, None));
            match scan_for_stop(&generated, marker) {
                StopScan::Stopped(idx) => {
                    visible = idx;
                    on_fragment(&generated[..visible]);
                    break;
                }
                StopScan::Visible(n) => {
                    visible = n;
                    on_fragment(&generated[..visible]);
                }
            }

            batch.clear();
            batch
                .add(token, n_cur as i32, &[0], true)
                .map_err(|err| generation_error("failed to add token", err))?;
            n_cur += 1;
            ctx.decode(&mut batch)
                .map_err(|err| generation_error("failed to decode", err))?;
        }
        Ok(decode_lossy(&generated[..visible]))
    }
}

impl Generator for LlamaGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&[u8]),
    ) -> Result<String> {
        self.conversation.push_user(prompt);
        let rendered = self.template.render(&self.conversation);
        log::debug!("prompt: {rendered}");
        match self.run(&rendered, params, on_fragment) {
            Ok(text) => {
                self.conversation.push_assistant(text.trim());
                Ok(text)
            }
            Err(err) => {
                self.conversation.pop();
                Err(err)
            }
        }
    }
}

fn generation_error<E>(what: &str, err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::generation(format!("{what}: {err}"), Some(Box::new(err)))
}

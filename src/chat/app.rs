//! The chat process: pick a language, bind its model, and rebind on switch.

use std::io::Write;
use std::time::Instant;

use crate::backend::{BackendKind, EchoLoader, LoadedModel, ModelLoader};
use crate::chat::config::ChatConfig;
use crate::chat::input::{InputEvent, LineReader};
use crate::chat::session::{SessionController, SessionOutcome};
use crate::error::{Error, Result};
use crate::language::Language;
use crate::observability::{MODEL_LOAD_DURATION, MODEL_LOAD_ERRORS, MODEL_LOADS};
use crate::render::Renderer;
use crate::transcript::TranscriptLogger;

/// Prompt for the start-up language choice.
pub fn language_prompt() -> String {
    let choices = Language::ALL
        .map(|lang| format!("{}={}", lang.code(), lang.native_name()))
        .join(", ");
    format!("Select language [{choices}]: ")
}

/// Asks for the starting language until a valid code is typed.
pub fn select_language(reader: &mut dyn LineReader, renderer: &mut dyn Renderer) -> Result<Language> {
    let prompt = language_prompt();
    loop {
        match reader.read_line(&prompt)? {
            InputEvent::Line(line) => match line.parse::<Language>() {
                Ok(language) => return Ok(language),
                Err(_) => {
                    let codes = Language::ALL
                        .map(|lang| format!("'{}'", lang.code()))
                        .join(" or ");
                    renderer.print_info(&format!("Please type {codes}."));
                }
            },
            InputEvent::Interrupted => {}
            InputEvent::Eof => return Err(Error::input("no language selected")),
        }
    }
}

/// Builds the loader named by the configuration.
pub fn loader_for(config: &ChatConfig) -> Result<Box<dyn ModelLoader>> {
    match config.backend {
        BackendKind::Echo => Ok(Box::new(EchoLoader)),
        #[cfg(feature = "llama")]
        BackendKind::Llama => Ok(Box::new(crate::backend::LlamaLoader::new(
            config.model_dir.clone(),
            config.device.clone(),
        )?)),
        #[cfg(not(feature = "llama"))]
        BackendKind::Llama => Err(Error::config(
            "this build has no llama.cpp support; rebuild with --features llama or pass --backend echo",
            Some("backend".to_string()),
        )),
    }
}

/// Loads the model for `language`, reporting the result on the terminal.
pub fn load_model(
    config: &ChatConfig,
    language: Language,
    loader: &mut dyn ModelLoader,
    renderer: &mut dyn Renderer,
) -> Result<LoadedModel> {
    let profile = config.profile(language)?;
    let started = Instant::now();
    match loader.load(profile, &config.system_prompt) {
        Ok(model) => {
            MODEL_LOADS.click();
            MODEL_LOAD_DURATION.add(started.elapsed().as_secs_f64());
            log::info!("loaded {} for {language}", model.model_id);
            renderer.print_info(&format!("MODEL LOADED: {}", model.model_id));
            Ok(model)
        }
        Err(err) => {
            MODEL_LOAD_ERRORS.click();
            log::error!("could not load {}: {err}", profile.model);
            Err(err)
        }
    }
}

/// Runs the chat from `language` until the user exits.
///
/// Every binding writes to the same transcript. A failed model load ends the
/// chat with that error; the transcript keeps everything written before it.
pub fn run_chat<R: Renderer, W: Write>(
    config: &ChatConfig,
    language: Language,
    loader: &mut dyn ModelLoader,
    reader: &mut dyn LineReader,
    renderer: &mut R,
    logger: &mut TranscriptLogger<W>,
) -> Result<()> {
    let mut language = language;
    loop {
        let model = load_model(config, language, loader, renderer)?;
        let mut session = SessionController::new(config, language, model, logger, renderer);
        match session.run(reader)? {
            SessionOutcome::Exit => return Ok(()),
            SessionOutcome::Switch(next) => language = next,
        }
    }
}

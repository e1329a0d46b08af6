//! One model binding's worth of chat.
//!
//! A [`SessionController`] owns a loaded model for a single language. It
//! writes the binding's header, then reads lines until the user exits or asks
//! for another language. Each chat turn streams the model's output to the
//! terminal and to the transcript at once.

use std::io::Write;
use std::time::{Duration, Instant};

use crate::backend::LoadedModel;
use crate::chat::commands::{Command, hint_text, parse_command, usage_text};
use crate::chat::config::ChatConfig;
use crate::chat::input::{InputEvent, LineReader};
use crate::error::Result;
use crate::language::Language;
use crate::observability::{
    SESSION_GENERATION_ERRORS, SESSION_LANGUAGE_SWITCHES, SESSION_TURN_DURATION, SESSION_TURNS,
    SESSION_USAGE_ERRORS,
};
use crate::render::Renderer;
use crate::stream::{Sink, StreamSynchronizer};
use crate::transcript::TranscriptLogger;
use crate::utils::time::now;

/// Prompt shown when waiting for the user's line.
pub const USER_PROMPT: &str = "You: ";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user asked to quit; the transcript footer has been written.
    Exit,
    /// The user asked for another language's model.
    Switch(Language),
}

/// Statistics about a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The language this session is bound to.
    pub language: Language,
    /// The model identifier written to the transcript.
    pub model_id: String,
    /// The device reported after each turn.
    pub device: String,
    /// Turns that produced a response.
    pub completed_turns: u64,
    /// Turns whose generation call failed.
    pub failed_turns: u64,
    /// Wall-clock duration of the most recent successful turn.
    pub last_elapsed: Option<Duration>,
}

/// Drives the chat for one loaded model.
pub struct SessionController<'a, R: Renderer, W: Write> {
    config: &'a ChatConfig,
    language: Language,
    model: LoadedModel,
    logger: &'a mut TranscriptLogger<W>,
    renderer: &'a mut R,
    completed_turns: u64,
    failed_turns: u64,
    last_elapsed: Option<Duration>,
}

impl<'a, R: Renderer, W: Write> SessionController<'a, R, W> {
    /// Binds `model` for `language`, writing to the shared transcript.
    pub fn new(
        config: &'a ChatConfig,
        language: Language,
        model: LoadedModel,
        logger: &'a mut TranscriptLogger<W>,
        renderer: &'a mut R,
    ) -> Self {
        Self {
            config,
            language,
            model,
            logger,
            renderer,
            completed_turns: 0,
            failed_turns: 0,
            last_elapsed: None,
        }
    }

    /// The language this session answers in.
    pub fn language(&self) -> Language {
        self.language
    }

    /// The identifier of the bound model.
    pub fn model_id(&self) -> &str {
        &self.model.model_id
    }

    /// Returns statistics about the session so far.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            language: self.language,
            model_id: self.model.model_id.clone(),
            device: self.config.device.clone(),
            completed_turns: self.completed_turns,
            failed_turns: self.failed_turns,
            last_elapsed: self.last_elapsed,
        }
    }

    /// Writes the header and welcome for this binding.
    pub fn start(&mut self) -> Result<()> {
        self.logger
            .write_session_header(&self.model.model_id, &self.config.device, now())?;
        self.logger.write_system_message(&self.config.welcome)?;
        self.renderer.print_info(&self.config.welcome);
        self.renderer.print_info(&hint_text());
        Ok(())
    }

    /// Runs the session until the user exits or switches language.
    ///
    /// End of input is treated as `exit`. Ctrl+C at the prompt shows the
    /// prompt again.
    pub fn run(&mut self, reader: &mut dyn LineReader) -> Result<SessionOutcome> {
        self.start()?;
        loop {
            self.renderer.print_rule();
            let line = match reader.read_line(USER_PROMPT)? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => continue,
                InputEvent::Eof => return self.exit(),
            };
            if let Some(outcome) = self.handle_line(&line)? {
                return Ok(outcome);
            }
        }
    }

    /// Handles one raw line of input.
    ///
    /// Only a trailing line terminator is removed; everything else, blank
    /// lines and surrounding spaces included, is classified as typed.
    /// Returns `Some` when the line ends the session.
    pub fn handle_line(&mut self, line: &str) -> Result<Option<SessionOutcome>> {
        let line = line.trim_end_matches(['\r', '\n']);
        match parse_command(line) {
            Command::Exit => self.exit().map(Some),
            Command::SwitchLanguage(target) => self.switch(target).map(Some),
            Command::Malformed => {
                SESSION_USAGE_ERRORS.click();
                self.renderer.print_info(&format!("Usage: {}", usage_text()));
                Ok(None)
            }
            Command::Turn(text) => {
                self.turn(&text)?;
                Ok(None)
            }
        }
    }

    fn exit(&mut self) -> Result<SessionOutcome> {
        self.renderer.print_info("Goodbye.");
        self.logger.write_session_footer(now())?;
        Ok(SessionOutcome::Exit)
    }

    fn switch(&mut self, target: Language) -> Result<SessionOutcome> {
        SESSION_LANGUAGE_SWITCHES.click();
        self.logger.write_language_switch_marker(target, now())?;
        self.renderer.print_info(&format!(
            "Switching language to {}...",
            target.upper_code()
        ));
        log::info!("switching from {} to {}", self.language, target);
        Ok(SessionOutcome::Switch(target))
    }

    fn turn(&mut self, text: &str) -> Result<()> {
        SESSION_TURNS.click();
        self.logger.write_user_turn(now(), text)?;
        self.logger.begin_assistant_turn()?;
        self.renderer.start_response();

        let started = Instant::now();
        let result = {
            let sinks: Vec<&mut dyn Sink> = vec![&mut *self.renderer, &mut *self.logger];
            let mut sync = StreamSynchronizer::new(sinks);
            self.model
                .generator
                .generate(text, &self.config.sampling, &mut |fragment| {
                    sync.emit(fragment)
                })
        };
        let elapsed = started.elapsed();
        self.renderer.finish_response();

        match result {
            Ok(_) => {
                SESSION_TURN_DURATION.add(elapsed.as_secs_f64());
                self.completed_turns += 1;
                self.last_elapsed = Some(elapsed);
                self.logger.end_assistant_turn(elapsed, &self.config.device)?;
                self.renderer
                    .print_info(&format!("Current device: {}", self.config.device));
                self.renderer.print_info(&format!(
                    "Elapsed time: {:.2} seconds",
                    elapsed.as_secs_f64()
                ));
            }
            Err(err) => {
                SESSION_GENERATION_ERRORS.click();
                self.failed_turns += 1;
                log::error!("generation failed on {}: {err}", self.model.model_id);
                self.logger.write_generation_failure(err.message())?;
                self.renderer.print_error(&err.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Generator, SamplingParams};
    use crate::chat::input::ScriptedReader;
    use crate::error::Error;
    use crate::render::PlainTextRenderer;

    struct Scripted {
        fragments: Vec<&'static str>,
        fail: bool,
    }

    impl Generator for Scripted {
        fn generate(
            &mut self,
            _: &str,
            _: &SamplingParams,
            on_fragment: &mut dyn FnMut(&[u8]),
        ) -> Result<String> {
            for fragment in &self.fragments {
                on_fragment(fragment.as_bytes());
            }
            if self.fail {
                return Err(Error::generation("out of memory", None));
            }
            Ok(self.fragments.last().copied().unwrap_or_default().to_string())
        }
    }

    fn model(fragments: Vec<&'static str>, fail: bool) -> LoadedModel {
        LoadedModel {
            generator: Box::new(Scripted { fragments, fail }),
            model_id: "test-model".to_string(),
        }
    }

    fn config() -> ChatConfig {
        ChatConfig::new().with_device("cpu").without_color()
    }

    fn logged(logger: TranscriptLogger<Vec<u8>>) -> String {
        String::from_utf8(logger.into_inner()).unwrap()
    }

    #[test]
    fn lines_are_classified_as_typed() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut session = SessionController::new(
            &config,
            Language::En,
            model(vec!["x"], false),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(session.handle_line("  exit  ").unwrap(), None);
        assert_eq!(session.handle_line("").unwrap(), None);
        assert_eq!(session.handle_line(" /lang hu").unwrap(), None);
        assert_eq!(session.stats().completed_turns, 3);
        assert_eq!(
            session.handle_line("EXIT\r\n").unwrap(),
            Some(SessionOutcome::Exit)
        );
        drop(session);

        let log = logged(logger);
        assert_eq!(log.matches("USER:").count(), 3);
        assert!(log.contains("] USER:   exit  \nAI: x\n\n[META]"));
        assert!(log.contains("] USER: \nAI: x\n\n[META]"));
        assert!(log.contains("] USER:  /lang hu\nAI: x\n\n[META]"));
        assert!(!log.contains("Language switch requested"));
        assert!(log.contains("# Chat session ended: "));
    }

    #[test]
    fn turn_streams_to_both_sinks() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut session = SessionController::new(
            &config,
            Language::En,
            model(vec!["Hel", "Hello", "Hello world"], false),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(session.handle_line("Hi").unwrap(), None);
        let stats = session.stats();
        assert_eq!(stats.completed_turns, 1);
        assert!(stats.last_elapsed.is_some());
        drop(session);

        let log = logged(logger);
        assert!(log.contains("] USER: Hi\nAI: Hello world\n\n[META] device=cpu elapsed_seconds="));
        let screen = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(screen.starts_with("\nAI: Hello world\n\nCurrent device: cpu\nElapsed time: "));
        assert!(screen.ends_with(" seconds\n"));
    }

    #[test]
    fn failed_turn_is_marked_and_session_continues() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut session = SessionController::new(
            &config,
            Language::Hu,
            model(vec!["Szia"], true),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(session.handle_line("Szia").unwrap(), None);
        assert_eq!(session.stats().failed_turns, 1);
        assert_eq!(
            session.handle_line("exit").unwrap(),
            Some(SessionOutcome::Exit)
        );
        drop(session);

        let log = logged(logger);
        assert!(log.contains("AI: Szia\n\n[ERROR] generation failed: out of memory\n\n"));
        assert!(!log.contains("[META]"));
        assert!(log.contains("# Chat session ended: "));
    }

    #[test]
    fn run_treats_eof_as_exit() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut reader = ScriptedReader::new(Vec::<String>::new());
        reader.push_event(InputEvent::Interrupted);
        let mut session = SessionController::new(
            &config,
            Language::En,
            model(vec![], false),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(session.run(&mut reader).unwrap(), SessionOutcome::Exit);
        drop(session);
        assert_eq!(reader.prompts(), ["You: ", "You: "]);

        let log = logged(logger);
        assert!(log.starts_with("# Chat session started: "));
        assert!(log.contains("# Model: test-model\n# Device: cpu\n"));
        assert!(log.contains(&format!("SYSTEM: {}\n\n", config.welcome)));
        assert!(log.contains("# Chat session ended: "));
        assert!(!log.contains("USER:"));
    }

    #[test]
    fn malformed_switch_prints_usage_only() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut session = SessionController::new(
            &config,
            Language::En,
            model(vec![], false),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(session.handle_line("/lang xx").unwrap(), None);
        assert_eq!(session.handle_line("/lang").unwrap(), None);
        drop(session);
        assert_eq!(logged(logger), "");
        let screen = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            screen,
            "Usage: /lang en   or   /lang hu\nUsage: /lang en   or   /lang hu\n"
        );
    }

    #[test]
    fn switch_writes_one_marker() {
        let config = config();
        let mut logger = TranscriptLogger::new(Vec::new());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut session = SessionController::new(
            &config,
            Language::En,
            model(vec![], false),
            &mut logger,
            &mut renderer,
        );
        assert_eq!(
            session.handle_line("/lang hu").unwrap(),
            Some(SessionOutcome::Switch(Language::Hu))
        );
        drop(session);
        let log = logged(logger);
        assert_eq!(log.matches("Language switch requested: HU at ").count(), 1);
        let screen = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(screen, "Switching language to HU...\n");
    }
}

//! Interactive bilingual chat over local models.
//!
//! This module provides the terminal REPL built on top of the backend and
//! transcript layers. It supports:
//!
//! - Streaming responses shown on screen and logged as they arrive
//! - Switching between language-specific models mid-chat with `/lang`
//! - Configurable model files, device, and sampling parameters
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - `config`: CLI argument parsing, profile files and defaults
//! - `commands`: classification of input lines
//! - `input`: line reading from the terminal or a script
//! - `session`: one model binding and its turns
//! - `app`: language selection and rebinding on switch

mod app;
mod commands;
mod config;
mod input;
mod session;

pub use app::{language_prompt, load_model, loader_for, run_chat, select_language};
pub use commands::{Command, hint_text, parse_command, usage_text};
pub use config::{ChatArgs, ChatConfig, LanguageProfile, ProfileEntry, ProfileFile};
pub use input::{InputEvent, LineReader, RustylineReader, ScriptedReader};
pub use session::{SessionController, SessionOutcome, SessionStats, USER_PROMPT};

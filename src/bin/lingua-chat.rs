//! Bilingual terminal chat over local language models.
//!
//! Chats in English or Hungarian, each with its own model, and writes every
//! exchange to a transcript as it streams.
//!
//! # Usage
//!
//! ```bash
//! # Ask for the language at start-up
//! lingua-chat
//!
//! # Start in Hungarian on the CPU
//! lingua-chat --lang hu --device cpu
//!
//! # Try the client without model files
//! lingua-chat --backend echo --lang en
//!
//! # Models, templates and sampling from a YAML file
//! lingua-chat --profiles profiles.yaml
//! ```
//!
//! # Commands
//!
//! While chatting:
//! - `/lang en` or `/lang hu` - Switch to the other language's model
//! - `exit` - Quit (Ctrl+D does the same)

use arrrg::CommandLine;

use lingua_chat::chat::{
    ChatArgs, ChatConfig, RustylineReader, loader_for, run_chat, select_language,
};
use lingua_chat::transcript::create_transcript_file;
use lingua_chat::utils::time::now;
use lingua_chat::{PlainTextRenderer, TranscriptLogger};

/// Main entry point for the lingua-chat application.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (args, _) = ChatArgs::from_command_line_relaxed("lingua-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut reader = RustylineReader::new()?;
    let language = match config.initial_language {
        Some(language) => language,
        None => select_language(&mut reader, &mut renderer)?,
    };
    let mut loader = loader_for(&config)?;

    let (path, file) = create_transcript_file(&config.log_dir, now())?;
    let mut logger = TranscriptLogger::new(file);
    let result = run_chat(
        &config,
        language,
        loader.as_mut(),
        &mut reader,
        &mut renderer,
        &mut logger,
    );

    let shown = std::fs::canonicalize(&path)
        .map(|abs| abs.display().to_string())
        .unwrap_or_else(|_| path.as_str().to_string());
    println!("Session log saved to: {shown}");
    result?;
    Ok(())
}

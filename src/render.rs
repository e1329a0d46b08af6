//! Terminal output for the chat.
//!
//! The [`Renderer`] is the terminal side of the chat: it prints client
//! messages and, as a [`Sink`], receives the assistant's streamed deltas.

use std::io::{self, Stdout, Write};

use crate::stream::Sink;

/// ANSI escape code for dim text (used for the prompt rule).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Width of the rule printed before each prompt.
const RULE_WIDTH: usize = 90;

/// Trait for rendering chat output.
pub trait Renderer: Sink {
    /// Print an informational message on its own line.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print the separator shown before each prompt.
    fn print_rule(&mut self);

    /// Called before the assistant's response starts streaming.
    fn start_response(&mut self);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consumes the renderer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes and flushes; terminal failures are not worth ending the chat.
    fn write(&mut self, text: &str) {
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            log::warn!("terminal write failed: {err}");
        }
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write> Sink for PlainTextRenderer<W> {
    fn write_delta(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Renderer for PlainTextRenderer<W> {
    fn print_info(&mut self, info: &str) {
        self.write(&format!("{info}\n"));
    }

    fn print_error(&mut self, error: &str) {
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write(&format!("{line}\n"));
    }

    fn print_rule(&mut self) {
        let rule = self.styled(ANSI_DIM, &"x".repeat(RULE_WIDTH));
        self.write(&format!("{rule}\n"));
    }

    fn start_response(&mut self) {
        let label = self.styled(ANSI_CYAN, "AI:");
        self.write(&format!("\n{label} "));
    }

    fn finish_response(&mut self) {
        self.write("\n\n");
    }
}

//! Line input for the chat prompt.

use std::collections::VecDeque;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::error::Result;

/// What happened when asking for a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line of text, without its line terminator.
    Line(String),
    /// The user pressed Ctrl+C at the prompt.
    Interrupted,
    /// Input is exhausted (Ctrl+D or end of a pipe).
    Eof,
}

/// A source of user input lines.
pub trait LineReader {
    /// Shows `prompt` and reads one line.
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;
}

/// Interactive line editor with history.
pub struct RustylineReader {
    editor: DefaultEditor,
}

impl RustylineReader {
    /// Creates a reader on the controlling terminal.
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Replays a fixed list of lines, then reports end of input.
///
/// Records every prompt it was asked to show.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    lines: VecDeque<InputEvent>,
    prompts: Vec<String>,
}

impl ScriptedReader {
    /// Creates a reader that yields `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|line| InputEvent::Line(line.into()))
                .collect(),
            prompts: Vec::new(),
        }
    }

    /// Queues an arbitrary event.
    pub fn push_event(&mut self, event: InputEvent) {
        self.lines.push_back(event);
    }

    /// The prompts shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Lines not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(InputEvent::Eof))
    }
}

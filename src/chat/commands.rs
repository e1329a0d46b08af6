//! Classification of user input lines.
//!
//! Every line typed at the chat prompt is one of: a request to exit, a
//! request to switch language, a malformed switch request, or an ordinary
//! chat turn. Classification happens in that priority order.

use crate::language::Language;

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the text to the model.
    Turn(String),

    /// Switch to another language (and its model).
    SwitchLanguage(Language),

    /// End the chat.
    Exit,

    /// A `/lang` command with the wrong arity or an unknown language.
    Malformed,
}

/// Prefix of the language switch command.
const LANG_COMMAND: &str = "/lang";

/// Classifies one line of user input.
///
/// - `exit` (any case, nothing else on the line) ends the chat.
/// - A line starting with `/lang` (any case) switches language when it has
///   exactly two whitespace-separated tokens and the second is a known
///   language code; otherwise it is malformed.
/// - Anything else is a chat turn.
///
/// # Examples
///
/// ```
/// # use lingua_chat::chat::{Command, parse_command};
/// # use lingua_chat::Language;
/// assert_eq!(parse_command("EXIT"), Command::Exit);
/// assert_eq!(parse_command("/lang hu"), Command::SwitchLanguage(Language::Hu));
/// assert_eq!(parse_command("/lang"), Command::Malformed);
/// assert_eq!(parse_command("Hello!"), Command::Turn("Hello!".to_string()));
/// ```
pub fn parse_command(input: &str) -> Command {
    if input.eq_ignore_ascii_case("exit") {
        return Command::Exit;
    }

    if starts_with_ignore_ascii_case(input, LANG_COMMAND) {
        let parts: Vec<&str> = input.split_whitespace().collect();
        return match parts.as_slice() {
            [_, code] => Language::from_code(code)
                .map(Command::SwitchLanguage)
                .unwrap_or(Command::Malformed),
            _ => Command::Malformed,
        };
    }

    Command::Turn(input.to_string())
}

fn starts_with_ignore_ascii_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Usage guidance printed for a malformed `/lang` command.
pub fn usage_text() -> String {
    Language::ALL
        .map(|lang| format!("{LANG_COMMAND} {}", lang.code()))
        .join("   or   ")
}

/// Hint printed under the welcome line.
pub fn hint_text() -> String {
    let switches = Language::ALL
        .map(|lang| format!("'{LANG_COMMAND} {}'", lang.code()))
        .join(" or ");
    format!("Type {switches} to switch model. Type 'exit' to quit.")
}

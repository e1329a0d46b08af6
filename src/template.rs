//! Chat prompt templates.
//!
//! A [`Conversation`] holds the system prompt and prior turns for one model
//! binding; [`PromptTemplate`] renders it into the raw prompt text the model
//! was fine-tuned on, ending with an open assistant header.

use serde::{Deserialize, Serialize};

/// The prompt layout a model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// Llama 3 instruct headers.
    #[default]
    Llama3,
    /// `<|user|>` / `<|assistant|>` blocks terminated by `</s>`.
    Zephyr,
    /// `<|im_start|>` / `<|im_end|>` blocks.
    ChatMl,
    /// Plain `User:` / `Assistant:` lines for base models.
    Raw,
}

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The system prompt.
    System,
    /// The person at the keyboard.
    User,
    /// The model.
    Assistant,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub text: String,
}

/// Conversation memory for one model binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    system: Option<String>,
    turns: Vec<ChatTurn>,
}

impl Conversation {
    /// Starts a conversation with an optional system prompt.
    pub fn new(system: impl Into<String>) -> Self {
        let system = system.into();
        Self {
            system: if system.trim().is_empty() {
                None
            } else {
                Some(system)
            },
            turns: Vec::new(),
        }
    }

    /// Appends a user turn.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::User,
            text: text.into(),
        });
    }

    /// Appends an assistant turn.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    /// Drops the most recent turn, used when generation for it failed.
    pub fn pop(&mut self) -> Option<ChatTurn> {
        self.turns.pop()
    }

    /// The turns so far, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    fn entries(&self) -> impl Iterator<Item = (Role, &str)> {
        self.system
            .as_deref()
            .map(|s| (Role::System, s))
            .into_iter()
            .chain(self.turns.iter().map(|t| (t.role, t.text.as_str())))
    }
}

impl PromptTemplate {
    /// Renders `conversation` and opens the assistant's reply.
    pub fn render(self, conversation: &Conversation) -> String {
        let mut out = String::new();
        match self {
            PromptTemplate::Llama3 => {
                out.push_str("<|begin_of_text|>");
                for (role, text) in conversation.entries() {
                    out.push_str(&format!(
                        "<|start_header_id|>{}<|end_header_id|>\n\n{text}<|eot_id|>",
                        role_name(role)
                    ));
                }
                out.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
            }
            PromptTemplate::Zephyr => {
                for (role, text) in conversation.entries() {
                    out.push_str(&format!("<|{}|>\n{text}</s>\n", role_name(role)));
                }
                out.push_str("<|assistant|>\n");
            }
            PromptTemplate::ChatMl => {
                for (role, text) in conversation.entries() {
                    out.push_str(&format!(
                        "<|im_start|>{}\n{text}<|im_end|>\n",
                        role_name(role)
                    ));
                }
                out.push_str("<|im_start|>assistant\n");
            }
            PromptTemplate::Raw => {
                for (role, text) in conversation.entries() {
                    match role {
                        Role::System => out.push_str(&format!("{text}\n\n")),
                        Role::User => out.push_str(&format!("User: {text}\n")),
                        Role::Assistant => out.push_str(&format!("Assistant: {text}\n")),
                    }
                }
                out.push_str("Assistant:");
            }
        }
        out
    }

    /// Whether the tokenizer should prepend its own BOS token.
    pub fn needs_bos(self) -> bool {
        !matches!(self, PromptTemplate::Llama3)
    }

    /// Text that marks the end of the assistant's turn, if the template has one.
    pub fn stop_marker(self) -> Option<&'static str> {
        match self {
            PromptTemplate::Llama3 => Some("<|eot_id|>"),
            PromptTemplate::Zephyr => Some("</s>"),
            PromptTemplate::ChatMl => Some("<|im_end|>"),
            PromptTemplate::Raw => Some("\nUser:"),
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Where the visible part of a streamed response ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopScan {
    /// The stop marker starts at this offset; generation should end.
    Stopped(usize),
    /// No marker yet. Bytes past this offset might begin one and are held
    /// back until the next token decides.
    Visible(usize),
}

/// Scans generated `bytes` for the template's stop `marker`.
pub fn scan_for_stop(bytes: &[u8], marker: Option<&str>) -> StopScan {
    let Some(marker) = marker.map(str::as_bytes).filter(|m| !m.is_empty()) else {
        return StopScan::Visible(bytes.len());
    };
    if let Some(idx) = bytes.windows(marker.len()).position(|w| w == marker) {
        return StopScan::Stopped(idx);
    }
    let pending = (1..marker.len())
        .rev()
        .find(|&n| bytes.ends_with(&marker[..n]))
        .unwrap_or(0);
    StopScan::Visible(bytes.len() - pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        let mut conv = Conversation::new("Be brief.");
        conv.push_user("Hi");
        conv.push_assistant("Hello!");
        conv.push_user("Bye");
        conv
    }

    #[test]
    fn llama3_layout() {
        let prompt = PromptTemplate::Llama3.render(&sample());
        assert_eq!(
            prompt,
            "<|begin_of_text|>\
<|start_header_id|>system<|end_header_id|>\n\nBe brief.<|eot_id|>\
<|start_header_id|>user<|end_header_id|>\n\nHi<|eot_id|>\
<|start_header_id|>assistant<|end_header_id|>\n\nHello!<|eot_id|>\
<|start_header_id|>user<|end_header_id|>\n\nBye<|eot_id|>\
<|start_header_id|>assistant<|end_header_id|>\n\n"
        );
        assert!(!PromptTemplate::Llama3.needs_bos());
    }

    #[test]
    fn zephyr_layout() {
        let prompt = PromptTemplate::Zephyr.render(&sample());
        assert_eq!(
            prompt,
            "<|system|>\nBe brief.</s>\n<|user|>\nHi</s>\n<|assistant|>\nHello!</s>\n<|user|>\nBye</s>\n<|assistant|>\n"
        );
    }

    #[test]
    fn chatml_without_system_prompt() {
        let mut conv = Conversation::new("   ");
        conv.push_user("Szia");
        assert_eq!(
            PromptTemplate::ChatMl.render(&conv),
            "<|im_start|>user\nSzia<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn raw_layout() {
        let prompt = PromptTemplate::Raw.render(&sample());
        assert_eq!(
            prompt,
            "Be brief.\n\nUser: Hi\nAssistant: Hello!\nUser: Bye\nAssistant:"
        );
    }

    #[test]
    fn pop_discards_failed_turn() {
        let mut conv = sample();
        assert_eq!(conv.pop().map(|t| t.role), Some(Role::User));
        assert_eq!(conv.turns().len(), 2);
    }

    #[test]
    fn stop_scan() {
        assert_eq!(
            scan_for_stop(b"Hello<|eot_id|>junk", Some("<|eot_id|>")),
            StopScan::Stopped(5)
        );
        assert_eq!(scan_for_stop(b"Hello", Some("</s>")), StopScan::Visible(5));
        assert_eq!(scan_for_stop(b"Hello</", Some("</s>")), StopScan::Visible(5));
        assert_eq!(scan_for_stop(b"Hello<", Some("</s>")), StopScan::Visible(5));
        assert_eq!(scan_for_stop(b"Hello", None), StopScan::Visible(5));
    }

    #[test]
    fn template_names_in_yaml() {
        let t: PromptTemplate = serde_yaml::from_str("chatml").unwrap();
        assert_eq!(t, PromptTemplate::ChatMl);
        let t: PromptTemplate = serde_yaml::from_str("zephyr").unwrap();
        assert_eq!(t, PromptTemplate::Zephyr);
    }
}

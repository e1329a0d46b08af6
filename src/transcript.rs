//! Append-only, flush-durable chat transcript.
//!
//! The transcript is a human-readable text file that records session
//! boundaries, user turns, streamed assistant output, language switches and
//! per-turn metadata. Every operation is flushed before it returns so that
//! the file can be tailed mid-session and no completed turn is lost if the
//! process is killed.
//!
//! ```text
//! # Chat session started: 2024-05-01T13:45:09
//! # Model: Meta-Llama-3-8B-Instruct.Q4_0.gguf
//! # Device: cuda
//! # ----------------------------------------
//!
//! SYSTEM: Welcome! How can I help you today?
//!
//! [2024-05-01T13:45:20] USER: Hello
//! AI: Hi there!
//!
//! [META] device=cuda elapsed_seconds=1.42
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::time::Duration;

use rand::Rng;
use time::OffsetDateTime;
use utf8path::Path;

use crate::error::{Error, Result};
use crate::language::Language;
use crate::stream::Sink;
use crate::utils::time::{file_stamp, iso_seconds};

/// Separator line used around session boundaries.
const RULE: &str = "# ----------------------------------------";

/// File extension for transcripts.
pub const TRANSCRIPT_EXTENSION: &str = "chatlog";

/// Writes the transcript of a chat process.
///
/// One logger is opened per process and outlives every model binding; the
/// session controller borrows it for each binding.
pub struct TranscriptLogger<W: Write> {
    writer: W,
}

impl<W: Write> TranscriptLogger<W> {
    /// Wraps `writer`. Nothing is written until the first operation.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the logger, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes the header that opens a model binding.
    pub fn write_session_header(
        &mut self,
        model_id: &str,
        device: &str,
        started: OffsetDateTime,
    ) -> Result<()> {
        self.append(&format!(
            "# Chat session started: {}\n# Model: {model_id}\n# Device: {device}\n{RULE}\n\n",
            iso_seconds(started)
        ))
    }

    /// Records a message shown to the user by the client itself.
    pub fn write_system_message(&mut self, text: &str) -> Result<()> {
        self.append(&format!("SYSTEM: {text}\n\n"))
    }

    /// Records the user's side of a turn.
    pub fn write_user_turn(&mut self, at: OffsetDateTime, text: &str) -> Result<()> {
        self.append(&format!("[{}] USER: {text}\n", iso_seconds(at)))
    }

    /// Writes the assistant label. Streamed output follows it directly.
    pub fn begin_assistant_turn(&mut self) -> Result<()> {
        self.append("AI: ")
    }

    /// Closes the assistant's streamed output with its metadata record.
    pub fn end_assistant_turn(&mut self, elapsed: Duration, device: &str) -> Result<()> {
        self.append(&format!(
            "\n\n[META] device={device} elapsed_seconds={:.2}\n\n",
            elapsed.as_secs_f64()
        ))
    }

    /// Closes an assistant turn whose generation call failed.
    pub fn write_generation_failure(&mut self, message: &str) -> Result<()> {
        self.append(&format!("\n\n[ERROR] generation failed: {message}\n\n"))
    }

    /// Records that the user asked to switch to `target`.
    pub fn write_language_switch_marker(
        &mut self,
        target: Language,
        at: OffsetDateTime,
    ) -> Result<()> {
        self.append(&format!(
            "\n# ---- Language switch requested: {} at {} ----\n\n",
            target.upper_code(),
            iso_seconds(at)
        ))
    }

    /// Writes the footer that ends the chat.
    pub fn write_session_footer(&mut self, ended: OffsetDateTime) -> Result<()> {
        self.append(&format!(
            "\n{RULE}\n# Chat session ended: {}\n",
            iso_seconds(ended)
        ))
    }

    fn append(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .map_err(|err| Error::io("failed to write transcript", err))?;
        self.writer
            .flush()
            .map_err(|err| Error::io("failed to flush transcript", err))
    }
}

impl<W: Write> Sink for TranscriptLogger<W> {
    fn write_delta(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }
}

/// Builds the transcript file name for a process started at `started`.
///
/// The random suffix keeps two processes started in the same second apart.
pub fn transcript_file_name(started: OffsetDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..=0xff_ffff);
    format!(
        "chat_{}_{suffix:06x}.{TRANSCRIPT_EXTENSION}",
        file_stamp(started)
    )
}

/// Creates a new transcript file under `dir`, creating the directory if
/// needed.
///
/// The file is opened unbuffered so that every flushed write reaches the
/// operating system immediately. An existing file is never reused.
pub fn create_transcript_file(
    dir: &Path,
    started: OffsetDateTime,
) -> Result<(Path<'static>, File)> {
    std::fs::create_dir_all(dir)
        .map_err(|err| Error::io(format!("failed to create log directory {}", dir.as_str()), err))?;
    let name = transcript_file_name(started);
    let path = dir.join(name.as_str()).into_owned();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| Error::io(format!("failed to create transcript {}", path.as_str()), err))?;
    log::info!("writing transcript to {}", path.as_str());
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn contents(logger: TranscriptLogger<Vec<u8>>) -> String {
        String::from_utf8(logger.into_inner()).unwrap()
    }

    #[test]
    fn full_session_layout() {
        let mut logger = TranscriptLogger::new(Vec::new());
        logger
            .write_session_header("llama.gguf", "cuda", datetime!(2024-05-01 13:45:09 UTC))
            .unwrap();
        logger
            .write_system_message("Welcome! How can I help you today?")
            .unwrap();
        logger
            .write_user_turn(datetime!(2024-05-01 13:45:20 UTC), "Hello")
            .unwrap();
        logger.begin_assistant_turn().unwrap();
        logger.write_delta("Hi ").unwrap();
        logger.write_delta("there!").unwrap();
        logger
            .end_assistant_turn(Duration::from_millis(1419), "cuda")
            .unwrap();
        logger
            .write_language_switch_marker(Language::Hu, datetime!(2024-05-01 13:46:00 UTC))
            .unwrap();
        logger
            .write_session_footer(datetime!(2024-05-01 13:50:00 UTC))
            .unwrap();

        let expected = "\
# Chat session started: 2024-05-01T13:45:09
# Model: llama.gguf
# Device: cuda
# ----------------------------------------

SYSTEM: Welcome! How can I help you today?

[2024-05-01T13:45:20] USER: Hello
AI: Hi there!

[META] device=cuda elapsed_seconds=1.42


# ---- Language switch requested: HU at 2024-05-01T13:46:00 ----


# ----------------------------------------
# Chat session ended: 2024-05-01T13:50:00
";
        assert_eq!(contents(logger), expected);
    }

    #[test]
    fn generation_failure_marker() {
        let mut logger = TranscriptLogger::new(Vec::new());
        logger.begin_assistant_turn().unwrap();
        logger.write_delta("partial").unwrap();
        logger.write_generation_failure("backend crashed").unwrap();
        assert_eq!(
            contents(logger),
            "AI: partial\n\n[ERROR] generation failed: backend crashed\n\n"
        );
    }

    #[test]
    fn file_name_shape() {
        let name = transcript_file_name(datetime!(2024-05-01 03:04:05 UTC));
        assert!(name.starts_with("chat_20240501_030405_"), "{name}");
        assert!(name.ends_with(".chatlog"), "{name}");
        let suffix = &name["chat_20240501_030405_".len()..name.len() - ".chatlog".len()];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn transcript_file_is_durable_per_write() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("chat_logs");
        let logs = Path::try_from(logs).unwrap();
        let (path, file) =
            create_transcript_file(&logs, datetime!(2024-05-01 03:04:05 UTC)).unwrap();
        let mut logger = TranscriptLogger::new(file);
        logger.write_system_message("hello").unwrap();
        // Readable before the logger is dropped.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SYSTEM: hello\n\n");
        logger.write_user_turn(datetime!(2024-05-01 03:04:06 UTC), "hi").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "SYSTEM: hello\n\n[2024-05-01T03:04:06] USER: hi\n"
        );
    }
}

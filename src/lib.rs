// Public modules
pub mod backend;
pub mod chat;
pub mod error;
pub mod language;
pub mod render;
pub mod stream;
pub mod template;
pub mod transcript;
pub mod utils;

mod observability;

// Re-exports
pub use error::{Error, Result};
pub use language::Language;
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use stream::{Sink, StreamState, StreamSynchronizer};
pub use transcript::TranscriptLogger;

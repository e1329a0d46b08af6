//! Error types for lingua-chat.
//!
//! This module defines the error type shared by the transcript, the model
//! backends, configuration loading, and the session controller.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for lingua-chat.
#[derive(Clone, Debug)]
pub enum Error {
    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A model could not be loaded for the requested language.
    ModelLoad {
        /// Human-readable error message.
        message: String,
        /// Identifier of the model that failed to load.
        model_id: Option<String>,
    },

    /// The backend failed while generating a response.
    Generation {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Invalid or inconsistent configuration.
    Config {
        /// Human-readable error message.
        message: String,
        /// Setting that caused the error.
        param: Option<String>,
    },

    /// Error during YAML serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A value failed validation.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// Reading interactive input failed.
    Input {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new model load error.
    pub fn model_load(message: impl Into<String>, model_id: Option<String>) -> Self {
        Error::ModelLoad {
            message: message.into(),
            model_id,
        }
    }

    /// Creates a new generation error.
    pub fn generation(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Generation {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Config {
            message: message.into(),
            param,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new input error.
    pub fn input(message: impl Into<String>) -> Self {
        Error::Input {
            message: message.into(),
        }
    }

    /// Returns true if this error is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    /// Returns true if this error came from loading a model.
    pub fn is_model_load(&self) -> bool {
        matches!(self, Error::ModelLoad { .. })
    }

    /// Returns true if this error came from the generation call.
    pub fn is_generation(&self) -> bool {
        matches!(self, Error::Generation { .. })
    }

    /// Returns true if this error is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error came from reading interactive input.
    pub fn is_input(&self) -> bool {
        matches!(self, Error::Input { .. })
    }

    /// Returns the model identifier associated with this error, if any.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Error::ModelLoad { model_id, .. } => model_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the message without the kind prefix used by `Display`.
    pub fn message(&self) -> &str {
        match self {
            Error::Io { message, .. }
            | Error::ModelLoad { message, .. }
            | Error::Generation { message, .. }
            | Error::Config { message, .. }
            | Error::Serialization { message, .. }
            | Error::Validation { message, .. }
            | Error::Input { message } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::ModelLoad { message, model_id } => {
                if let Some(model_id) = model_id {
                    write!(f, "Model load error: {message} (model: {model_id})")
                } else {
                    write!(f, "Model load error: {message}")
                }
            }
            Error::Generation { message, .. } => {
                write!(f, "Generation error: {message}")
            }
            Error::Config { message, param } => {
                if let Some(param) = param {
                    write!(f, "Configuration error: {message} (setting: {param})")
                } else {
                    write!(f, "Configuration error: {message}")
                }
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Input { message } => {
                write!(f, "Input error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Generation { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<rustyline::error::ReadlineError> for Error {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        Error::input(err.to_string())
    }
}

/// A specialized Result type for lingua-chat operations.
pub type Result<T> = std::result::Result<T, Error>;

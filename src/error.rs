//! Error handling for archive-sweep

use thiserror::Error;

/// Main error type for archive-sweep
#[derive(Error, Debug, Clone)]
pub enum SweepError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Archive error ({path}): {message}")]
    Archive { path: String, message: String },

    #[error("Checker error ({method}): {message}")]
    Checker {
        method: crate::types::CheckMethod,
        message: String,
        candidate: Option<String>,
    },

    #[error("Retry budget exhausted after {attempts} attempts for candidate '{candidate}'")]
    RetriesExhausted { candidate: String, attempts: u32 },

    #[error("Invalid resume candidate '{candidate}': {message}")]
    Resume { candidate: String, message: String },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        content: Option<String>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("CLI error: {message}")]
    Cli { message: String },
}

impl SweepError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an archive format error
    pub fn archive(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a checker error
    pub fn checker(
        method: crate::types::CheckMethod,
        message: impl Into<String>,
        candidate: Option<String>,
    ) -> Self {
        Self::Checker {
            method,
            message: message.into(),
            candidate,
        }
    }

    /// Create a retry budget error
    pub fn retries_exhausted(candidate: impl Into<String>, attempts: u32) -> Self {
        Self::RetriesExhausted {
            candidate: candidate.into(),
            attempts,
        }
    }

    /// Create a resume candidate error
    pub fn resume(candidate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resume {
            candidate: candidate.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>, content: Option<String>) -> Self {
        Self::Parse {
            message: message.into(),
            content,
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Io {
            message: message.into(),
            path,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a CLI error
    pub fn cli(message: impl Into<String>) -> Self {
        Self::Cli {
            message: message.into(),
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message } => {
                format!("Configuration problem: {}\nhint: check your .env file or ARCHIVE_SWEEP_* variables", message)
            }
            Self::Archive { path, message } => {
                format!("Cannot use archive {}: {}\nhint: only ZIP archives are verified in-process, try ARCHIVE_SWEEP_METHOD=7z", path, message)
            }
            Self::Checker { method, message, candidate } => {
                let tried = candidate
                    .as_ref()
                    .map_or(String::new(), |c| format!(" while trying '{}'", c));
                format!("The {} checker failed{}: {}", method, tried, message)
            }
            Self::RetriesExhausted { candidate, attempts } => {
                format!("Gave up on '{}' after {} attempts\nhint: lower ARCHIVE_SWEEP_WORKERS or raise the open file limit", candidate, attempts)
            }
            Self::Resume { candidate, message } => {
                format!("Cannot resume from '{}': {}\nhint: pass a candidate printed by a previous run", candidate, message)
            }
            Self::Parse { message, .. } => format!("Parse error: {}", message),
            Self::Io { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("File error{}: {}\nhint: check file permissions and paths", path_info, message)
            }
            Self::Internal { message } => {
                format!("Internal error: {}\nhint: this is a bug, please report it", message)
            }
            Self::Cli { message } => {
                format!("Command error: {}\nhint: use --help for usage information", message)
            }
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string(), None)
    }
}

impl From<std::io::Error> for SweepError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string(), None)
    }
}

impl From<tokio::task::JoinError> for SweepError {
    fn from(err: tokio::task::JoinError) -> Self {
        crate::internal_error!("worker task failed: {}", err)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweepError>;

/// Helper macros for common error patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::SweepError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SweepError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::SweepError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SweepError::internal(format!($fmt, $($arg)*))
    };
}

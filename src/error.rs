use std::fmt::{self, Display, Formatter};

use crate::recognition::RecognitionError;

/// Application error types surfaced at the orchestration boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Selection backend or local cache failed (read or write)
    Store(String),

    /// Image recognition failed or was rejected
    Recognition { status: u16, message: String },

    /// An id that is not in the loaded catalog
    UnknownEntry(String),

    /// A commit was started while another one was still saving
    SaveInProgress,

    /// The platform refused to open a deep link or store page
    Navigation(String),

    /// Settings could not be loaded or were invalid
    Config(String),

    /// Sign-in, sign-up, or sign-out failed
    Auth(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            AppError::Store(msg) => {
                write!(f, "Could not save or load your apps: {}", msg)
            }
            AppError::Recognition { message, .. } => {
                write!(f, "Image recognition failed: {}", message)
            }
            AppError::UnknownEntry(id) => {
                write!(f, "Unknown app '{}'", id)
            }
            AppError::SaveInProgress => {
                write!(f, "A save is already in progress")
            }
            AppError::Navigation(msg) => {
                write!(f, "Could not open the app: {}", msg)
            }
            AppError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            AppError::Auth(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<RecognitionError> for AppError {
    fn from(e: RecognitionError) -> Self {
        AppError::Recognition {
            status: e.status,
            message: e.message,
        }
    }
}

impl AppError {
    /// HTTP-style status for hosts that report errors that way.
    pub fn status(&self) -> u16 {
        match self {
            AppError::Recognition { status, .. } => *status,
            AppError::UnknownEntry(_) => 404,
            AppError::SaveInProgress => 409,
            AppError::Auth(_) => 401,
            AppError::Store(_) | AppError::Navigation(_) | AppError::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::SaveInProgress.status(), 409);
        assert_eq!(AppError::UnknownEntry("42".to_string()).status(), 404);
        assert_eq!(AppError::Auth("bad password".to_string()).status(), 401);
        assert_eq!(AppError::Store("disk full".to_string()).status(), 500);
        assert_eq!(AppError::UnknownEntry("42".to_string()).to_string(), "Unknown app '42'");
    }

    #[test]
    fn test_recognition_error_keeps_status() {
        let err: AppError = RecognitionError::unavailable("no key").into();
        assert_eq!(err.status(), 503);
        assert_eq!(err.to_string(), "Image recognition failed: no key");
    }
}

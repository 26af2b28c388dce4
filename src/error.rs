//! Error types for Pica
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (resolution, download, merge, file, storage)
//! so the download runner can decide how to contain them.
//!
//! ## Containment
//!
//! None of these errors escape a running download job. The runner converts
//! them into a terminal `Failed` phase and logs them. They are only returned
//! directly from operations that run before a job exists (stream resolution,
//! plan selection) and from the storage/preference helpers.

use thiserror::Error;

/// Result type alias using our PicaError type
pub type Result<T> = std::result::Result<T, PicaError>;

/// Main error type for Pica
#[derive(Error, Debug)]
pub enum PicaError {
    // ===== Resolution Errors =====

    /// The stream resolution provider could not resolve the source
    #[error("Failed to resolve source '{source_id}': {message}")]
    ResolutionFailed {
        source_id: String,
        message: String,
    },

    /// The resolved source has no downloadable streams
    #[error("No downloadable streams found")]
    NoStreams,

    /// Adaptive download requested but no audio-only stream exists
    #[error("No audio stream available to pair with video stream '{0}'")]
    NoAudioStream(String),

    /// Stream manifest is malformed
    #[error("Invalid stream manifest: {0}")]
    InvalidManifest(String),

    // ===== Download Errors =====

    /// Network connectivity error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
    },

    /// Download finished with fewer bytes than announced
    #[error("Download incomplete: {received}/{expected} bytes")]
    IncompleteDownload {
        expected: u64,
        received: u64,
    },

    /// Invalid download URL format or protocol
    #[error("Invalid download URL: {0}")]
    InvalidDownloadUrl(String),

    // ===== Merge Errors =====

    /// The merge tool ran but reported failure
    #[error("Merge failed: {0}")]
    MergeFailed(String),

    /// FFmpeg execution error
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// FFmpeg binary not found
    #[error("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")]
    FfmpegNotFound,

    // ===== File/Storage Errors =====

    /// File or directory not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Generic file I/O error
    #[error("File I/O error: {0}")]
    FileIoError(String),

    /// Invalid file path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Download directory doesn't exist and could not be created
    #[error("Download directory is not usable: {0}")]
    DownloadDirectoryUnavailable(String),

    /// Library store read/write failure
    #[error("Library error: {0}")]
    LibraryError(String),

    // ===== Configuration/State Errors =====

    /// Job state is invalid for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ===== General Errors =====

    /// Operation was cancelled by user
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<url::ParseError> for PicaError {
    fn from(err: url::ParseError) -> Self {
        PicaError::InvalidDownloadUrl(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PicaError {
    fn from(err: tokio::task::JoinError) -> Self {
        PicaError::InternalError(format!("Background task failed: {}", err))
    }
}

// Helper methods for creating common errors
impl PicaError {
    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        PicaError::InternalError(message.into())
    }

    /// Create a ResolutionFailed error
    pub fn resolution_failed<S: Into<String>, M: Into<String>>(source_id: S, message: M) -> Self {
        PicaError::ResolutionFailed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, status_code: Option<u16>) -> Self {
        PicaError::NetworkError {
            message: message.into(),
            status_code,
        }
    }

    /// Whether this error is the cooperative cancellation marker
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PicaError::Cancelled)
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            PicaError::FileNotFound(_)
                | PicaError::FileIoError(_)
                | PicaError::InvalidPath(_)
                | PicaError::DownloadDirectoryUnavailable(_)
                | PicaError::IoError(_)
        )
    }

    /// Check if error came from the merge step
    pub fn is_merge_error(&self) -> bool {
        matches!(
            self,
            PicaError::MergeFailed(_) | PicaError::FfmpegError(_) | PicaError::FfmpegNotFound
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            PicaError::FfmpegNotFound => {
                "FFmpeg is required to merge video and audio but was not found. Please install FFmpeg and ensure it's in your PATH.".to_string()
            }
            PicaError::NoStreams => "No downloadable streams found for this video.".to_string(),
            PicaError::ResolutionFailed { .. } | PicaError::NetworkError { .. } => {
                "Unable to reach the video. Please check the link and your connection.".to_string()
            }
            PicaError::IncompleteDownload { .. } => {
                "The download was interrupted. Please try again.".to_string()
            }
            PicaError::Cancelled => "Download cancelled.".to_string(),
            _ => self.to_string(),
        }
    }
}

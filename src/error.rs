// MirrorCore - Telegram media download coordination
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Error types for MirrorCore
//!
//! Every failure a download request can hit is terminal for that request:
//! nothing here is retried internally. The variants are grouped the same way
//! the coordinator reports them:
//!
//! - **Validation**: bad session mode for the chat, no media on the message.
//!   Reported immediately, no session is created.
//! - **Admission**: duplicate content, size limits, identifier already in
//!   flight, queue wait timeout. Reported, nothing is downloaded.
//! - **Transfer**: transport failures, null results, user cancellation.
//!   Routed through the session's error transition.
//!
//! The `Display` strings of the lifecycle variants are the exact texts shown
//! to users, so listeners can forward `to_string()` unchanged.

use thiserror::Error;

/// Result type alias using our MirrorError type
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Main error type for MirrorCore
#[derive(Error, Debug)]
pub enum MirrorError {
    // ===== Validation Errors =====

    /// The elevated client was requested outside a supergroup
    #[error("Use SuperGroup to download this Link with User!")]
    InvalidSession,

    /// The message carries none of the known media kinds
    #[error("No valid media type in the replied message")]
    NoValidMedia,

    /// Message lookup through a client failed
    #[error("Failed to fetch message {message_id} in chat {chat_id}: {reason}")]
    MessageUnavailable {
        chat_id: i64,
        message_id: i64,
        reason: String,
    },

    // ===== Admission Errors =====

    /// Another session already holds this media identifier
    #[error("File already being downloaded!")]
    AlreadyDownloading,

    /// The duplicate checker found the same content already mirrored
    #[error("{message}")]
    Duplicate { message: String },

    /// The limit checker rejected the request
    #[error("{0}")]
    LimitExceeded(String),

    /// Admission never arrived within the configured wait
    #[error("Queue wait timed out after {0} seconds")]
    QueueTimeout(u64),

    /// The admission side dropped the wait handle without signalling
    #[error("Queue admission was abandoned")]
    AdmissionDropped,

    // ===== Transfer Errors =====

    /// The transport raised while streaming bytes
    #[error("{0}")]
    Transport(String),

    /// The transport finished without a result and without cancellation
    #[error("Internal error occurred")]
    Internal,

    /// The session was cancelled by the user
    #[error("Cancelled by user!")]
    Cancelled,

    /// Server answered the file lookup with an API-level failure
    #[error("Bot API error: {description}")]
    BotApi {
        description: String,
        error_code: Option<i64>,
    },

    /// Downloaded byte count disagrees with the advertised size
    #[error("Download incomplete: {actual}/{expected} bytes")]
    Incomplete { expected: u64, actual: u64 },

    // ===== Configuration Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Create a Transport error from anything printable
    pub fn transport<S: Into<String>>(message: S) -> Self {
        MirrorError::Transport(message.into())
    }

    /// Create a Duplicate error with the checker's message
    pub fn duplicate<S: Into<String>>(message: S) -> Self {
        MirrorError::Duplicate {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config<S: Into<String>>(message: S) -> Self {
        MirrorError::Config(message.into())
    }

    /// True for errors raised before any session exists
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MirrorError::InvalidSession
                | MirrorError::NoValidMedia
                | MirrorError::MessageUnavailable { .. }
        )
    }

    /// True when the request was rejected at admission time
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            MirrorError::AlreadyDownloading
                | MirrorError::Duplicate { .. }
                | MirrorError::LimitExceeded(_)
                | MirrorError::QueueTimeout(_)
                | MirrorError::AdmissionDropped
        )
    }

    /// True for the user-initiated cancellation path
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MirrorError::Cancelled)
    }

    /// Get user-friendly error message suitable for display
    ///
    /// Library errors carry technical detail; everything the coordinator
    /// produces itself is already phrased for users.
    pub fn user_message(&self) -> String {
        match self {
            MirrorError::Reqwest(_) => {
                "Network error while downloading. Please try again.".to_string()
            }
            MirrorError::Io(e) => format!("Could not write the file: {}", e),
            MirrorError::BotApi { description, .. } => {
                format!("Telegram refused the download: {}", description)
            }
            MirrorError::MessageUnavailable { .. } => {
                "Could not access the replied message with the user session.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

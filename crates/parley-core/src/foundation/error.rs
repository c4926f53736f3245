//! Unified error types for the Parley core engine.

use thiserror::Error;

// =============================================================================
// Listener Errors
// =============================================================================

/// Errors returned synchronously when a listener is registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener definition is inconsistent (no handler, two handlers,
    /// more than one lifetime field, ...).
    #[error("invalid listener configuration: {reason}")]
    InvalidListenerConfig {
        /// What is wrong with the definition.
        reason: String,
    },

    /// The event loop has shut down; nothing can be registered any more.
    #[error("event loop is not running")]
    LoopClosed,
}

impl ListenerError {
    /// Creates an invalid configuration error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidListenerConfig {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors produced by calls into the chat service.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The connection to the chat service is not established.
    #[error("not connected to the chat service")]
    NotConnected,

    /// The call did not complete in time.
    #[error("chat API call timed out")]
    Timeout,

    /// The service rejected the call.
    #[error("chat API error ({code}): {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outgoing queue is closed.
    #[error("outgoing queue closed")]
    QueueClosed,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a provider error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors that stop the event loop.
///
/// Only transport failures while fetching the directory on connect are
/// fatal: the bot cannot operate without a directory snapshot.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fetching the directory snapshot failed.
    #[error("failed to fetch directory snapshot: {0}")]
    Transport(#[source] ApiError),
}

// =============================================================================
// Group Errors
// =============================================================================

/// Errors from group membership lookups.
#[derive(Debug, Clone, Error)]
pub enum GroupError {
    /// The group backend could not be read.
    #[error("group backend unavailable: {0}")]
    Backend(String),
}

// =============================================================================
// Status Errors
// =============================================================================

/// Errors from [`Status::update`](crate::status::Status::update).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    /// The component name is not one of `db`, `chat`, `http`.
    #[error("invalid component: {0}")]
    InvalidComponent(String),

    /// The value is not one of `ok`, `not ok`, `n/a`.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for chat API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for listener registration.
pub type ListenerResult<T> = Result<T, ListenerError>;

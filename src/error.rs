//! Error types for the chat server
//!
//! Setup errors abort startup. Runtime errors are scoped to one handle or
//! one worker and are logged by the worker loop, which keeps going.
//! Uses thiserror for ergonomic error definitions.

use std::io;

use thiserror::Error;

use crate::types::ClientHandle;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Port could not be resolved to a bindable address (fatal)
    #[error("failed to resolve address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Bind failed (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// listen(2) failed (fatal)
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Multiplexer creation or listener arming failed (fatal)
    #[error("multiplexer setup failed: {0}")]
    Multiplexer(#[source] io::Error),

    /// Worker thread could not be created (fatal)
    #[error("failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Non-transient accept failure; ends the current accept round
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// Non-transient receive failure on a client handle
    #[error("receive from {handle} failed: {source}")]
    Receive {
        handle: ClientHandle,
        #[source]
        source: io::Error,
    },

    /// Non-transient send failure; aborts the remaining fan-out
    #[error("send to {handle} failed: {source}")]
    Send {
        handle: ClientHandle,
        #[source]
        source: io::Error,
    },

    /// Multiplexer wait failed; ends the observing worker
    #[error("multiplexer wait failed: {0}")]
    Wait(#[source] io::Error),

    /// Other IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    /// Whether this error belongs to startup and must abort the process
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            AppError::Resolve { .. }
                | AppError::Bind { .. }
                | AppError::Listen(_)
                | AppError::Multiplexer(_)
                | AppError::Spawn { .. }
        )
    }
}

/// Transient conditions that are never reported as errors
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

pub(crate) fn is_interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_classification() {
        let err = AppError::Listen(io::Error::other("boom"));
        assert!(err.is_fatal_setup());

        let err = AppError::Send {
            handle: ClientHandle(3),
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(!err.is_fatal_setup());
        assert!(err.to_string().contains("#3"));
    }

    #[test]
    fn test_transient_kinds() {
        assert!(is_would_block(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_interrupted(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_would_block(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }
}

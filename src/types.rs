//! Basic type definitions for the chat server
//!
//! Provides the `ClientHandle` newtype used as the key for every
//! registered connection and as the readiness token in the multiplexer.

use std::sync::atomic::{AtomicUsize, Ordering};

use mio::Token;

/// Opaque connection identifier (newtype pattern)
///
/// Handle `0` is reserved for the listening socket. Client handles are
/// issued by a `HandleAllocator` and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(pub usize);

impl ClientHandle {
    /// Handle of the listening socket
    pub const LISTENER: ClientHandle = ClientHandle(0);

    /// Whether this handle refers to the listening socket
    pub fn is_listener(self) -> bool {
        self == Self::LISTENER
    }
}

impl From<Token> for ClientHandle {
    fn from(token: Token) -> Self {
        Self(token.0)
    }
}

impl From<ClientHandle> for Token {
    fn from(handle: ClientHandle) -> Self {
        Token(handle.0)
    }
}

impl std::fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues fresh client handles, starting right after the listener's
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicUsize,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(ClientHandle::LISTENER.0 + 1),
        }
    }

    /// Allocate the next unused handle
    pub fn next(&self) -> ClientHandle {
        ClientHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

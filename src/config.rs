//! Server configuration
//!
//! Port and worker count come from the command line; the rest are fixed.

/// Pending-connection backlog passed to `listen(2)`
pub const LISTEN_BACKLOG: i32 = 50;

/// Number of handles the multiplexer reports per wait
pub const MULTIPLEXER_CAPACITY: usize = 5000;

/// Size of the per-read buffer
pub const READ_BUFFER_SIZE: usize = 8192;

/// Default worker thread count
pub const DEFAULT_WORKERS: usize = 4;

/// Runtime configuration for a `Server`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to bind on all local IPv4 addresses (`"0"` for ephemeral)
    pub port: String,
    /// Number of worker threads sharing the multiplexer
    pub workers: usize,
    pub backlog: i32,
    pub capacity: usize,
    pub read_buffer: usize,
}

impl ServerConfig {
    /// Create a config with the fixed backlog, capacity and buffer size
    pub fn new(port: impl Into<String>, workers: usize) -> Self {
        Self {
            port: port.into(),
            workers: workers.max(1),
            backlog: LISTEN_BACKLOG,
            capacity: MULTIPLEXER_CAPACITY,
            read_buffer: READ_BUFFER_SIZE,
        }
    }

    /// Address string handed to the resolver
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("8080", DEFAULT_WORKERS)
    }
}

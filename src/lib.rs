//! Multi-threaded Broadcast Chat Server Library
//!
//! A plain-TCP chat server: clients connect, send a nickname as their
//! first payload, and every later payload is fanned out to the other
//! connected clients.
//!
//! # Features
//! - Nickname handshake on the first payload
//! - Public chat lines broadcast to everyone else
//! - Directed messages: `> <nickname> <message>`
//! - User listing: `$ show users`
//! - Join, leave and "only you here" notices
//!
//! # Architecture
//! A fixed pool of worker threads shares one edge-triggered `mio::Poll`:
//! - `poller::Multiplexer` serializes the wait behind a dispatch lock
//! - `registry::ClientRegistry` owns every client record behind one mutex
//! - `acceptor`, `handler` and `dispatcher` do all socket I/O without
//!   holding either lock
//!
//! # Example
//! ```no_run
//! use broadcast_chat_server::Server;
//!
//! let server = Server::new("8080", 4).expect("setup failed");
//! server.start().expect("worker pool failed");
//! ```

pub mod acceptor;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod poller;
pub mod registry;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use client::{ClientRecord, ClientSummary};
pub use config::ServerConfig;
pub use dispatcher::{Delivery, Dispatcher};
pub use error::AppError;
pub use message::{ClientMessage, ServerMessage};
pub use registry::ClientRegistry;
pub use server::{Server, ServerContext};
pub use types::ClientHandle;

//! Connection acceptor
//!
//! Drains the listening socket: every accepted connection is recorded in
//! the registry first and armed in the multiplexer second, so a readiness
//! event can never reach a handle the registry does not know yet.

use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use mio::net::TcpStream;
use tracing::{debug, info};

use crate::client::ClientRecord;
use crate::error::{is_interrupted, is_would_block, AppError};
use crate::server::ServerContext;
use crate::types::ClientHandle;

/// Result of a single accept attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// A connection was registered under this handle
    Client(ClientHandle),
    /// No connection is pending
    Drained,
}

/// Accept at most one pending connection
pub fn accept_one(ctx: &ServerContext) -> Result<Accepted, AppError> {
    loop {
        match ctx.listener.accept() {
            Ok((stream, peer)) => return register_client(ctx, stream, peer).map(Accepted::Client),
            Err(e) if is_interrupted(&e) => continue,
            Err(e) if is_would_block(&e) => return Ok(Accepted::Drained),
            Err(e) => return Err(AppError::Accept(e)),
        }
    }
}

/// Accept until the listener would block, returning how many were registered
pub fn accept_pending(ctx: &ServerContext) -> Result<usize, AppError> {
    let mut accepted = 0;
    while let Accepted::Client(_) = accept_one(ctx)? {
        accepted += 1;
    }
    debug!(accepted, "Accept queue drained");
    Ok(accepted)
}

// mio hands out accepted sockets already in non-blocking mode.
fn register_client(
    ctx: &ServerContext,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<ClientHandle, AppError> {
    let handle = ctx.next_handle();
    let fd = stream.as_raw_fd();

    ctx.registry
        .insert(ClientRecord::new(handle, peer, Arc::new(stream)));

    if let Err(e) = ctx.multiplexer.register_fd(fd, handle) {
        // Dropping the record closes the socket
        ctx.registry.remove(handle);
        return Err(AppError::Io(e));
    }

    info!("Client {} connected from {}", handle, peer);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::net::TcpStream as StdTcpStream;

    fn context() -> ServerContext {
        ServerContext::bind(ServerConfig::new("0", 1)).unwrap()
    }

    fn connect(ctx: &ServerContext) -> StdTcpStream {
        let port = ctx.local_addr().unwrap().port();
        StdTcpStream::connect(("127.0.0.1", port)).unwrap()
    }

    #[test]
    fn test_nothing_pending() {
        let ctx = context();
        assert_eq!(accept_one(&ctx).unwrap(), Accepted::Drained);
        assert_eq!(accept_pending(&ctx).unwrap(), 0);
    }

    #[test]
    fn test_accept_registers_client() {
        let ctx = context();
        let peer = connect(&ctx);

        let Accepted::Client(handle) = accept_one(&ctx).unwrap() else {
            panic!("expected a connection");
        };
        assert!(!handle.is_listener());
        assert!(ctx.registry.contains(handle));

        let rows = ctx.registry.summaries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].host, "127.0.0.1");
        assert_eq!(rows[0].port, peer.local_addr().unwrap().port().to_string());
        assert_eq!(rows[0].nickname, "");
    }

    #[test]
    fn test_accept_pending_drains_queue() {
        let ctx = context();
        let _peers: Vec<_> = (0..3).map(|_| connect(&ctx)).collect();

        assert_eq!(accept_pending(&ctx).unwrap(), 3);
        assert_eq!(ctx.registry.len(), 3);
        assert_eq!(accept_one(&ctx).unwrap(), Accepted::Drained);
    }
}

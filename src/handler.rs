//! Message ingest and protocol engine
//!
//! Handles one ready client handle: drains the socket (edge-triggered, so
//! it must read until it would block), then interprets the accumulated
//! payload as the nickname handshake, a user-list query, a directed
//! message, or a public chat line.

use std::io::Read;
use std::net::Shutdown;
use std::os::fd::AsRawFd;

use mio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::client::ClientRecord;
use crate::dispatcher::Dispatcher;
use crate::error::{is_interrupted, is_would_block, AppError};
use crate::message::{decode_payload, ClientMessage, ServerMessage};
use crate::registry::Handshake;
use crate::server::ServerContext;
use crate::types::ClientHandle;

/// What a drain of one socket produced
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes read before the socket would block (possibly none)
    Data(Vec<u8>),
    /// The peer closed the connection
    Closed,
}

/// Read until the socket would block or the peer closes
pub fn read_available(
    stream: &TcpStream,
    handle: ClientHandle,
    buffer_size: usize,
) -> Result<ReadOutcome, AppError> {
    let mut reader = stream;
    let mut buf = vec![0u8; buffer_size];
    let mut accumulated = Vec::new();

    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(ReadOutcome::Closed),
            Ok(n) => accumulated.extend_from_slice(&buf[..n]),
            Err(e) if is_interrupted(&e) => continue,
            Err(e) if is_would_block(&e) => return Ok(ReadOutcome::Data(accumulated)),
            Err(source) => return Err(AppError::Receive { handle, source }),
        }
    }
}

/// Process a readable client handle
///
/// A receive failure is returned to the worker; the handle stays
/// registered.
pub fn handle_readable(ctx: &ServerContext, handle: ClientHandle) -> Result<(), AppError> {
    let Some(recipient) = ctx.registry.recipient(handle) else {
        debug!("Readiness for unregistered handle {}", handle);
        return Ok(());
    };

    let bytes = match read_available(&recipient.stream, handle, ctx.config.read_buffer)? {
        ReadOutcome::Closed => return handle_disconnect(ctx, handle),
        ReadOutcome::Data(bytes) => bytes,
    };

    // Idle wake
    let Some(text) = decode_payload(&bytes) else {
        return Ok(());
    };

    handle_payload(ctx, handle, &text)
}

/// Interpret one decoded payload from `handle`
pub fn handle_payload(ctx: &ServerContext, handle: ClientHandle, text: &str) -> Result<(), AppError> {
    let dispatcher = Dispatcher::new(&ctx.registry);

    match ctx.registry.complete_handshake(handle, text) {
        Handshake::Unknown => return Ok(()),
        Handshake::Completed => {
            info!("Client {} set nickname to '{}'", handle, text);
            dispatcher.broadcast_except(
                handle,
                &ServerMessage::Welcome {
                    nickname: text.to_string(),
                },
            )?;
            return Ok(());
        }
        Handshake::AlreadySet => {}
    }

    // Side notice only; the payload is still handled below
    if ctx.registry.len() == 1 {
        dispatcher.unicast(handle, &ServerMessage::Caution)?;
    }

    match ClientMessage::parse(text) {
        ClientMessage::ShowUsers => {
            let rows = ctx.registry.summaries();
            dispatcher.unicast(handle, &ServerMessage::UserList(rows))?;
        }
        ClientMessage::Direct { target, body } => {
            let delivery = dispatcher.send_to_nickname(&target, &ServerMessage::Direct { body })?;
            debug!(
                "Client {} sent a directed message to '{}' ({} recipients)",
                handle, target, delivery.delivered
            );
        }
        ClientMessage::Chat(content) => {
            let from = ctx.registry.nickname(handle).unwrap_or_default();
            info!("Message from {}: {}", from, content);
            dispatcher.broadcast_except(handle, &ServerMessage::Chat { from, content })?;
        }
    }

    Ok(())
}

/// The peer closed: unregister, close, and tell everyone else
pub fn handle_disconnect(ctx: &ServerContext, handle: ClientHandle) -> Result<(), AppError> {
    let Some(record) = close_client(ctx, handle) else {
        return Ok(());
    };

    let nickname = record.nickname().to_string();
    info!(
        "Client {} ('{}') disconnected, {} remaining",
        handle,
        nickname,
        ctx.registry.len()
    );

    Dispatcher::new(&ctx.registry).broadcast_except(handle, &ServerMessage::Leave { nickname })?;
    Ok(())
}

/// Remove a client from the registry and close its socket
///
/// Returns the removed record, or None if the handle was already gone.
pub fn close_client(ctx: &ServerContext, handle: ClientHandle) -> Option<ClientRecord> {
    let record = ctx.registry.remove(handle)?;
    let stream = record.stream();

    if let Err(e) = ctx.multiplexer.deregister_fd(stream.as_raw_fd()) {
        debug!("Deregistering {} failed: {}", handle, e);
    }
    // Other workers may still hold the stream in a snapshot; shut it down
    // so the peer sees the close now.
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!("Shutting down {} failed: {}", handle, e);
    }
    Some(record)
}

/// Drop a handle reported with an error or hangup flag
pub fn drop_failed(ctx: &ServerContext, handle: ClientHandle) {
    match close_client(ctx, handle) {
        Some(record) => warn!(
            "Dropped client {} ('{}') after socket error",
            handle,
            record.nickname()
        ),
        None => debug!("Error flag on unregistered handle {}", handle),
    }
}

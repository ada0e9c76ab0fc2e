//! Broadcast/unicast dispatcher
//!
//! Fan-out over registry snapshots. The recipient list is copied under the
//! registry lock; the writes happen after it is released. A recipient whose
//! socket would block is skipped for this message; any other send failure
//! aborts the rest of the fan-out.

use std::io::{self, Write};

use mio::net::TcpStream;
use tracing::debug;

use crate::error::{is_interrupted, is_would_block, AppError};
use crate::message::ServerMessage;
use crate::registry::{ClientRegistry, Recipient};
use crate::types::ClientHandle;

/// Per-call delivery counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Recipients dropped because their socket would block
    pub skipped: usize,
}

/// Result of writing to a single recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    WouldBlock,
}

/// Sends notices to registered clients
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// Send to every registered client except `sender`
    pub fn broadcast_except(
        &self,
        sender: ClientHandle,
        message: &ServerMessage,
    ) -> Result<Delivery, AppError> {
        let recipients = self.registry.recipients_except(sender);
        deliver(&recipients, &message.to_string())
    }

    /// Send to exactly one client; unknown handles receive nothing
    pub fn unicast(
        &self,
        handle: ClientHandle,
        message: &ServerMessage,
    ) -> Result<Delivery, AppError> {
        let recipients: Vec<Recipient> = self.registry.recipient(handle).into_iter().collect();
        deliver(&recipients, &message.to_string())
    }

    /// Send to every client whose nickname equals `nickname`
    pub fn send_to_nickname(
        &self,
        nickname: &str,
        message: &ServerMessage,
    ) -> Result<Delivery, AppError> {
        let recipients = self.registry.recipients_named(nickname);
        deliver(&recipients, &message.to_string())
    }
}

/// Write `text` to each recipient in turn
pub fn deliver(recipients: &[Recipient], text: &str) -> Result<Delivery, AppError> {
    let mut delivery = Delivery::default();
    for recipient in recipients {
        match send_to(recipient, text.as_bytes())? {
            SendOutcome::Sent => delivery.delivered += 1,
            SendOutcome::WouldBlock => delivery.skipped += 1,
        }
    }
    debug!(
        delivered = delivery.delivered,
        skipped = delivery.skipped,
        "Fan-out complete"
    );
    Ok(delivery)
}

/// Write the whole buffer to one recipient
///
/// Undelivered bytes are dropped when the socket would block.
pub fn send_to(recipient: &Recipient, bytes: &[u8]) -> Result<SendOutcome, AppError> {
    let mut stream: &TcpStream = &recipient.stream;
    let mut written = 0;

    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => {
                return Err(AppError::Send {
                    handle: recipient.handle,
                    source: io::Error::from(io::ErrorKind::WriteZero),
                })
            }
            Ok(n) => written += n,
            Err(e) if is_interrupted(&e) => continue,
            Err(e) if is_would_block(&e) => {
                debug!(
                    handle = %recipient.handle,
                    dropped = bytes.len() - written,
                    "Send would block, skipping recipient"
                );
                return Ok(SendOutcome::WouldBlock);
            }
            Err(source) => {
                return Err(AppError::Send {
                    handle: recipient.handle,
                    source,
                })
            }
        }
    }

    Ok(SendOutcome::Sent)
}

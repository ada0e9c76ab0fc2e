//! Client record definition
//!
//! Represents one accepted connection: its address, nickname state,
//! join time and the shared socket used for delivery.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use mio::net::TcpStream;

use crate::types::ClientHandle;

/// `ctime`-style rendering used in the user listing
const JOIN_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Connected client information
///
/// Owned exclusively by the `ClientRegistry`. Everything except the
/// nickname is fixed at acceptance.
#[derive(Debug)]
pub struct ClientRecord {
    pub handle: ClientHandle,
    /// Numeric peer address
    pub host: String,
    pub port: String,
    /// Nickname (None until the handshake payload arrives)
    pub nickname: Option<String>,
    pub joined_at: DateTime<Local>,
    stream: Arc<TcpStream>,
}

/// Copy of the listing columns for one client, taken under the registry lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSummary {
    pub host: String,
    pub port: String,
    pub joined_at: String,
    pub nickname: String,
}

impl ClientRecord {
    /// Create a record for a freshly accepted connection
    pub fn new(handle: ClientHandle, peer: SocketAddr, stream: Arc<TcpStream>) -> Self {
        Self {
            handle,
            host: peer.ip().to_string(),
            port: peer.port().to_string(),
            nickname: None,
            joined_at: Local::now(),
            stream,
        }
    }

    /// Nickname for notices; empty before the handshake
    pub fn nickname(&self) -> &str {
        self.nickname.as_deref().unwrap_or_default()
    }

    pub fn is_nickname_set(&self) -> bool {
        self.nickname.is_some()
    }

    /// Complete the handshake
    ///
    /// Returns false (and leaves the record untouched) if a nickname is
    /// already set.
    pub fn set_nickname(&mut self, nickname: String) -> bool {
        if self.nickname.is_some() {
            return false;
        }
        self.nickname = Some(nickname);
        true
    }

    pub fn stream(&self) -> &Arc<TcpStream> {
        &self.stream
    }

    pub fn joined_at_display(&self) -> String {
        self.joined_at.format(JOIN_TIME_FORMAT).to_string()
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            host: self.host.clone(),
            port: self.port.clone(),
            joined_at: self.joined_at_display(),
            nickname: self.nickname().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connected_pair;

    #[test]
    fn test_record_creation() {
        let (stream, peer) = connected_pair();
        let addr = peer.local_addr().unwrap();
        let record = ClientRecord::new(ClientHandle(1), addr, Arc::new(stream));

        assert_eq!(record.host, "127.0.0.1");
        assert_eq!(record.port, addr.port().to_string());
        assert!(!record.is_nickname_set());
        assert_eq!(record.nickname(), "");
    }

    #[test]
    fn test_nickname_set_once() {
        let (stream, peer) = connected_pair();
        let mut record =
            ClientRecord::new(ClientHandle(1), peer.local_addr().unwrap(), Arc::new(stream));

        assert!(record.set_nickname("alice".to_string()));
        assert!(!record.set_nickname("mallory".to_string()));

        assert!(record.is_nickname_set());
        assert_eq!(record.nickname(), "alice");
        assert_eq!(record.summary().nickname, "alice");
    }

    #[test]
    fn test_join_time_is_ctime_style() {
        let (stream, peer) = connected_pair();
        let record =
            ClientRecord::new(ClientHandle(1), peer.local_addr().unwrap(), Arc::new(stream));

        // e.g. "Mon Oct 19 10:00:00 2026"
        let rendered = record.joined_at_display();
        assert_eq!(rendered.split_whitespace().count(), 5);
        assert_eq!(rendered.matches(':').count(), 2);
    }
}

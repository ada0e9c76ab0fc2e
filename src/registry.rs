//! Client registry
//!
//! The single owner of every `ClientRecord`, keyed by handle behind one
//! coarse mutex. Callers never see the map itself: they get atomic
//! keyed operations, copied snapshots, or a closure run under the lock.
//! Socket I/O always happens on snapshots, after the lock is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mio::net::TcpStream;
use tracing::debug;

use crate::client::{ClientRecord, ClientSummary};
use crate::types::ClientHandle;

/// A delivery target copied out of the registry
#[derive(Debug, Clone)]
pub struct Recipient {
    pub handle: ClientHandle,
    pub stream: Arc<TcpStream>,
}

/// Outcome of a handshake attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The nickname was stored by this call
    Completed,
    /// The client already has a nickname; the payload is a message
    AlreadySet,
    /// The handle is not (or no longer) registered
    Unknown,
}

/// Handle → ClientRecord map shared by all workers
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientHandle, ClientRecord>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking worker cannot leave the map half-mutated, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<ClientHandle, ClientRecord>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new client
    ///
    /// Returns false without replacing anything if the handle is taken.
    pub fn insert(&self, record: ClientRecord) -> bool {
        let mut clients = self.lock();
        if clients.contains_key(&record.handle) {
            return false;
        }
        clients.insert(record.handle, record);
        debug!("Total clients: {}", clients.len());
        true
    }

    /// Remove a client, handing its record back to the caller
    pub fn remove(&self, handle: ClientHandle) -> Option<ClientRecord> {
        let mut clients = self.lock();
        let record = clients.remove(&handle);
        debug!("Total clients: {}", clients.len());
        record
    }

    pub fn contains(&self, handle: ClientHandle) -> bool {
        self.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current nickname of a client, empty before its handshake
    pub fn nickname(&self, handle: ClientHandle) -> Option<String> {
        self.lock().get(&handle).map(|c| c.nickname().to_string())
    }

    /// Atomically perform the one-time nickname transition
    pub fn complete_handshake(&self, handle: ClientHandle, nickname: &str) -> Handshake {
        let mut clients = self.lock();
        let Some(client) = clients.get_mut(&handle) else {
            return Handshake::Unknown;
        };
        if client.set_nickname(nickname.to_string()) {
            Handshake::Completed
        } else {
            Handshake::AlreadySet
        }
    }

    /// Delivery target for one handle
    pub fn recipient(&self, handle: ClientHandle) -> Option<Recipient> {
        self.lock().get(&handle).map(to_recipient)
    }

    /// Every registered client except `sender`
    pub fn recipients_except(&self, sender: ClientHandle) -> Vec<Recipient> {
        self.lock()
            .values()
            .filter(|c| c.handle != sender)
            .map(to_recipient)
            .collect()
    }

    /// Every client whose nickname equals `nickname` exactly
    pub fn recipients_named(&self, nickname: &str) -> Vec<Recipient> {
        self.lock()
            .values()
            .filter(|c| c.nickname.as_deref() == Some(nickname))
            .map(to_recipient)
            .collect()
    }

    /// Listing rows for every registered client, ordered by handle
    pub fn summaries(&self) -> Vec<ClientSummary> {
        let clients = self.lock();
        let mut records: Vec<&ClientRecord> = clients.values().collect();
        records.sort_by_key(|c| c.handle);
        records.into_iter().map(ClientRecord::summary).collect()
    }

    /// Run `f` over the records with the lock held
    ///
    /// `f` must not perform socket I/O or call back into the registry.
    pub fn with_clients<R>(&self, f: impl FnOnce(&HashMap<ClientHandle, ClientRecord>) -> R) -> R {
        f(&self.lock())
    }
}

fn to_recipient(record: &ClientRecord) -> Recipient {
    Recipient {
        handle: record.handle,
        stream: Arc::clone(record.stream()),
    }
}

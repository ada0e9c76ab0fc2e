//! Readiness multiplexer
//!
//! Wraps a `mio::Poll` (epoll on Linux, edge-triggered) shared by every
//! worker. The poll instance and its event buffer live behind the dispatch
//! lock, so only one worker at a time blocks in `wait`; registration goes
//! through a cloned `mio::Registry` and never touches that lock.

use std::io;
use std::os::fd::RawFd;
use std::sync::{Mutex, PoisonError};

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry};
use tracing::trace;

use crate::error::is_interrupted;
use crate::types::ClientHandle;

/// One ready handle reported by `Multiplexer::wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub handle: ClientHandle,
    pub readable: bool,
    pub error: bool,
    pub read_closed: bool,
}

impl Readiness {
    /// Error or hangup without anything left to read
    pub fn is_failure(&self) -> bool {
        self.error || !self.readable
    }
}

#[derive(Debug)]
struct Dispatch {
    poll: Poll,
    events: Events,
}

/// Shared readiness-notification facility
#[derive(Debug)]
pub struct Multiplexer {
    dispatch: Mutex<Dispatch>,
    registry: Registry,
}

impl Multiplexer {
    /// Create a multiplexer reporting up to `capacity` handles per wait
    pub fn new(capacity: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        Ok(Self {
            dispatch: Mutex::new(Dispatch {
                poll,
                events: Events::with_capacity(capacity),
            }),
            registry,
        })
    }

    /// Arm an owned event source (the listener) for read readiness
    pub fn register<S: Source + ?Sized>(
        &self,
        source: &mut S,
        handle: ClientHandle,
    ) -> io::Result<()> {
        self.registry
            .register(source, handle.into(), Interest::READABLE)
    }

    /// Arm a raw descriptor for read readiness
    ///
    /// Used for client sockets, which are shared through `Arc` and so
    /// cannot be borrowed mutably.
    pub fn register_fd(&self, fd: RawFd, handle: ClientHandle) -> io::Result<()> {
        self.registry
            .register(&mut SourceFd(&fd), handle.into(), Interest::READABLE)
    }

    /// Disarm a raw descriptor before it is closed
    pub fn deregister_fd(&self, fd: RawFd) -> io::Result<()> {
        self.registry.deregister(&mut SourceFd(&fd))
    }

    /// Block until at least one handle is ready
    ///
    /// Holds the dispatch lock for the duration of the wait only; the
    /// ready set is copied out so the caller processes it unlocked.
    /// Interrupted waits are retried.
    pub fn wait(&self) -> io::Result<Vec<Readiness>> {
        let mut guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let Dispatch { poll, events } = &mut *guard;

        loop {
            match poll.poll(events, None) {
                Ok(()) => break,
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => return Err(e),
            }
        }

        let ready: Vec<Readiness> = events
            .iter()
            .map(|event| Readiness {
                handle: event.token().into(),
                readable: event.is_readable(),
                error: event.is_error(),
                read_closed: event.is_read_closed(),
            })
            .collect();
        trace!(count = ready.len(), "Multiplexer wait returned");
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connected_pair;
    use std::io::Write;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_readable_after_write() {
        let mux = Multiplexer::new(16).unwrap();
        let (stream, mut peer) = connected_pair();
        mux.register_fd(stream.as_raw_fd(), ClientHandle(5)).unwrap();

        peer.write_all(b"ping").unwrap();

        let ready = mux.wait().unwrap();
        let event = ready
            .iter()
            .find(|r| r.handle == ClientHandle(5))
            .expect("handle should be ready");
        assert!(event.readable);
        assert!(!event.is_failure());
    }

    #[test]
    fn test_deregister() {
        let mux = Multiplexer::new(16).unwrap();
        let (stream, _peer) = connected_pair();
        mux.register_fd(stream.as_raw_fd(), ClientHandle(1)).unwrap();
        mux.deregister_fd(stream.as_raw_fd()).unwrap();
        assert!(mux.deregister_fd(stream.as_raw_fd()).is_err());
    }

    #[test]
    fn test_failure_flags() {
        let hangup = Readiness {
            handle: ClientHandle(1),
            readable: false,
            error: false,
            read_closed: true,
        };
        assert!(hangup.is_failure());

        let eof = Readiness {
            readable: true,
            ..hangup
        };
        assert!(!eof.is_failure());
    }
}

//! Server context and worker pool
//!
//! `ServerContext` owns everything the workers share: the listening
//! socket, the multiplexer, the client registry and the handle allocator.
//! `Server` spawns N symmetric workers over one context. Each worker
//! takes the dispatch lock only for the multiplexer wait and processes
//! its ready set unlocked.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use mio::net::TcpListener;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};

use crate::acceptor::accept_pending;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::{drop_failed, handle_readable};
use crate::poller::{Multiplexer, Readiness};
use crate::registry::ClientRegistry;
use crate::types::{ClientHandle, HandleAllocator};

/// State shared by every worker thread
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub listener: TcpListener,
    pub multiplexer: Multiplexer,
    pub registry: ClientRegistry,
    handles: HandleAllocator,
}

impl ServerContext {
    /// Resolve, bind, listen and arm the listener
    ///
    /// Every failure here is a fatal setup error.
    pub fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let addr_str = config.bind_addr();
        let addr = resolve_ipv4(&addr_str)?;

        let socket = bind_socket(addr).map_err(|source| AppError::Bind {
            addr: addr_str.clone(),
            source,
        })?;
        socket.listen(config.backlog).map_err(AppError::Listen)?;
        let mut listener = TcpListener::from_std(socket.into());

        let multiplexer = Multiplexer::new(config.capacity).map_err(AppError::Multiplexer)?;
        multiplexer
            .register(&mut listener, ClientHandle::LISTENER)
            .map_err(AppError::Multiplexer)?;

        Ok(Self {
            config,
            listener,
            multiplexer,
            registry: ClientRegistry::new(),
            handles: HandleAllocator::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub(crate) fn next_handle(&self) -> ClientHandle {
        self.handles.next()
    }
}

fn resolve_ipv4(addr: &str) -> Result<SocketAddr, AppError> {
    let resolve_err = |source: io::Error| AppError::Resolve {
        addr: addr.to_string(),
        source,
    };
    addr.to_socket_addrs()
        .map_err(resolve_err)?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            resolve_err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no IPv4 address",
            ))
        })
}

/// Non-blocking, address-reusing TCP socket bound to `addr`
fn bind_socket(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket)
}

/// Multi-threaded broadcast chat server
///
/// Dropping the server (once every worker handle is gone) closes the
/// listener and the multiplexer.
#[derive(Debug)]
pub struct Server {
    ctx: Arc<ServerContext>,
}

impl Server {
    /// Bind on all local IPv4 addresses at `port` with `workers` threads
    pub fn new(port: &str, workers: usize) -> Result<Self, AppError> {
        Self::bind(ServerConfig::new(port, workers))
    }

    pub fn bind(config: ServerConfig) -> Result<Self, AppError> {
        Ok(Self {
            ctx: Arc::new(ServerContext::bind(config)?),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.ctx.local_addr()
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Spawn the worker pool and block until every worker exits
    ///
    /// Workers only exit on a multiplexer wait failure, so in normal
    /// operation this never returns.
    pub fn start(&self) -> Result<(), AppError> {
        let count = self.ctx.config.workers;
        let mut workers = Vec::with_capacity(count);

        for index in 0..count {
            let name = worker_name(index);
            let ctx = Arc::clone(&self.ctx);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(ctx))
                .map_err(|source| AppError::Spawn { name, source })?;
            workers.push(handle);
        }

        match self.local_addr() {
            Ok(addr) => info!("Server listening on {} with {} workers", addr, count),
            Err(_) => info!("Server listening on port {}", self.ctx.config.port),
        }

        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!("{} panicked", name);
            }
        }

        warn!("All workers exited");
        Ok(())
    }
}

/// `worker-A`, `worker-B`, ... then numbered past `Z`
fn worker_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("worker-{}", char::from(b'A' + i)),
        _ => format!("worker-{}", index),
    }
}

/// Worker loop: wait under the dispatch lock, then handle the ready set
pub fn run_worker(ctx: Arc<ServerContext>) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    info!("{} started", name);

    loop {
        let ready = match ctx.multiplexer.wait() {
            Ok(ready) => ready,
            Err(e) => {
                error!("{} stopping: {}", name, AppError::Wait(e));
                break;
            }
        };
        debug!("{} woke with {} ready handles", name, ready.len());

        for event in ready {
            handle_event(&ctx, event);
        }
    }
}

/// Route one ready handle to the acceptor or the protocol engine
pub fn handle_event(ctx: &ServerContext, event: Readiness) {
    if event.handle.is_listener() {
        if event.is_failure() {
            error!("Error condition on listening socket");
            return;
        }
        if let Err(e) = accept_pending(ctx) {
            error!("Accept round aborted: {}", e);
        }
        return;
    }

    if event.is_failure() {
        drop_failed(ctx, event.handle);
        return;
    }

    // A half-closed peer may still have unread data; the read path drains
    // it and runs the leave sequence on EOF.
    if event.read_closed {
        debug!("Client {} closing its side", event.handle);
    }

    if let Err(e) = handle_readable(ctx, event.handle) {
        warn!("Client {}: {}", event.handle, e);
    }
}

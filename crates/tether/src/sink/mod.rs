mod cycle;
mod indexed;
mod memory;

pub use cycle::{CycleSink, CycleTailer};
pub use indexed::{IndexedSink, IndexedTailer};
pub use memory::{MemoryExcerpt, MemorySink, MemoryTailer};

use std::{
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tether_wire as wire;

use crate::{config::SinkConfig, connector::SinkConnector, error::SinkError};

/// Header reads include eight bytes of look-ahead.
pub(crate) const HEADER_READ: usize = wire::HEADER_SIZE + 8;

/// Close signal for one consumer handle.
///
/// Tripping it stops future opens and shuts down the parked socket clone, so
/// an in-flight blocking read on the handle's thread surfaces as EOF.
pub(crate) struct Shutoff {
    closed: AtomicBool,
    parked: Mutex<Option<TcpStream>>,
}

impl Shutoff {
    fn new() -> Arc<Self> {
        Arc::new(Self { closed: AtomicBool::new(false), parked: Mutex::new(None) })
    }

    #[inline]
    pub fn is_tripped(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn trip(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(sock) = self.parked.lock().expect("shutoff lock").take() {
            let _ = sock.shutdown(Shutdown::Both);
        }
    }

    pub fn park(&self, sock: &TcpStream) {
        *self.parked.lock().expect("shutoff lock") = sock.try_clone().ok();
    }

    pub fn unpark(&self) {
        self.parked.lock().expect("shutoff lock").take();
    }
}

/// State shared between a sink and its handles: the sink-level closed flag
/// and the registry of live handle shutoffs.
pub(crate) struct Core {
    addr: SocketAddr,
    config: SinkConfig,
    closed: AtomicBool,
    handles: Mutex<Vec<Arc<Shutoff>>>,
}

impl Core {
    pub fn new(addr: SocketAddr, config: SinkConfig) -> Arc<Self> {
        Arc::new(Self {
            addr,
            config,
            closed: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[inline]
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registers a new handle. `exclusive` enforces the persistent-mode
    /// single-handle rule.
    pub fn register(&self, exclusive: bool) -> Result<Arc<Shutoff>, SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let mut handles = self.handles.lock().expect("registry lock");
        if exclusive && !handles.is_empty() {
            return Err(SinkError::HandleInUse);
        }
        let shutoff = Shutoff::new();
        handles.push(Arc::clone(&shutoff));
        Ok(shutoff)
    }

    pub fn deregister(&self, shutoff: &Arc<Shutoff>) {
        self.handles.lock().expect("registry lock").retain(|s| !Arc::ptr_eq(s, shutoff));
    }

    /// First close wins: trips every registered handle and empties the
    /// registry. Reports whether this call was the one that closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut handles = self.handles.lock().expect("registry lock");
        for shutoff in handles.drain(..) {
            shutoff.trip();
        }
        true
    }
}

pub(crate) enum Session {
    Ready,
    /// The resume request didn't go out; the connection was dropped.
    Lost,
    Closed,
}

/// Opens the connection if needed and replays the resume request after every
/// reconnect. `resume_from` is the last index the consumer durably has.
pub(crate) fn ensure_open(conn: &mut SinkConnector, resume_from: i64) -> Session {
    if conn.is_closed() {
        return Session::Closed;
    }
    if conn.is_open() {
        return Session::Ready;
    }
    if !conn.open() {
        return Session::Closed;
    }
    if !conn.write(&wire::encode_resume(resume_from)) {
        conn.drop_conn();
        return Session::Lost;
    }
    Session::Ready
}

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    sync::Arc,
    thread,
};

use tracing::{debug, warn};

use crate::{buffer::RecvBuffer, config::SinkConfig, sink::Shutoff};

/// Blocking TCP leg of one consumer handle.
///
/// Owns the socket and the receive buffer. Opens lazily, reconnects on the
/// next use after any failure, and streams payloads to callers straight out
/// of the buffer. Exactly one handle drives a connector; the only outside
/// touch is the [`Shutoff`], through which a closing sink shuts down the
/// socket under a blocked read.
pub(crate) struct SinkConnector {
    addr: SocketAddr,
    config: SinkConfig,
    shutoff: Arc<Shutoff>,
    sock: Option<TcpStream>,
    buf: RecvBuffer,
}

impl SinkConnector {
    pub fn new(addr: SocketAddr, config: SinkConfig, shutoff: Arc<Shutoff>) -> Self {
        let buf = RecvBuffer::with_capacity(config.min_buffer_size());
        Self { addr, config, shutoff, sock: None, buf }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.sock.is_some()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shutoff.is_tripped()
    }

    /// Blocks until connected or closed. Sleeps `reconnect_delay` after every
    /// failed attempt, re-checking the shutoff each round. The buffer is
    /// empty on a true return.
    pub fn open(&mut self) -> bool {
        while !self.shutoff.is_tripped() {
            match TcpStream::connect(self.addr) {
                Ok(sock) => {
                    if let Err(err) = sock.set_nodelay(true) {
                        debug!(?err, "set_nodelay");
                    }
                    set_recv_buf_size(&sock, self.config.min_buffer_size());
                    self.shutoff.park(&sock);
                    // a close may have raced the connect; its trip saw no
                    // parked socket, so re-check before committing
                    if self.shutoff.is_tripped() {
                        self.shutoff.unpark();
                        return false;
                    }
                    self.buf.reset();
                    self.sock = Some(sock);
                    debug!(addr = ?self.addr, "connected");
                    return true;
                }
                Err(err) => {
                    warn!(addr = ?self.addr, %err, "couldn't connect, retrying");
                    thread::sleep(self.config.reconnect_delay());
                }
            }
        }
        false
    }

    /// Sends all of `bytes`; partial writes are retried inside. On a false
    /// return the caller tears the connection down and reconnects.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        let Some(sock) = &mut self.sock else { return false };
        match sock.write_all(bytes) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "tcp write failed");
                false
            }
        }
    }

    /// Ensures bytes are buffered: returns immediately when `threshold` are,
    /// otherwise compacts and pulls from the socket until `min` are. EOF or
    /// an I/O failure drops the connection and reports false.
    pub fn fill(&mut self, threshold: usize, min: usize) -> bool {
        debug_assert!(threshold <= min);
        if self.buf.remaining() >= threshold {
            return true;
        }
        self.buf.compact();
        self.buf.ensure_capacity(min);
        while self.buf.remaining() < min {
            if !self.read_into_buf() {
                return false;
            }
        }
        true
    }

    /// One blocking socket read appended behind the buffered bytes.
    pub fn pull(&mut self) -> bool {
        self.buf.compact();
        if self.buf.spare_len() == 0 {
            self.buf.ensure_capacity(self.buf.capacity() * 2);
        }
        self.read_into_buf()
    }

    /// Consumes and discards `len` payload bytes, pulling as needed.
    pub fn skip(&mut self, len: usize) -> bool {
        let mut left = len;
        while left > 0 {
            if self.buf.is_empty() && !self.pull() {
                return false;
            }
            let take = self.buf.remaining().min(left);
            self.buf.consume(take);
            left -= take;
        }
        true
    }

    fn read_into_buf(&mut self) -> bool {
        let Some(sock) = &mut self.sock else { return false };
        match sock.read(self.buf.spare()) {
            Ok(0) => {
                debug!("source closed the connection");
                self.drop_conn();
                false
            }
            Ok(n) => {
                self.buf.advance_limit(n);
                true
            }
            Err(err) => {
                debug!(%err, "tcp read failed");
                self.drop_conn();
                false
            }
        }
    }

    #[inline]
    pub fn buffered(&self) -> &[u8] {
        self.buf.buffered()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.buf.consume(n);
    }

    /// Idempotent; drops the socket and its parked clone.
    pub fn drop_conn(&mut self) {
        if let Some(sock) = self.sock.take() {
            let _ = sock.shutdown(std::net::Shutdown::Both);
        }
        self.shutoff.unpark();
    }
}

/// SO_RCVBUF hint; the kernel is free to round it.
fn set_recv_buf_size(sock: &TcpStream, size: usize) {
    use std::os::fd::AsRawFd;
    let fd = sock.as_raw_fd();
    let size = size as libc::c_int;
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

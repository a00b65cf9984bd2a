use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use tether_wire::{self as wire, FrameHeader, FrameKind, HEADER_SIZE};

use crate::{
    config::SinkConfig,
    connector::SinkConnector,
    error::SinkError,
    sink::{Core, HEADER_READ, Shutoff},
};

/// Replication consumer without local persistence: records are exposed
/// straight out of the receive buffer and forgotten on `finish`.
pub struct MemorySink {
    core: Arc<Core>,
}

impl MemorySink {
    pub fn new(addr: SocketAddr, config: SinkConfig) -> Self {
        Self { core: Core::new(addr, config) }
    }

    /// Sequential handle. Every call creates one new independent handle with
    /// its own connection.
    pub fn create_tailer(&self) -> Result<MemoryTailer, SinkError> {
        let shutoff = self.core.register(false)?;
        let conn =
            SinkConnector::new(self.core.addr(), self.core.config().clone(), Arc::clone(&shutoff));
        Ok(MemoryTailer {
            core: Arc::clone(&self.core),
            conn,
            shutoff,
            index: wire::FROM_START,
            last_size: 0,
            finished: true,
        })
    }

    /// Positional handle. Search and ordering helpers do not exist in
    /// memory mode.
    pub fn create_excerpt(&self) -> Result<MemoryExcerpt, SinkError> {
        Ok(MemoryExcerpt { inner: self.create_tailer()? })
    }

    /// A sink replicates; it never accepts local appends.
    pub fn create_appender(&self) -> Result<Infallible, SinkError> {
        Err(SinkError::AppendUnsupported)
    }

    /// No journal behind a memory sink.
    pub fn size(&self) -> u64 {
        0
    }

    pub fn last_written_index(&self) -> i64 {
        -1
    }

    /// No-op; nothing is persisted.
    pub fn clear(&self) {}

    /// Idempotent; closes every live handle.
    pub fn close(&self) {
        self.core.close();
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sequential consumer over the live replication stream.
///
/// `next_index` parks the read cursor on a record; `payload` borrows its
/// bytes out of the receive buffer; `finish` releases them. The borrow means
/// the buffer cannot be refilled or compacted under an open view.
pub struct MemoryTailer {
    core: Arc<Core>,
    conn: SinkConnector,
    shutoff: Arc<Shutoff>,
    /// Index of the record the cursor is on; `FROM_START` before the first.
    index: i64,
    last_size: usize,
    finished: bool,
}

impl MemoryTailer {
    /// Repositions at the beginning of the stream.
    pub fn to_start(&mut self) -> Result<bool, SinkError> {
        self.seek(wire::FROM_START)
    }

    /// Repositions at the source's current frontier.
    pub fn to_end(&mut self) -> Result<bool, SinkError> {
        self.seek(wire::FROM_END)
    }

    /// Repositions the stream: opens if needed, sends the resume request and
    /// waits for the source's acknowledgement. Ok(false) covers transient
    /// socket loss and source refusal alike; corruption escapes as an error.
    ///
    /// For `target >= 0` success means the source confirmed `target` and the
    /// record after it is loaded; for [`FROM_END`](wire::FROM_END), that the
    /// first record past the frontier is loaded.
    pub fn seek(&mut self, target: i64) -> Result<bool, SinkError> {
        self.finish();
        if self.shutoff.is_tripped() {
            return Ok(false);
        }
        if !self.conn.is_open() && !self.conn.open() {
            return Ok(false);
        }
        if !self.conn.write(&wire::encode_resume(target)) {
            self.conn.drop_conn();
            return Ok(false);
        }
        loop {
            if !self.conn.fill(HEADER_SIZE, HEADER_READ) {
                return Ok(false);
            }
            let header = FrameHeader::decode(self.conn.buffered());
            self.conn.consume(HEADER_SIZE);
            match header.kind() {
                // a control frame other than the ack aborts positioning
                FrameKind::Heartbeat | FrameKind::Padding => return Ok(false),
                FrameKind::Corrupt => return Err(SinkError::PayloadSize(header.size)),
                FrameKind::Data(len) => {
                    // stale records still in flight from before the request
                    if !self.conn.skip(len) {
                        return Ok(false);
                    }
                }
                FrameKind::SyncAck => {
                    return match target {
                        wire::FROM_START => {
                            if header.index == wire::FROM_START {
                                self.index = wire::FROM_START;
                                Ok(true)
                            } else {
                                Ok(false)
                            }
                        }
                        wire::FROM_END => {
                            self.index = header.index;
                            self.next_index()
                        }
                        _ => {
                            if header.index == target {
                                self.index = target;
                                self.next_index()
                            } else {
                                Ok(false)
                            }
                        }
                    };
                }
            }
        }
    }

    /// Loads the next record and parks the cursor on its payload. An
    /// unfinished view from the previous record is released first. False for
    /// heartbeats and other control frames; after a lost connection the call
    /// transparently reconnects via [`seek`](Self::seek) at the current
    /// index.
    pub fn next_index(&mut self) -> Result<bool, SinkError> {
        self.finish();
        if self.shutoff.is_tripped() {
            return Ok(false);
        }
        if !self.conn.is_open() {
            return self.seek(self.index);
        }
        if !self.conn.fill(HEADER_SIZE, HEADER_READ) {
            return Ok(false);
        }
        let header = FrameHeader::decode(self.conn.buffered());
        self.conn.consume(HEADER_SIZE);
        match header.kind() {
            FrameKind::Heartbeat | FrameKind::SyncAck | FrameKind::Padding => Ok(false),
            FrameKind::Corrupt => Err(SinkError::PayloadSize(header.size)),
            FrameKind::Data(len) => {
                if self.conn.remaining() < len && !self.conn.fill(len, len) {
                    return Ok(false);
                }
                self.index = header.index;
                self.last_size = len;
                self.finished = false;
                Ok(true)
            }
        }
    }

    /// Payload of the record loaded by the last successful
    /// [`next_index`](Self::next_index); empty once finished.
    pub fn payload(&self) -> &[u8] {
        if self.finished {
            return &[];
        }
        &self.conn.buffered()[..self.last_size]
    }

    /// Releases the current view and advances the read cursor past it.
    pub fn finish(&mut self) {
        if !self.finished {
            self.conn.consume(self.last_size);
            self.finished = true;
        }
    }

    /// Index of the record the cursor is on.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Idempotent; drops the connection and deregisters from the sink.
    pub fn close(&mut self) {
        self.shutoff.trip();
        self.conn.drop_conn();
        self.core.deregister(&self.shutoff);
    }
}

impl Drop for MemoryTailer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Positional variant of [`MemoryTailer`]: the same stream view, reached by
/// exact index. There is nothing to search in memory mode.
pub struct MemoryExcerpt {
    inner: MemoryTailer,
}

impl MemoryExcerpt {
    /// Positions on the record after `index`; see [`MemoryTailer::seek`].
    pub fn seek(&mut self, index: i64) -> Result<bool, SinkError> {
        self.inner.seek(index)
    }

    pub fn to_start(&mut self) -> Result<bool, SinkError> {
        self.inner.to_start()
    }

    pub fn to_end(&mut self) -> Result<bool, SinkError> {
        self.inner.to_end()
    }

    pub fn next_index(&mut self) -> Result<bool, SinkError> {
        self.inner.next_index()
    }

    pub fn payload(&self) -> &[u8] {
        self.inner.payload()
    }

    pub fn finish(&mut self) {
        self.inner.finish();
    }

    pub fn index(&self) -> i64 {
        self.inner.index()
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

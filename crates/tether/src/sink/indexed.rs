use std::{io, net::SocketAddr, sync::Arc};

use tether_wire::{FrameHeader, FrameKind, HEADER_SIZE};
use tracing::warn;

use crate::{
    config::SinkConfig,
    connector::SinkConnector,
    error::{Advance, SinkError},
    journal::{IndexedAppender, IndexedJournal},
    sink::{Core, HEADER_READ, Session, Shutoff, ensure_open},
};

/// Replicates a source into a local indexed journal.
///
/// Does not connect on construction; the first `advance` on a handle opens
/// the session lazily and resumes from the journal frontier.
pub struct IndexedSink<J: IndexedJournal> {
    core: Arc<Core>,
    journal: Arc<J>,
}

impl<J: IndexedJournal> IndexedSink<J> {
    pub fn new(addr: SocketAddr, journal: J, config: SinkConfig) -> Self {
        Self { core: Core::new(addr, config), journal: Arc::new(journal) }
    }

    /// Sequential pump handle. A persistent sink allows one live handle.
    pub fn create_tailer(&self) -> Result<IndexedTailer<J>, SinkError> {
        let shutoff = self.core.register(true)?;
        let conn =
            SinkConnector::new(self.core.addr(), self.core.config().clone(), Arc::clone(&shutoff));
        Ok(IndexedTailer {
            core: Arc::clone(&self.core),
            journal: Arc::clone(&self.journal),
            appender: self.journal.create_appender(),
            conn,
            shutoff,
        })
    }

    /// Same pump shape as [`create_tailer`](Self::create_tailer); there is
    /// no random access over a replication stream. Counts against the
    /// single-handle rule.
    pub fn create_excerpt(&self) -> Result<IndexedTailer<J>, SinkError> {
        self.create_tailer()
    }

    /// A sink replicates; it never accepts local appends.
    pub fn create_appender(&self) -> Result<J::Appender, SinkError> {
        Err(SinkError::AppendUnsupported)
    }

    pub fn size(&self) -> u64 {
        self.journal.size()
    }

    pub fn last_written_index(&self) -> i64 {
        self.journal.last_written_index()
    }

    pub fn clear(&self) -> io::Result<()> {
        self.journal.clear()
    }

    /// Idempotent. Closes every live handle, then the journal; journal close
    /// failures are logged, not propagated.
    pub fn close(&self) {
        if self.core.close() {
            if let Err(err) = self.journal.close() {
                warn!(%err, "journal close failed");
            }
        }
    }
}

impl<J: IndexedJournal> Drop for IndexedSink<J> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pump handle of an [`IndexedSink`]: each `advance` applies at most one
/// record (or padding entry) to the journal.
pub struct IndexedTailer<J: IndexedJournal> {
    core: Arc<Core>,
    journal: Arc<J>,
    appender: J::Appender,
    conn: SinkConnector,
    shutoff: Arc<Shutoff>,
}

impl<J: IndexedJournal> IndexedTailer<J> {
    /// Pulls frames until a record lands in the journal or a terminal
    /// condition is hit. Transient socket failures surface as
    /// [`Advance::Reconnect`]; the next call reconnects and resumes from
    /// `last_written_index`. Corruption is fatal and escapes as an error.
    pub fn advance(&mut self) -> Result<Advance, SinkError> {
        loop {
            match ensure_open(&mut self.conn, self.journal.last_written_index()) {
                Session::Closed => return Ok(Advance::Closed),
                Session::Lost => return Ok(Advance::Reconnect),
                Session::Ready => {}
            }
            if !self.conn.fill(HEADER_SIZE, HEADER_READ) {
                return Ok(Advance::Reconnect);
            }
            let header = FrameHeader::decode(self.conn.buffered());
            self.conn.consume(HEADER_SIZE);
            match header.kind() {
                FrameKind::Heartbeat => return Ok(Advance::Idle),
                FrameKind::SyncAck => {}
                FrameKind::Padding => {
                    self.appender.start_padding(self.journal.data_block_size() as usize - 1)?;
                    return Ok(Advance::Applied);
                }
                FrameKind::Corrupt => return Err(SinkError::PayloadSize(header.size)),
                FrameKind::Data(len) => {
                    let expected = self.journal.size() as i64;
                    if header.index != expected {
                        return Err(SinkError::IndexMismatch {
                            expected,
                            received: header.index,
                        });
                    }
                    if !self.apply(len)? {
                        self.conn.drop_conn();
                        return Ok(Advance::Reconnect);
                    }
                    return Ok(Advance::Applied);
                }
            }
        }
    }

    /// Streams one record body into the appender. Ok(false) when the
    /// connection died mid-record; the unfinished excerpt is abandoned by
    /// the next `start_excerpt`.
    fn apply(&mut self, len: usize) -> Result<bool, SinkError> {
        self.appender.start_excerpt(len)?;
        let mut left = len;
        while left > 0 {
            if self.conn.remaining() == 0 && !self.conn.pull() {
                return Ok(false);
            }
            let chunk = self.conn.buffered();
            let take = chunk.len().min(left);
            self.appender.write(&chunk[..take])?;
            self.conn.consume(take);
            left -= take;
        }
        self.appender.finish()?;
        Ok(true)
    }

    /// Idempotent; drops the connection and deregisters from the sink.
    pub fn close(&mut self) {
        self.shutoff.trip();
        self.conn.drop_conn();
        self.core.deregister(&self.shutoff);
    }
}

impl<J: IndexedJournal> Drop for IndexedTailer<J> {
    fn drop(&mut self) {
        self.close();
    }
}

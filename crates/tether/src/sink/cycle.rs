use std::{io, net::SocketAddr, sync::Arc};

use tether_wire::{FrameHeader, FrameKind, HEADER_SIZE};
use tracing::warn;

use crate::{
    config::SinkConfig,
    connector::SinkConnector,
    error::{Advance, SinkError},
    journal::{CycleAppender, CycleJournal},
    sink::{Core, HEADER_READ, Session, Shutoff, ensure_open},
};

/// Replicates a source into a local cycle-partitioned journal. The cycle of
/// every record is derived from its index, never from local time.
pub struct CycleSink<J: CycleJournal> {
    core: Arc<Core>,
    journal: Arc<J>,
}

impl<J: CycleJournal> CycleSink<J> {
    pub fn new(addr: SocketAddr, journal: J, config: SinkConfig) -> Self {
        Self { core: Core::new(addr, config), journal: Arc::new(journal) }
    }

    /// Sequential pump handle. A persistent sink allows one live handle.
    pub fn create_tailer(&self) -> Result<CycleTailer<J>, SinkError> {
        let shutoff = self.core.register(true)?;
        let conn =
            SinkConnector::new(self.core.addr(), self.core.config().clone(), Arc::clone(&shutoff));
        Ok(CycleTailer {
            core: Arc::clone(&self.core),
            journal: Arc::clone(&self.journal),
            appender: self.journal.create_appender(),
            last_local_index: self.journal.last_index(),
            conn,
            shutoff,
        })
    }

    /// Same pump shape as [`create_tailer`](Self::create_tailer); counts
    /// against the single-handle rule.
    pub fn create_excerpt(&self) -> Result<CycleTailer<J>, SinkError> {
        self.create_tailer()
    }

    /// A sink replicates; it never accepts local appends.
    pub fn create_appender(&self) -> Result<J::Appender, SinkError> {
        Err(SinkError::AppendUnsupported)
    }

    pub fn last_written_index(&self) -> i64 {
        self.journal.last_index()
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

impl<J: CycleJournal> Drop for CycleSink<J> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pump handle of a [`CycleSink`].
pub struct CycleTailer<J: CycleJournal> {
    core: Arc<Core>,
    journal: Arc<J>,
    appender: J::Appender,
    /// Last index durably applied; the source replays exactly this record
    /// after a resume, and the replay must not be applied twice.
    last_local_index: i64,
    conn: SinkConnector,
    shutoff: Arc<Shutoff>,
}

impl<J: CycleJournal> CycleTailer<J> {
    /// As [`IndexedTailer::advance`](crate::IndexedTailer::advance), with
    /// the cycle derived from each record's index. There is no gap check;
    /// the journal owns within-cycle ordering.
    pub fn advance(&mut self) -> Result<Advance, SinkError> {
        loop {
            if !self.conn.is_open() {
                self.last_local_index = self.journal.last_index();
            }
            match ensure_open(&mut self.conn, self.last_local_index) {
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
                    // only indexed journals pad blocks; see DESIGN.md on the
                    // protocol asymmetry
                    warn!("padding frame on a cycle journal, ignoring");
                    return Ok(Advance::Idle);
                }
                FrameKind::Corrupt => return Err(SinkError::PayloadSize(header.size)),
                FrameKind::Data(len) => {
                    if header.index == self.last_local_index {
                        // resume replay of the record we already hold
                        if !self.conn.skip(len) {
                            return Ok(Advance::Reconnect);
                        }
                        continue;
                    }
                    let cycle = header.index >> self.journal.entries_for_cycle_bits();
                    if !self.apply(len, cycle)? {
                        self.conn.drop_conn();
                        return Ok(Advance::Reconnect);
                    }
                    self.last_local_index = header.index;
                    return Ok(Advance::Applied);
                }
            }
        }
    }

    fn apply(&mut self, len: usize, cycle: i64) -> Result<bool, SinkError> {
        self.appender.start_excerpt(len, cycle)?;
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

impl<J: CycleJournal> Drop for CycleTailer<J> {
    fn drop(&mut self) {
        self.close();
    }
}

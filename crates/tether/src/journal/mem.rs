//! In-memory reference journals. Storage for tests and ephemeral
//! deployments; clones share the same entries.

use std::{
    collections::BTreeMap,
    io,
    sync::{Arc, Mutex},
};

use crate::journal::{CycleAppender, CycleJournal, IndexedAppender, IndexedJournal};

fn no_open_excerpt() -> io::Error {
    io::Error::other("no open excerpt")
}

/// One committed entry of a [`MemIndexedJournal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedEntry {
    Record(Vec<u8>),
    /// Block padding; occupies an index, carries no payload.
    Padding(usize),
}

#[derive(Debug, Clone)]
pub struct MemIndexedJournal {
    entries: Arc<Mutex<Vec<IndexedEntry>>>,
    data_block_size: u32,
}

impl MemIndexedJournal {
    pub fn new(data_block_size: u32) -> Self {
        Self { entries: Arc::default(), data_block_size }
    }

    pub fn entry(&self, index: u64) -> Option<IndexedEntry> {
        self.entries.lock().expect("journal lock").get(index as usize).cloned()
    }

    /// The record at `index`, `None` for padding or out of range.
    pub fn record(&self, index: u64) -> Option<Vec<u8>> {
        match self.entry(index) {
            Some(IndexedEntry::Record(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

impl IndexedJournal for MemIndexedJournal {
    type Appender = MemIndexedAppender;

    fn size(&self) -> u64 {
        self.entries.lock().expect("journal lock").len() as u64
    }

    fn last_written_index(&self) -> i64 {
        self.size() as i64 - 1
    }

    fn data_block_size(&self) -> u32 {
        self.data_block_size
    }

    fn create_appender(&self) -> MemIndexedAppender {
        MemIndexedAppender { entries: Arc::clone(&self.entries), pending: None }
    }

    fn clear(&self) -> io::Result<()> {
        self.entries.lock().expect("journal lock").clear();
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

pub struct MemIndexedAppender {
    entries: Arc<Mutex<Vec<IndexedEntry>>>,
    pending: Option<Vec<u8>>,
}

impl IndexedAppender for MemIndexedAppender {
    fn start_excerpt(&mut self, capacity: usize) -> io::Result<()> {
        // an excerpt left unfinished by a dropped connection dies here
        self.pending = Some(Vec::with_capacity(capacity));
        Ok(())
    }

    fn start_padding(&mut self, capacity: usize) -> io::Result<()> {
        self.pending = None;
        self.entries.lock().expect("journal lock").push(IndexedEntry::Padding(capacity));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let pending = self.pending.as_mut().ok_or_else(no_open_excerpt)?;
        pending.extend_from_slice(bytes);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let record = self.pending.take().ok_or_else(no_open_excerpt)?;
        self.entries.lock().expect("journal lock").push(IndexedEntry::Record(record));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CycleStore {
    cycles: BTreeMap<i64, Vec<Vec<u8>>>,
    last_index: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MemCycleJournal {
    store: Arc<Mutex<CycleStore>>,
    entries_for_cycle_bits: u32,
}

impl MemCycleJournal {
    pub fn new(entries_for_cycle_bits: u32) -> Self {
        Self { store: Arc::default(), entries_for_cycle_bits }
    }

    pub fn cycle_len(&self, cycle: i64) -> usize {
        self.store.lock().expect("journal lock").cycles.get(&cycle).map_or(0, Vec::len)
    }

    pub fn record(&self, index: i64) -> Option<Vec<u8>> {
        let cycle = index >> self.entries_for_cycle_bits;
        let position = (index & ((1 << self.entries_for_cycle_bits) - 1)) as usize;
        self.store
            .lock()
            .expect("journal lock")
            .cycles
            .get(&cycle)
            .and_then(|records| records.get(position))
            .cloned()
    }
}

impl CycleJournal for MemCycleJournal {
    type Appender = MemCycleAppender;

    fn last_index(&self) -> i64 {
        self.store.lock().expect("journal lock").last_index.unwrap_or(-1)
    }

    fn entries_for_cycle_bits(&self) -> u32 {
        self.entries_for_cycle_bits
    }

    fn create_appender(&self) -> MemCycleAppender {
        MemCycleAppender {
            store: Arc::clone(&self.store),
            entries_for_cycle_bits: self.entries_for_cycle_bits,
            pending: None,
        }
    }

    fn clear(&self) -> io::Result<()> {
        let mut store = self.store.lock().expect("journal lock");
        store.cycles.clear();
        store.last_index = None;
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

pub struct MemCycleAppender {
    store: Arc<Mutex<CycleStore>>,
    entries_for_cycle_bits: u32,
    pending: Option<(i64, Vec<u8>)>,
}

impl CycleAppender for MemCycleAppender {
    fn start_excerpt(&mut self, capacity: usize, cycle: i64) -> io::Result<()> {
        self.pending = Some((cycle, Vec::with_capacity(capacity)));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let (_, pending) = self.pending.as_mut().ok_or_else(no_open_excerpt)?;
        pending.extend_from_slice(bytes);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let (cycle, record) = self.pending.take().ok_or_else(no_open_excerpt)?;
        let mut store = self.store.lock().expect("journal lock");
        let records = store.cycles.entry(cycle).or_default();
        let index = (cycle << self.entries_for_cycle_bits) | records.len() as i64;
        records.push(record);
        store.last_index = Some(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_commit_and_abandon() {
        let journal = MemIndexedJournal::new(64);
        let mut appender = journal.create_appender();

        appender.start_excerpt(3).unwrap();
        appender.write(b"ab").unwrap();
        appender.write(b"c").unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.size(), 1);
        assert_eq!(journal.record(0).as_deref(), Some(b"abc".as_slice()));

        // unfinished excerpt is abandoned by the next start
        appender.start_excerpt(8).unwrap();
        appender.write(b"zz").unwrap();
        appender.start_excerpt(1).unwrap();
        appender.write(b"x").unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.size(), 2);
        assert_eq!(journal.record(1).as_deref(), Some(b"x".as_slice()));
    }

    #[test]
    fn indexed_padding_occupies_an_index() {
        let journal = MemIndexedJournal::new(64);
        let mut appender = journal.create_appender();

        appender.start_padding(63).unwrap();
        assert_eq!(journal.size(), 1);
        assert_eq!(journal.entry(0), Some(IndexedEntry::Padding(63)));
        assert!(appender.finish().is_err());

        // a record of the same length is a record, not padding
        appender.start_excerpt(63).unwrap();
        appender.write(&[7u8; 63]).unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.record(1).as_deref(), Some([7u8; 63].as_slice()));
    }

    #[test]
    fn indexed_clear_and_frontier() {
        let journal = MemIndexedJournal::new(64);
        assert_eq!(journal.last_written_index(), -1);

        let mut appender = journal.create_appender();
        appender.start_excerpt(0).unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.last_written_index(), 0);

        journal.clear().unwrap();
        assert_eq!(journal.size(), 0);
        assert_eq!(journal.last_written_index(), -1);
    }

    #[test]
    fn cycle_assigns_composed_indices() {
        let journal = MemCycleJournal::new(4);
        let mut appender = journal.create_appender();
        assert_eq!(journal.last_index(), -1);

        appender.start_excerpt(1, 0).unwrap();
        appender.write(b"a").unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.last_index(), 0);

        appender.start_excerpt(1, 2).unwrap();
        appender.write(b"b").unwrap();
        appender.finish().unwrap();
        assert_eq!(journal.last_index(), (2 << 4) | 0);
        assert_eq!(journal.cycle_len(0), 1);
        assert_eq!(journal.cycle_len(2), 1);
        assert_eq!(journal.record(2 << 4).as_deref(), Some(b"b".as_slice()));
    }
}

/// Reusable receive buffer with position/limit bookkeeping.
///
/// Consumers read from `pos..limit`; socket reads land at `limit..`. A
/// compact slides the unconsumed tail to the front so a partial header or
/// payload survives across refills without leaving the buffer. Storage grows
/// on demand when a record outsizes it.
#[derive(Debug)]
pub(crate) struct RecvBuffer {
    data: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl RecvBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: vec![0; capacity], pos: 0, limit: 0 }
    }

    /// Forgets all buffered bytes.
    #[inline]
    pub fn reset(&mut self) {
        self.pos = 0;
        self.limit = 0;
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.limit
    }

    /// Slides the unconsumed tail to the front; clears when nothing remains.
    pub fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        if self.pos == self.limit {
            self.reset();
            return;
        }
        self.data.copy_within(self.pos..self.limit, 0);
        self.limit -= self.pos;
        self.pos = 0;
    }

    /// Grows the backing storage so `total` bytes fit from the front.
    pub fn ensure_capacity(&mut self, total: usize) {
        if self.data.len() < total {
            self.data.resize(total, 0);
        }
    }

    /// The unconsumed bytes.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.data[self.pos..self.limit]
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.pos += n;
    }

    /// Writable room behind the buffered bytes.
    #[inline]
    pub fn spare(&mut self) -> &mut [u8] {
        &mut self.data[self.limit..]
    }

    #[inline]
    pub fn spare_len(&self) -> usize {
        self.data.len() - self.limit
    }

    #[inline]
    pub fn advance_limit(&mut self, n: usize) {
        debug_assert!(n <= self.spare_len());
        self.limit += n;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

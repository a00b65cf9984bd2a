/// Fixed frame header: `i32` size field + `i64` record index, native byte
/// order on both sides (cross-endian links are not supported).
pub const HEADER_SIZE: usize = size_of::<i32>() + size_of::<i64>();

/// Largest payload a data frame may carry.
pub const MAX_PAYLOAD: i32 = 128 << 20;

/// Heartbeat: the source has nothing newer than the sink's frontier.
pub const IN_SYNC: i32 = -128;
/// The source padded an indexed-journal block; the sink must mirror it.
pub const PADDED: i32 = -127;
/// Acknowledgement of a resume request; the header index carries the
/// source's authoritative reply position.
pub const SYNC_IDX: i32 = -126;

/// Resume-request sentinel: replay everything from the beginning.
pub const FROM_START: i64 = -1;
/// Resume-request sentinel: start at the source's current frontier.
pub const FROM_END: i64 = -2;

/// The resume request is a bare `i64`, big-endian (unlike the header).
pub const RESUME_REQUEST_SIZE: usize = size_of::<i64>();

/// What the size field of a decoded header means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// No payload follows; nothing new at the source.
    Heartbeat,
    /// No payload follows; an indexed journal block was padded out.
    Padding,
    /// No payload follows; reply to a resume request.
    SyncAck,
    /// This many payload bytes follow the header. Zero-length records are
    /// legal.
    Data(usize),
    /// The size field is neither a sentinel nor a legal payload length.
    Corrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub size: i32,
    pub index: i64,
}

impl FrameHeader {
    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Panics
    /// If `bytes` is shorter than [`HEADER_SIZE`].
    #[inline]
    pub fn decode(bytes: &[u8]) -> Self {
        let size = i32::from_ne_bytes(bytes[..size_of::<i32>()].try_into().unwrap());
        let index = i64::from_ne_bytes(bytes[size_of::<i32>()..HEADER_SIZE].try_into().unwrap());
        Self { size, index }
    }

    #[inline]
    pub fn encode(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..size_of::<i32>()].copy_from_slice(&self.size.to_ne_bytes());
        out[size_of::<i32>()..].copy_from_slice(&self.index.to_ne_bytes());
        out
    }

    #[inline]
    pub fn kind(self) -> FrameKind {
        match self.size {
            IN_SYNC => FrameKind::Heartbeat,
            PADDED => FrameKind::Padding,
            SYNC_IDX => FrameKind::SyncAck,
            n if (0..=MAX_PAYLOAD).contains(&n) => FrameKind::Data(n as usize),
            _ => FrameKind::Corrupt,
        }
    }
}

/// Encodes the sink's resume request. Big-endian by protocol, the one wire
/// field that is; do not unify with the header without a version bump.
#[inline]
pub fn encode_resume(index: i64) -> [u8; RESUME_REQUEST_SIZE] {
    index.to_be_bytes()
}

#[inline]
pub fn decode_resume(bytes: [u8; RESUME_REQUEST_SIZE]) -> i64 {
    i64::from_be_bytes(bytes)
}

/// Builds a complete data frame, header plus payload. Source-side helper.
pub fn encode_data_frame(index: i64, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader { size: payload.len() as i32, index };
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}

use std::io;

use thiserror::Error;

/// Fatal failures that escape the consumer API.
///
/// Transient socket trouble never lands here: it surfaces as
/// [`Advance::Reconnect`] (persistent handles) or a `false` return (memory
/// handles), and the next call reconnects and resumes.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The size field is neither a sentinel nor a legal payload length.
    /// The stream is corrupt; close the consumer.
    #[error("frame size {0} is no sentinel and no legal payload length")]
    PayloadSize(i32),
    /// A data frame skipped or repeated an index in indexed mode.
    #[error("source sent index {received}, local frontier expects {expected}")]
    IndexMismatch { expected: i64, received: i64 },
    /// A replicated sink never accepts local appends.
    #[error("a replicated sink does not accept appends")]
    AppendUnsupported,
    /// A persistent sink allows a single live consumer handle.
    #[error("sink already has a live consumer handle")]
    HandleInUse,
    /// The sink was closed.
    #[error("sink is closed")]
    Closed,
    /// The local journal failed underneath the sink.
    #[error("journal: {0}")]
    Journal(#[from] io::Error),
}

/// Outcome of driving a persistent sink handle one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A record or padding entry was applied to the local journal.
    Applied,
    /// Heartbeat; the source has nothing newer.
    Idle,
    /// The connection dropped mid-stream and was torn down. Call again to
    /// reconnect and resume from the local frontier.
    Reconnect,
    /// The sink or the handle is closed.
    Closed,
}

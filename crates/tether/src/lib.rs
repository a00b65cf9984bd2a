mod buffer;
mod config;
mod connector;
mod error;
pub mod journal;
mod sink;

pub use config::SinkConfig;
pub use error::{Advance, SinkError};
pub use sink::{
    CycleSink, CycleTailer, IndexedSink, IndexedTailer, MemoryExcerpt, MemorySink, MemoryTailer,
};
pub use tether_wire as wire;

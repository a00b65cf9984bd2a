use std::time::Duration;

const DEFAULT_MIN_BUFFER_SIZE: usize = 256 * 1024;
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Tuning for a sink's connector.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    min_buffer_size: usize,
    reconnect_delay: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl SinkConfig {
    /// Sets the receive buffer capacity. Also hinted to the kernel as
    /// SO_RCVBUF on every (re)connect. The buffer still grows past this for
    /// records that don't fit.
    pub fn with_min_buffer_size(mut self, size: usize) -> Self {
        self.min_buffer_size = size;
        self
    }

    /// Sets the sleep between reconnect attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[inline]
    pub fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

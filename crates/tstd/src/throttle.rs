//! Rate-limited warning helper for the underflow policy (BDAV §5:
//! `abort_on_underflow` / `underflow_warn_timeout`).

/// Tracks the last time a warning was emitted, so repeated violations within
/// `underflow_warn_timeout` 27 MHz ticks of each other are suppressed.
#[derive(Debug, Default)]
pub struct WarnThrottle {
    last_warned: Option<u64>,
}

impl WarnThrottle {
    /// Calls `emit` only if at least `timeout` ticks have passed since the
    /// last call that actually emitted (or this is the first call).
    pub fn warn_if_due(&mut self, timestamp: u64, timeout: u64, emit: impl FnOnce()) {
        let due = match self.last_warned {
            None => true,
            Some(last) => timestamp.saturating_sub(last) >= timeout,
        };
        if due {
            emit();
            self.last_warned = Some(timestamp);
        }
    }
}

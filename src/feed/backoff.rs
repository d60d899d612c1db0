//! Reconnect backoff for the feed client: doubling delay with a ceiling,
//! reset after a successful connection. The feed retries forever; losing
//! the upstream bridge is an operational condition, not a crash.

#[derive(Debug)]
pub struct ReconnectBackoff {
    initial_delay: u64,
    max_delay: u64,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial_secs: u64, max_secs: u64) -> Self {
        Self {
            initial_delay: initial_secs.max(1),
            max_delay: max_secs,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, in seconds.
    pub fn next_delay(&mut self) -> u64 {
        let delay = self
            .initial_delay
            .saturating_mul(2u64.saturating_pow(self.attempt))
            .min(self.max_delay);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

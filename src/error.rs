//! Error taxonomy for the tick-processing pipeline.
//!
//! Nothing here is fatal to the process: every loop logs the failure and
//! continues with the next message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Bad or missing fields on an inbound tick or query. The message is
    /// dropped with one log line and processing continues.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A publish or persistence call failed. These paths are fire-and-forget:
    /// log and move on, no retry.
    #[error("transient i/o failure: {0}")]
    TransientIo(String),

    /// Query for an instrument with no history. The query path answers with
    /// the neutral score instead of surfacing this.
    #[error("no market state for instrument {0}")]
    StateNotFound(String),

    /// Internal invariant broken, e.g. a tick bucketed before the open
    /// candle. Logged as a warning; the affected bucket is folded defensively.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

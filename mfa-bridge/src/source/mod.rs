//! Signal source adapters
//!
//! Two transport-specific adapters share one contract: produce a flat
//! name→value snapshot per tick, fail with `Transport` on I/O trouble and
//! with `Protocol`/`Frame` on malformed payloads. Everything downstream
//! (resolution, encoding) is transport-agnostic.

pub mod http;
pub mod stream;

use crate::types::{Result, SignalSnapshot};

/// A source of normalized telemetry snapshots.
///
/// `poll` blocks for at most one tick worth of I/O and is meant to run on
/// a dedicated thread; the consumer receives snapshots over a channel.
pub trait SignalSource {
    /// Produce the next snapshot
    fn poll(&mut self) -> Result<SignalSnapshot>;

    /// Short description for logs ("http://127.0.0.1:31270", ...)
    fn describe(&self) -> String;
}

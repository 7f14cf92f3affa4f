//! MFA Bridge Library
//!
//! Core of the telemetry-to-indicator pipeline: normalizes live cab
//! telemetry from a train simulator into named signals, resolves them
//! against per-vehicle mapping tables into one effect per indicator
//! (off / steady / blinking), and encodes the result as line-based
//! serial commands for the physical MFA panel.
//!
//! # Architecture
//!
//! The library is intentionally transport-thin and GUI-free:
//! - Two [`SignalSource`] adapters produce flat name→value snapshots
//!   (polling HTTP API, framed binary TCP stream)
//! - The [`ResolutionEngine`] turns one snapshot plus a [`Profile`]
//!   into effects, applying priority and anti-phase blink coupling
//! - The [`CommandEncoder`] deduplicates lit states against the last
//!   transmitted frame set
//!
//! The library does NOT:
//! - Own the serial port or any thread (the application layer does)
//! - Persist configuration
//! - Render anything on screen
//!
//! # Example Usage
//!
//! ```
//! use mfa_bridge::{CommandEncoder, PhaseClock, ResolutionEngine, SignalSnapshot, Value};
//!
//! let profile = mfa_bridge::profiles::builtin_profiles()
//!     .into_iter()
//!     .next()
//!     .unwrap();
//!
//! let mut snapshot = SignalSnapshot::new();
//! snapshot.insert(
//!     "CurrentFormation/0/BP_Sifa_Service.Property.WarningStateVisual".into(),
//!     Value::Bool(true),
//! );
//!
//! let engine = ResolutionEngine::new();
//! let clock = PhaseClock::new();
//! let effects = engine.resolve(&snapshot, &profile);
//! let lit = clock.lit_states(&effects);
//!
//! let mut encoder = CommandEncoder::new();
//! for frame in encoder.encode(&lit) {
//!     // write frame to the serial transport
//!     let _ = frame.to_line();
//! }
//! ```

// Public modules
pub mod encoder;
pub mod indicator;
pub mod mapping;
pub mod profiles;
pub mod resolve;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use encoder::{CommandEncoder, Frame};
pub use indicator::Indicator;
pub use mapping::{Condition, ConditionTest, Effect, Mapping, Profile};
pub use resolve::{EffectMap, PhaseClock, ResolutionEngine};
pub use source::{http::HttpSource, stream::StreamSource, SignalSource};
pub use types::{BridgeError, Result, SignalSnapshot, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: built-in profiles are present and non-empty
        let profiles = profiles::builtin_profiles();
        assert!(!profiles.is_empty());
        assert!(profiles.iter().all(|p| !p.mappings.is_empty()));
    }
}

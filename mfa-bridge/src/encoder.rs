//! Serial command encoding with change suppression
//!
//! The device protocol is stateless about timing: only binary lit states
//! cross the wire, and the host re-sends toggles at its own tick cadence
//! to realize blinking. The encoder's job is to keep that traffic minimal
//! by diffing against the last transmitted frame set, while still
//! guaranteeing a full refresh after (re)connect and a fail-safe all-dark
//! frame on the way out.

use crate::indicator::{self, Indicator};
use std::collections::BTreeMap;

/// One line-based command for the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// `ALIAS:0|1` — set one indicator
    Set(Indicator, bool),
    /// `OFF` — clear every indicator at once
    AllOff,
}

impl Frame {
    /// Wire form without the line terminator
    pub fn to_line(self) -> String {
        match self {
            Frame::Set(ind, lit) => format!("{}:{}", ind.alias(), u8::from(lit)),
            Frame::AllOff => "OFF".to_string(),
        }
    }
}

/// Encodes lit-state frames, suppressing no-op retransmissions
#[derive(Debug, Default)]
pub struct CommandEncoder {
    /// Last state acknowledged as written; `None` forces a full send
    last_sent: Option<BTreeMap<Indicator, bool>>,
}

impl CommandEncoder {
    pub fn new() -> CommandEncoder {
        CommandEncoder { last_sent: None }
    }

    /// Encode the frames needed to bring the panel to `lit`.
    ///
    /// On the first call, and after [`reset`](Self::reset), every
    /// indicator is sent unconditionally; afterwards only changes are.
    pub fn encode(&mut self, lit: &BTreeMap<Indicator, bool>) -> Vec<Frame> {
        let mut frames = Vec::new();
        for ind in indicator::ALL {
            let state = lit.get(&ind).copied().unwrap_or(false);
            let unchanged = self
                .last_sent
                .as_ref()
                .and_then(|prev| prev.get(&ind))
                .is_some_and(|prev| *prev == state);
            if !unchanged {
                frames.push(Frame::Set(ind, state));
            }
        }
        let cache = self.last_sent.get_or_insert_with(BTreeMap::new);
        for ind in indicator::ALL {
            cache.insert(ind, lit.get(&ind).copied().unwrap_or(false));
        }
        frames
    }

    /// The single fail-safe frame: clear everything, bypassing the
    /// no-op-if-unchanged rule. The cache is primed to all-dark so a
    /// later `encode` only sends what actually lights up again.
    pub fn all_off(&mut self) -> Frame {
        let cache = indicator::ALL.into_iter().map(|i| (i, false)).collect();
        self.last_sent = Some(cache);
        Frame::AllOff
    }

    /// Forget the transmitted state, e.g. after a serial reconnect; the
    /// next `encode` emits the full panel state.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_dark() -> BTreeMap<Indicator, bool> {
        indicator::ALL.into_iter().map(|i| (i, false)).collect()
    }

    #[test]
    fn test_first_encode_sends_full_state() {
        let mut encoder = CommandEncoder::new();
        let frames = encoder.encode(&all_dark());
        assert_eq!(frames.len(), Indicator::COUNT);
        assert!(frames.iter().all(|f| matches!(f, Frame::Set(_, false))));
    }

    #[test]
    fn test_unchanged_state_sends_nothing() {
        let mut encoder = CommandEncoder::new();
        let mut lit = all_dark();
        lit.insert(Indicator::Sifa, true);
        encoder.encode(&lit);
        assert!(encoder.encode(&lit).is_empty());
    }

    #[test]
    fn test_only_changes_are_sent() {
        let mut encoder = CommandEncoder::new();
        let mut lit = all_dark();
        encoder.encode(&lit);

        lit.insert(Indicator::Pzb70, true);
        lit.insert(Indicator::Hz500, true);
        let frames = encoder.encode(&lit);
        assert_eq!(
            frames,
            vec![
                Frame::Set(Indicator::Pzb70, true),
                Frame::Set(Indicator::Hz500, true),
            ]
        );
    }

    #[test]
    fn test_reset_forces_full_resend() {
        let mut encoder = CommandEncoder::new();
        let lit = all_dark();
        encoder.encode(&lit);
        encoder.reset();
        assert_eq!(encoder.encode(&lit).len(), Indicator::COUNT);
    }

    #[test]
    fn test_all_off_overrides_dedup_and_primes_cache() {
        let mut encoder = CommandEncoder::new();
        let mut lit = all_dark();
        lit.insert(Indicator::LzbS, true);
        encoder.encode(&lit);

        assert_eq!(encoder.all_off(), Frame::AllOff);

        // Everything is dark now; re-lighting only sends the one change
        lit.insert(Indicator::LzbS, false);
        assert!(encoder.encode(&lit).is_empty());
        lit.insert(Indicator::Pzb85, true);
        let frames = encoder.encode(&lit);
        assert_eq!(frames, vec![Frame::Set(Indicator::Pzb85, true)]);
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(Frame::Set(Indicator::Hz1000, true).to_line(), "1000HZ:1");
        assert_eq!(Frame::Set(Indicator::DoorsLeft, false).to_line(), "TUEREN_L:0");
        assert_eq!(Frame::AllOff.to_line(), "OFF");
    }
}

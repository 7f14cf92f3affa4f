//! Charlieplexing multiplexer
//!
//! Thirteen LEDs on five pins (or twelve on four): every unordered pin
//! pair drives up to two LEDs, one per current direction. The hard
//! constraint is that at most one LED is energized at any instant; the
//! multiplexer runs on a fixed ~2 ms tick, fast enough that the full
//! cycle stays far above the flicker-fusion threshold even with all
//! LEDs lit.
//!
//! ## Pin naming
//!
//! Logical pins 0..=4 stand for the five charlieplexing lines (on the
//! reference board: A3, 0/RX, 1/TX, A4 and the MISO pin bridged from
//! the ICSP header for the thirteenth LED).

/// Electrical state of one charlieplexing line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// High-impedance input; the idle state of every line
    Floating,
    /// Driven output, source current
    High,
    /// Driven output, sink current
    Low,
}

/// GPIO access for the charlieplexing lines.
///
/// Implemented by the board crate; the test suite uses an in-memory
/// bank recording each line's state.
pub trait PinBank {
    fn set_pin(&mut self, pin: u8, state: PinState);
}

/// (source, sink) pin pair per LED, in wire order (LED 1 first).
///
/// Five-pin layout of the reference board. No unordered pair appears
/// twice with the same polarity.
pub const PATHS_FIVE_PIN: [(u8, u8); 13] = [
    (0, 1), // LED1  SIFA
    (1, 0), // LED2  LZB Ende
    (0, 2), // LED3  PZB 70
    (2, 0), // LED4  PZB 85
    (1, 2), // LED5  PZB 55
    (2, 1), // LED6  500 Hz
    (0, 3), // LED7  1000 Hz
    (3, 0), // LED8  Doors left
    (1, 3), // LED9  Doors right
    (2, 3), // LED10 LZB Ü
    (3, 1), // LED11 LZB G
    (3, 2), // LED12 LZB S
    (0, 4), // LED13 Befehl 40 (bridged MISO pin)
];

/// Four-pin layout: the same panel without the Befehl 40 lamp
pub const PATHS_FOUR_PIN: [(u8, u8); 12] = [
    (0, 1),
    (1, 0),
    (0, 2),
    (2, 0),
    (1, 2),
    (2, 1),
    (0, 3),
    (3, 0),
    (1, 3),
    (2, 3),
    (3, 1),
    (3, 2),
];

/// Upper bound used for the desired-state array
const MAX_LEDS: usize = 13;

/// Time-multiplexed charlieplexing driver.
///
/// Owns the desired-lit table exclusively; the command parser writes
/// into it between ticks, and each tick energizes at most one path.
pub struct Multiplexer {
    paths: &'static [(u8, u8)],
    desired: [bool; MAX_LEDS],
    /// Index lit on the previous tick; the scan resumes after it so
    /// duty cycle distributes fairly when few LEDs are lit
    cursor: usize,
    pin_count: u8,
}

impl Multiplexer {
    pub fn new(paths: &'static [(u8, u8)]) -> Multiplexer {
        debug_assert!(paths.len() <= MAX_LEDS);
        let pin_count = paths
            .iter()
            .map(|(hi, lo)| (*hi).max(*lo) + 1)
            .max()
            .unwrap_or(0);
        Multiplexer {
            paths,
            desired: [false; MAX_LEDS],
            cursor: 0,
            pin_count,
        }
    }

    /// Number of LEDs on this wiring
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Set one desired-lit state (0-based). Out-of-range indices are
    /// ignored; the serial protocol has no feedback channel.
    pub fn set(&mut self, index: usize, lit: bool) {
        if index < self.paths.len() {
            self.desired[index] = lit;
        }
    }

    /// Desired-lit state (0-based); out-of-range reads as unlit
    pub fn get(&self, index: usize) -> bool {
        index < self.paths.len() && self.desired[index]
    }

    /// Clear the whole table (the `OFF` command)
    pub fn clear_all(&mut self) {
        self.desired = [false; MAX_LEDS];
    }

    /// One multiplex tick: float every line, then energize the next
    /// desired-lit path in round-robin order, if any.
    pub fn tick(&mut self, pins: &mut impl PinBank) {
        for pin in 0..self.pin_count {
            pins.set_pin(pin, PinState::Floating);
        }
        let len = self.paths.len();
        if len == 0 {
            return;
        }
        for offset in 1..=len {
            let index = (self.cursor + offset) % len;
            if self.desired[index] {
                let (hi, lo) = self.paths[index];
                pins.set_pin(hi, PinState::High);
                pins.set_pin(lo, PinState::Low);
                self.cursor = index;
                return;
            }
        }
        // Nothing desired: all lines stay floating this tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// In-memory pin bank recording line states
    struct MockPins {
        states: [PinState; 5],
    }

    impl MockPins {
        fn new() -> MockPins {
            MockPins {
                states: [PinState::Floating; 5],
            }
        }

        fn driven(&self) -> Vec<(u8, PinState)> {
            self.states
                .iter()
                .enumerate()
                .filter(|(_, s)| **s != PinState::Floating)
                .map(|(i, s)| (i as u8, *s))
                .collect()
        }

        /// Which LED of `paths` is energized, if any
        fn lit_index(&self, paths: &[(u8, u8)]) -> Option<usize> {
            let driven = self.driven();
            if driven.is_empty() {
                return None;
            }
            paths.iter().position(|(hi, lo)| {
                self.states[*hi as usize] == PinState::High
                    && self.states[*lo as usize] == PinState::Low
            })
        }
    }

    impl PinBank for MockPins {
        fn set_pin(&mut self, pin: u8, state: PinState) {
            self.states[pin as usize] = state;
        }
    }

    #[test]
    fn test_path_tables_have_no_duplicate_polarity() {
        for paths in [&PATHS_FIVE_PIN[..], &PATHS_FOUR_PIN[..]] {
            let mut seen = HashSet::new();
            for pair in paths {
                assert!(seen.insert(*pair), "duplicate path {:?}", pair);
                assert_ne!(pair.0, pair.1);
            }
        }
    }

    #[test]
    fn test_at_most_two_pins_driven_per_tick() {
        let mut mux = Multiplexer::new(&PATHS_FIVE_PIN);
        for i in 0..13 {
            mux.set(i, true);
        }
        let mut pins = MockPins::new();
        for _ in 0..100 {
            mux.tick(&mut pins);
            let driven = pins.driven();
            assert_eq!(driven.len(), 2);
            assert!(driven.iter().any(|(_, s)| *s == PinState::High));
            assert!(driven.iter().any(|(_, s)| *s == PinState::Low));
        }
    }

    #[test]
    fn test_all_dark_when_nothing_desired() {
        let mut mux = Multiplexer::new(&PATHS_FIVE_PIN);
        let mut pins = MockPins::new();
        mux.tick(&mut pins);
        assert!(pins.driven().is_empty());
    }

    #[test]
    fn test_single_led_is_driven_every_tick() {
        let mut mux = Multiplexer::new(&PATHS_FIVE_PIN);
        mux.set(6, true); // 1000 Hz
        let mut pins = MockPins::new();
        for _ in 0..10 {
            mux.tick(&mut pins);
            assert_eq!(pins.lit_index(&PATHS_FIVE_PIN), Some(6));
        }
    }

    #[test]
    fn test_round_robin_visits_each_lit_led_equally() {
        let mut mux = Multiplexer::new(&PATHS_FIVE_PIN);
        for index in [0, 4, 9] {
            mux.set(index, true);
        }
        let mut pins = MockPins::new();
        let mut visits = [0u32; 13];
        for _ in 0..300 {
            mux.tick(&mut pins);
            let lit = pins.lit_index(&PATHS_FIVE_PIN).unwrap();
            visits[lit] += 1;
        }
        assert_eq!(visits[0], 100);
        assert_eq!(visits[4], 100);
        assert_eq!(visits[9], 100);
        assert_eq!(visits.iter().sum::<u32>(), 300);
    }

    #[test]
    fn test_never_two_indicators_in_one_tick() {
        let mut mux = Multiplexer::new(&PATHS_FOUR_PIN);
        for i in 0..12 {
            mux.set(i, true);
        }
        let mut pins = MockPins::new();
        for _ in 0..50 {
            mux.tick(&mut pins);
            // Exactly one (hi, lo) combination matches a path
            let lit: Vec<usize> = PATHS_FOUR_PIN
                .iter()
                .enumerate()
                .filter(|(_, (hi, lo))| {
                    pins.states[*hi as usize] == PinState::High
                        && pins.states[*lo as usize] == PinState::Low
                })
                .map(|(i, _)| i)
                .collect();
            assert_eq!(lit.len(), 1);
        }
    }

    #[test]
    fn test_out_of_range_set_is_ignored() {
        let mut mux = Multiplexer::new(&PATHS_FOUR_PIN);
        mux.set(12, true); // Befehl 40 does not exist on four pins
        mux.set(99, true);
        let mut pins = MockPins::new();
        mux.tick(&mut pins);
        assert!(pins.driven().is_empty());
    }

    #[test]
    fn test_clear_all_darkens_panel() {
        let mut mux = Multiplexer::new(&PATHS_FIVE_PIN);
        for i in 0..13 {
            mux.set(i, true);
        }
        mux.clear_all();
        assert!((0..13).all(|i| !mux.get(i)));
    }
}

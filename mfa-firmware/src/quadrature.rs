//! Quadrature encoder decoding and axis mapping
//!
//! The two encoder lines raise hardware change interrupts; the handler
//! only calls [`QuadratureDecoder::step`] and adds the returned delta to
//! the position counter — no I/O in interrupt context.
//!
//! The counter is re-clamped at the axis bounds, not just the derived
//! output value: without that, holding the knob against a stop would
//! keep accumulating counts and a slow turn back would need as many
//! reverse detents before the axis leaves saturation.

/// Gray-code transition table: index is `(previous << 2) | current`,
/// value is the step direction. Invalid transitions (both lines flipped
/// at once) count as zero.
const TRANSITIONS: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

/// Stateful two-line quadrature decoder
#[derive(Debug, Default)]
pub struct QuadratureDecoder {
    previous: u8,
}

impl QuadratureDecoder {
    pub fn new() -> QuadratureDecoder {
        QuadratureDecoder::default()
    }

    /// Feed the current line levels; returns -1, 0 or +1
    pub fn step(&mut self, a: bool, b: bool) -> i8 {
        let current = (u8::from(a) << 1) | u8::from(b);
        let delta = TRANSITIONS[usize::from((self.previous << 2) | current)];
        self.previous = current;
        delta
    }
}

/// Maps the accumulated encoder position onto a bounded analog axis
#[derive(Debug)]
pub struct EncoderAxis {
    counter: i32,
    /// Axis units per encoder count
    step: i32,
    /// Counter bounds derived from the axis range
    min_count: i32,
    max_count: i32,
    center: i32,
}

impl EncoderAxis {
    /// `center` is the axis value at counter zero; the counter is kept
    /// inside the range where `center + counter * step` stays within
    /// `[min, max]`.
    pub fn new(min: i32, max: i32, center: i32, step: i32) -> EncoderAxis {
        debug_assert!(step > 0 && min <= center && center <= max);
        EncoderAxis {
            counter: 0,
            step,
            min_count: -((center - min) / step),
            max_count: (max - center) / step,
            center,
        }
    }

    /// Add a decoder delta; saturates at the axis bounds
    pub fn apply(&mut self, delta: i8) {
        self.counter = (self.counter + i32::from(delta)).clamp(self.min_count, self.max_count);
    }

    /// Current axis value
    pub fn position(&self) -> i32 {
        self.center + self.counter * self.step
    }

    /// Re-center (encoder click)
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the decoder through one full clockwise Gray cycle
    fn clockwise(decoder: &mut QuadratureDecoder) -> i32 {
        [(true, false), (true, true), (false, true), (false, false)]
            .iter()
            .map(|(a, b)| i32::from(decoder.step(*a, *b)))
            .sum()
    }

    fn counterclockwise(decoder: &mut QuadratureDecoder) -> i32 {
        [(false, true), (true, true), (true, false), (false, false)]
            .iter()
            .map(|(a, b)| i32::from(decoder.step(*a, *b)))
            .sum()
    }

    #[test]
    fn test_full_cycle_counts_four_steps() {
        let mut decoder = QuadratureDecoder::new();
        assert_eq!(clockwise(&mut decoder), 4);
        assert_eq!(counterclockwise(&mut decoder), -4);
    }

    #[test]
    fn test_invalid_double_transition_is_ignored() {
        let mut decoder = QuadratureDecoder::new();
        // 00 → 11 flips both lines at once
        assert_eq!(decoder.step(true, true), 0);
    }

    #[test]
    fn test_axis_scaling() {
        let mut axis = EncoderAxis::new(0, 1023, 512, 8);
        assert_eq!(axis.position(), 512);
        axis.apply(1);
        assert_eq!(axis.position(), 520);
        axis.apply(-2);
        assert_eq!(axis.position(), 504);
    }

    #[test]
    fn test_counter_reclamps_at_the_boundary() {
        let mut axis = EncoderAxis::new(0, 1023, 512, 8);
        // Grind far past the top stop
        for _ in 0..500 {
            axis.apply(1);
        }
        assert_eq!(axis.position(), 1016); // 512 + 63 * 8

        // One reverse step must move immediately — the counter itself
        // saturated, it did not keep counting
        axis.apply(-1);
        assert_eq!(axis.position(), 1008);
    }

    #[test]
    fn test_lower_bound_symmetric() {
        let mut axis = EncoderAxis::new(0, 1023, 512, 8);
        for _ in 0..500 {
            axis.apply(-1);
        }
        assert_eq!(axis.position(), 0); // 512 - 64 * 8
        axis.apply(1);
        assert_eq!(axis.position(), 8);
    }

    #[test]
    fn test_reset_recenters() {
        let mut axis = EncoderAxis::new(0, 1023, 512, 8);
        for _ in 0..10 {
            axis.apply(1);
        }
        axis.reset();
        assert_eq!(axis.position(), 512);
    }
}

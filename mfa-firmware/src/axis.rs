//! Analog axis conditioning
//!
//! The slider potentiometers feed the ADC through RC filtering, but the
//! readings still jitter by a few counts. A small fixed-size moving
//! average smooths them, and a report deadband keeps the jitter from
//! being reported as continuous motion over USB.

/// Fixed-window moving average over raw ADC samples
#[derive(Debug)]
pub struct MovingAverage<const N: usize> {
    samples: [u16; N],
    index: usize,
    filled: usize,
}

impl<const N: usize> MovingAverage<N> {
    pub fn new() -> MovingAverage<N> {
        MovingAverage {
            samples: [0; N],
            index: 0,
            filled: 0,
        }
    }

    /// Push a sample, return the current average
    pub fn push(&mut self, sample: u16) -> u16 {
        self.samples[self.index] = sample;
        self.index = (self.index + 1) % N;
        if self.filled < N {
            self.filled += 1;
        }
        let sum: u32 = self.samples[..self.filled.max(1)]
            .iter()
            .map(|s| u32::from(*s))
            .sum();
        (sum / self.filled.max(1) as u32) as u16
    }
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        MovingAverage::new()
    }
}

/// One conditioned potentiometer axis: smoothing plus report deadband
#[derive(Debug)]
pub struct AnalogAxis<const N: usize> {
    filter: MovingAverage<N>,
    deadband: u16,
    last_reported: Option<u16>,
}

impl<const N: usize> AnalogAxis<N> {
    pub fn new(deadband: u16) -> AnalogAxis<N> {
        AnalogAxis {
            filter: MovingAverage::new(),
            deadband,
            last_reported: None,
        }
    }

    /// Feed a raw ADC sample. Returns the new axis value only when it
    /// moved at least the deadband away from the last reported one (the
    /// first sample always reports).
    pub fn update(&mut self, raw: u16) -> Option<u16> {
        let filtered = self.filter.push(raw);
        match self.last_reported {
            Some(last) if filtered.abs_diff(last) < self.deadband => None,
            _ => {
                self.last_reported = Some(filtered);
                Some(filtered)
            }
        }
    }

    /// Last value handed to the report sender
    pub fn reported(&self) -> Option<u16> {
        self.last_reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_warms_up_over_partial_window() {
        let mut avg = MovingAverage::<4>::new();
        assert_eq!(avg.push(100), 100);
        assert_eq!(avg.push(200), 150);
        assert_eq!(avg.push(300), 200);
        assert_eq!(avg.push(400), 250);
        // Window full: oldest sample drops out
        assert_eq!(avg.push(500), 350);
    }

    #[test]
    fn test_average_flattens_spikes() {
        let mut avg = MovingAverage::<8>::new();
        for _ in 0..8 {
            avg.push(512);
        }
        // A single outlier moves the average by only 1/8 of its height
        assert_eq!(avg.push(592), 522);
    }

    #[test]
    fn test_first_sample_always_reports() {
        let mut axis = AnalogAxis::<4>::new(4);
        assert_eq!(axis.update(500), Some(500));
    }

    #[test]
    fn test_jitter_below_deadband_is_silent() {
        let mut axis = AnalogAxis::<1>::new(4);
        axis.update(500);
        assert_eq!(axis.update(501), None);
        assert_eq!(axis.update(499), None);
        assert_eq!(axis.update(503), None);
        assert_eq!(axis.reported(), Some(500));
    }

    #[test]
    fn test_real_motion_reports() {
        let mut axis = AnalogAxis::<1>::new(4);
        axis.update(500);
        assert_eq!(axis.update(504), Some(504));
        // Deadband measures from the last report, not the origin
        assert_eq!(axis.update(507), None);
        assert_eq!(axis.update(508), Some(508));
    }
}

//! Priority-based LED state resolution
//!
//! Turns one signal snapshot plus a profile into exactly one effect per
//! indicator, then turns effects plus a shared phase clock into the
//! per-instant lit/dark frame the encoder transmits.
//!
//! Resolution is pure given its inputs; only the blink phase depends on
//! a time base, which lives in [`PhaseClock`] so tests can sample it at
//! chosen instants.

use crate::indicator::{self, Indicator};
use crate::mapping::{Effect, Profile};
use crate::types::SignalSnapshot;
use std::collections::BTreeMap;
use std::time::Instant;

/// One resolved effect per indicator. Every indicator of the panel is
/// present, exactly once.
pub type EffectMap = BTreeMap<Indicator, Effect>;

/// The resolution engine. Stateless; previous effects are not needed
/// because all conditions are level-triggered.
#[derive(Debug, Default)]
pub struct ResolutionEngine;

impl ResolutionEngine {
    pub fn new() -> ResolutionEngine {
        ResolutionEngine
    }

    /// Resolve a snapshot against a profile.
    ///
    /// For each indicator, every mapping targeting it is considered
    /// unless its suppression guard holds. Among mappings whose condition
    /// is true the highest priority wins; ties go to the first-declared
    /// mapping. An indicator with no true mapping is `Off`.
    pub fn resolve(&self, snapshot: &SignalSnapshot, profile: &Profile) -> EffectMap {
        let mut winners: BTreeMap<Indicator, (i32, Effect)> = BTreeMap::new();

        for mapping in &profile.mappings {
            if let Some(guard) = &mapping.suppress_by {
                if guard.evaluate(snapshot) {
                    log::trace!("Mapping '{}' suppressed", mapping.name);
                    continue;
                }
            }
            if !mapping.condition.evaluate(snapshot) {
                continue;
            }
            // Strictly greater replaces; equal keeps the earlier
            // declaration (stable tie-break)
            let wins = match winners.get(&mapping.indicator) {
                Some((best, _)) => mapping.priority > *best,
                None => true,
            };
            if wins {
                winners.insert(mapping.indicator, (mapping.priority, mapping.effect));
            }
        }

        indicator::ALL
            .into_iter()
            .map(|ind| {
                let effect = winners.get(&ind).map(|(_, e)| *e).unwrap_or(Effect::Off);
                (ind, effect)
            })
            .collect()
    }
}

/// The anti-phase pair: both train-category lamps blinking at the same
/// rate must alternate, never coincide. Pzb55 is deliberately not part
/// of the group and blinks in its own phase.
const ANTI_PHASE_PAIR: (Indicator, Indicator) = (Indicator::Pzb70, Indicator::Pzb85);

/// Shared blink time base.
///
/// All blinking indicators derive their phase from one epoch, which is
/// what keeps the anti-phase pair in strict opposition: both lamps see
/// the same `phase` value and light on opposite halves of it.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    epoch: Instant,
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseClock {
    pub fn new() -> PhaseClock {
        PhaseClock {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since the epoch
    pub fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Per-instant lit/dark frame for the current time
    pub fn lit_states(&self, effects: &EffectMap) -> BTreeMap<Indicator, bool> {
        lit_states_at(effects, self.elapsed_ms())
    }
}

/// Blink phase at a given instant: 0 during the first half-period,
/// 1 during the second.
fn phase(elapsed_ms: u64, interval_ms: u32) -> u64 {
    // A zero interval would be a profile authoring mistake; render it
    // as steady rather than dividing by it
    (elapsed_ms / u64::from(interval_ms.max(1))) % 2
}

/// Compute which indicators are lit at `elapsed_ms` past the epoch.
///
/// Separated from [`PhaseClock`] so the anti-phase property can be
/// verified by sampling explicit instants.
pub fn lit_states_at(effects: &EffectMap, elapsed_ms: u64) -> BTreeMap<Indicator, bool> {
    let (a, b) = ANTI_PHASE_PAIR;
    // The pair couples only when both members blink with equal interval
    let coupled_interval = match (effects.get(&a), effects.get(&b)) {
        (Some(Effect::Blink(ia)), Some(Effect::Blink(ib))) if ia == ib => Some(*ia),
        _ => None,
    };

    effects
        .iter()
        .map(|(ind, effect)| {
            let lit = match effect {
                Effect::Off => false,
                Effect::On => true,
                Effect::Blink(interval) => {
                    let p = phase(elapsed_ms, *interval);
                    if coupled_interval.is_some() && *ind == b {
                        p == 1
                    } else {
                        p == 0
                    }
                }
            };
            (*ind, lit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Condition, Mapping, PollSettings};
    use crate::types::Value;

    fn profile(mappings: Vec<Mapping>) -> Profile {
        Profile {
            name: "test".into(),
            description: String::new(),
            vehicle_classes: vec![],
            mappings,
            poll: PollSettings::default(),
        }
    }

    fn snapshot(entries: &[(&str, Value)]) -> SignalSnapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_every_indicator_has_exactly_one_effect() {
        let engine = ResolutionEngine::new();
        let effects = engine.resolve(&SignalSnapshot::new(), &profile(vec![]));
        assert_eq!(effects.len(), Indicator::COUNT);
        assert!(effects.values().all(|e| *e == Effect::Off));
    }

    #[test]
    fn test_priority_monotonicity_regardless_of_declaration_order() {
        let snap = snapshot(&[
            ("ActiveMode", Value::Int(3)),
            ("isRestricted", Value::Bool(true)),
        ]);
        let low = Mapping::new(
            "mode 3 steady",
            Indicator::Pzb85,
            Condition::equals("ActiveMode", 3),
            Effect::On,
        );
        let high = Mapping::new(
            "restricted blink",
            Indicator::Pzb85,
            Condition::is_true("isRestricted"),
            Effect::Blink(1000),
        )
        .with_priority(3);

        let engine = ResolutionEngine::new();
        for mappings in [
            vec![low.clone(), high.clone()],
            vec![high.clone(), low.clone()],
        ] {
            let effects = engine.resolve(&snap, &profile(mappings));
            assert_eq!(effects[&Indicator::Pzb85], Effect::Blink(1000));
        }
    }

    #[test]
    fn test_equal_priority_keeps_first_declared() {
        let snap = snapshot(&[("flag", Value::Bool(true))]);
        let first = Mapping::new(
            "first",
            Indicator::Hz1000,
            Condition::is_true("flag"),
            Effect::On,
        );
        let second = Mapping::new(
            "second",
            Indicator::Hz1000,
            Condition::is_true("flag"),
            Effect::Blink(500),
        );
        let engine = ResolutionEngine::new();
        let effects = engine.resolve(&snap, &profile(vec![first, second]));
        assert_eq!(effects[&Indicator::Hz1000], Effect::On);
    }

    #[test]
    fn test_suppression_forces_off() {
        let snap = snapshot(&[
            ("pzb.lm_1000hz", Value::Int(1)),
            ("lzb.supervision", Value::Int(1)),
        ]);
        let mapping = Mapping::new(
            "1000hz lamp",
            Indicator::Hz1000,
            Condition::equals("pzb.lm_1000hz", 1),
            Effect::On,
        )
        .suppressed_by(Condition::is_true("lzb.supervision"));

        let engine = ResolutionEngine::new();
        let effects = engine.resolve(&snap, &profile(vec![mapping.clone()]));
        assert_eq!(effects[&Indicator::Hz1000], Effect::Off);

        // Guard released: the mapping fires again
        let snap = snapshot(&[
            ("pzb.lm_1000hz", Value::Int(1)),
            ("lzb.supervision", Value::Int(0)),
        ]);
        let effects = engine.resolve(&snap, &profile(vec![mapping]));
        assert_eq!(effects[&Indicator::Hz1000], Effect::On);
    }

    #[test]
    fn test_anti_phase_alternation_over_full_interval() {
        let mut effects = EffectMap::new();
        for ind in indicator::ALL {
            effects.insert(ind, Effect::Off);
        }
        effects.insert(Indicator::Pzb70, Effect::Blink(1000));
        effects.insert(Indicator::Pzb85, Effect::Blink(1000));

        // Sampled at t = 0, 500, 1000, 1500: the pair alternates every
        // half-period and is never simultaneously lit
        let expectations = [
            (0, true, false),
            (500, true, false),
            (1000, false, true),
            (1500, false, true),
            (2000, true, false),
        ];
        for (t, pzb70, pzb85) in expectations {
            let lit = lit_states_at(&effects, t);
            assert_eq!(lit[&Indicator::Pzb70], pzb70, "t={}", t);
            assert_eq!(lit[&Indicator::Pzb85], pzb85, "t={}", t);
            assert!(!(lit[&Indicator::Pzb70] && lit[&Indicator::Pzb85]));
        }
    }

    #[test]
    fn test_anti_phase_duty_cycle_is_half() {
        let mut effects = EffectMap::new();
        effects.insert(Indicator::Pzb70, Effect::Blink(1000));
        effects.insert(Indicator::Pzb85, Effect::Blink(1000));

        let mut lit_70 = 0;
        let mut lit_85 = 0;
        for t in (0..2000).step_by(10) {
            let lit = lit_states_at(&effects, t);
            lit_70 += u32::from(lit[&Indicator::Pzb70]);
            lit_85 += u32::from(lit[&Indicator::Pzb85]);
        }
        assert_eq!(lit_70, 100);
        assert_eq!(lit_85, 100);
    }

    #[test]
    fn test_pzb55_excluded_from_anti_phase_group() {
        let mut effects = EffectMap::new();
        effects.insert(Indicator::Pzb70, Effect::Blink(1000));
        effects.insert(Indicator::Pzb85, Effect::Blink(1000));
        effects.insert(Indicator::Pzb55, Effect::Blink(1000));

        // Pzb55 follows the normal phase, i.e. it tracks Pzb70
        for t in [0, 500, 1000, 1500] {
            let lit = lit_states_at(&effects, t);
            assert_eq!(lit[&Indicator::Pzb55], lit[&Indicator::Pzb70], "t={}", t);
        }
    }

    #[test]
    fn test_no_coupling_with_unequal_intervals() {
        let mut effects = EffectMap::new();
        effects.insert(Indicator::Pzb70, Effect::Blink(1000));
        effects.insert(Indicator::Pzb85, Effect::Blink(500));

        // Both follow the normal phase of their own interval
        let lit = lit_states_at(&effects, 500);
        assert!(lit[&Indicator::Pzb70]);
        assert!(!lit[&Indicator::Pzb85]);
        let lit = lit_states_at(&effects, 0);
        assert!(lit[&Indicator::Pzb70]);
        assert!(lit[&Indicator::Pzb85]);
    }

    #[test]
    fn test_steady_and_off_ignore_phase() {
        let mut effects = EffectMap::new();
        effects.insert(Indicator::Sifa, Effect::On);
        effects.insert(Indicator::LzbEnde, Effect::Off);
        for t in [0, 333, 1000, 7777] {
            let lit = lit_states_at(&effects, t);
            assert!(lit[&Indicator::Sifa]);
            assert!(!lit[&Indicator::LzbEnde]);
        }
    }
}

//! Mapping tables: conditions, effects, profiles
//!
//! A profile is the full, immutable mapping table for one vehicle family.
//! Each mapping ties one condition over one signal to one indicator with a
//! priority and an effect; several mappings may target the same indicator
//! and the resolution engine picks the winner per tick.
//!
//! The condition language is deliberately fixed: flag tests and exact
//! discrete equality. Magnitude comparisons are not part of the model —
//! discrete simulator states (lamp states, mode selectors) are matched
//! exactly, and a missing signal is simply a false condition.

use crate::indicator::Indicator;
use crate::types::{lookup, SignalSnapshot, Value};
use serde::{Deserialize, Serialize};

/// Predicate kind applied to a signal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionTest {
    /// Value is truthy (non-zero / non-empty)
    IsTrue,
    /// Value is falsy, or the signal is present with a false value.
    /// A missing signal still evaluates to false, not true: absence is
    /// never evidence.
    IsFalse,
    /// Exact discrete match (mode selector 1/2/3, lamp state 0..4)
    Equals(i64),
}

/// A predicate over one named signal, optionally one sub-field deep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Signal name as delivered by the source adapter
    pub signal: String,
    /// Optional sub-field selector for map-shaped values. Matched as a
    /// substring against the map keys (engine-generated keys carry GUID
    /// suffixes), then recursively in nested maps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_key: Option<String>,
    pub test: ConditionTest,
}

impl Condition {
    pub fn is_true(signal: impl Into<String>) -> Condition {
        Condition {
            signal: signal.into(),
            value_key: None,
            test: ConditionTest::IsTrue,
        }
    }

    pub fn is_false(signal: impl Into<String>) -> Condition {
        Condition {
            signal: signal.into(),
            value_key: None,
            test: ConditionTest::IsFalse,
        }
    }

    pub fn equals(signal: impl Into<String>, expected: i64) -> Condition {
        Condition {
            signal: signal.into(),
            value_key: None,
            test: ConditionTest::Equals(expected),
        }
    }

    /// Select a sub-field of a map-shaped signal value
    pub fn with_key(mut self, key: impl Into<String>) -> Condition {
        self.value_key = Some(key.into());
        self
    }

    /// Evaluate against a snapshot. A signal that never appears, or a
    /// `value_key` that matches nothing, yields false — never an error.
    pub fn evaluate(&self, snapshot: &SignalSnapshot) -> bool {
        let Some(mut value) = lookup(snapshot, &self.signal) else {
            return false;
        };
        if let Some(key) = &self.value_key {
            match extract_value_key(value, key) {
                Some(inner) => value = inner,
                None => return false,
            }
        }
        match self.test {
            ConditionTest::IsTrue => value.as_bool(),
            ConditionTest::IsFalse => !value.as_bool(),
            ConditionTest::Equals(expected) => value.as_discrete() == Some(expected),
        }
    }
}

/// Extract a sub-field from a map-shaped value.
///
/// Lookup order: exact key, then first key containing the pattern, then
/// recursion into nested maps. Deterministic because map iteration follows
/// key order.
fn extract_value_key<'a>(value: &'a Value, pattern: &str) -> Option<&'a Value> {
    let Value::Map(map) = value else {
        return None;
    };
    if let Some(v) = map.get(pattern) {
        return Some(v);
    }
    if let Some((_, v)) = map.iter().find(|(k, _)| k.contains(pattern)) {
        return Some(v);
    }
    map.values().find_map(|v| extract_value_key(v, pattern))
}

/// Resolved per-indicator output of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Off,
    On,
    /// Blink with the given half-period in milliseconds
    Blink(u32),
}

impl Effect {
    /// Blink interval, if any
    pub fn blink_interval(self) -> Option<u32> {
        match self {
            Effect::Blink(ms) => Some(ms),
            _ => None,
        }
    }
}

/// One mapping: condition → indicator effect, with priority and an
/// optional suppression guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Human-readable name, used only in logs
    pub name: String,
    pub indicator: Indicator,
    /// Higher wins; ties go to the first-declared mapping
    #[serde(default)]
    pub priority: i32,
    /// Effect when the condition holds; `Off` is not a valid mapped
    /// effect (an indicator with no true mapping is off by default)
    pub effect: Effect,
    pub condition: Condition,
    /// If present and true, this mapping is ineligible for the tick
    /// (e.g. PZB lamps forced dark while LZB supervision is active)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_by: Option<Condition>,
}

impl Mapping {
    pub fn new(
        name: impl Into<String>,
        indicator: Indicator,
        condition: Condition,
        effect: Effect,
    ) -> Mapping {
        Mapping {
            name: name.into(),
            indicator,
            priority: 0,
            effect,
            condition,
            suppress_by: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Mapping {
        self.priority = priority;
        self
    }

    pub fn suppressed_by(mut self, condition: Condition) -> Mapping {
        self.suppress_by = Some(condition);
        self
    }
}

/// Polling parameters a profile can override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Tick interval for the HTTP adapter and the resolution loop
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    50
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval_ms: default_poll_interval(),
        }
    }
}

/// The full mapping table for one vehicle family. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Object-class identifiers this profile applies to; matched as
    /// case-insensitive substrings of the vehicle class signal
    #[serde(default)]
    pub vehicle_classes: Vec<String>,
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub poll: PollSettings,
}

impl Profile {
    /// True if this profile covers the given vehicle object class
    pub fn matches_vehicle(&self, object_class: &str) -> bool {
        let lower = object_class.to_ascii_lowercase();
        self.vehicle_classes
            .iter()
            .any(|c| lower.contains(&c.to_ascii_lowercase()))
    }

    /// Unique signal names referenced by the mappings (primary and
    /// suppression conditions). This is the endpoint list the HTTP
    /// adapter polls.
    pub fn referenced_signals(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &String| {
            if !names.contains(name) {
                names.push(name.clone());
            }
        };
        for mapping in &self.mappings {
            push(&mapping.condition.signal);
            if let Some(guard) = &mapping.suppress_by {
                push(&guard.signal);
            }
        }
        names
    }
}

/// Pick the first profile matching the vehicle object class
pub fn select_profile<'a>(profiles: &'a [Profile], object_class: &str) -> Option<&'a Profile> {
    let selected = profiles.iter().find(|p| p.matches_vehicle(object_class));
    match selected {
        Some(p) => log::info!("Selected profile '{}' for vehicle '{}'", p.name, object_class),
        None => log::warn!("No profile matches vehicle '{}'", object_class),
    }
    selected
}

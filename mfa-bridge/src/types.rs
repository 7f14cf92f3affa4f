//! Core types for the bridge library
//!
//! Defines the signal value model shared by both source adapters and the
//! error taxonomy used across the pipeline. A snapshot is one tick's worth
//! of named values; nothing persists across ticks inside the library.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// One tick of normalized telemetry: signal name → value.
///
/// Signal names are opaque strings defined per profile (endpoint paths for
/// the HTTP adapter, fixed dotted names for the streaming adapter).
pub type SignalSnapshot = HashMap<String, Value>;

/// Errors that can occur in the pipeline
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Network or serial failure; retryable with backoff
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bad credential; not retryable, surface to the operator
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Malformed payload; log and skip the offending tick
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed binary frame; log and skip the offending frame
    #[error("Frame error: {0}")]
    Frame(String),

    /// Profile references a signal that never appears. Kept for
    /// completeness; resolution treats missing signals as condition-false
    /// instead of raising this.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors that a reconnect/backoff loop should retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::Io(_))
    }
}

/// A single telemetry value.
///
/// The simulator mixes booleans, numbers and small named records (the
/// nested "Function" results); profiles pick sub-fields out of the latter
/// with a `value_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness as the condition language sees it: false, 0, 0.0, an
    /// empty string and an empty map are false, everything else is true.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Discrete value for exact-match tests (mode selectors, lamp states).
    ///
    /// Integers always qualify; floats only when they are integral, since
    /// the simulator delivers discrete states as whole-number floats.
    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// String content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value from the HTTP envelope into a signal value
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
            // Arrays and null do not occur in instrument telemetry;
            // treat them as absent-equivalent.
            _ => Value::Bool(false),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:.3}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Map(m) => write!(f, "<map:{} keys>", m.len()),
        }
    }
}

/// Look up a signal by name, falling back to an ASCII-case-insensitive
/// scan when the exact key is absent. The HTTP API preserves case but
/// hand-written profiles occasionally do not.
pub fn lookup<'a>(snapshot: &'a SignalSnapshot, name: &str) -> Option<&'a Value> {
    if let Some(v) = snapshot.get(name) {
        return Some(v);
    }
    snapshot
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_truthiness() {
        assert!(Value::Bool(true).as_bool());
        assert!(!Value::Bool(false).as_bool());
        assert!(Value::Int(2).as_bool());
        assert!(!Value::Int(0).as_bool());
        assert!(!Value::Float(0.0).as_bool());
        assert!(Value::Text("RVM_FTF_DB_Vectron_C".into()).as_bool());
        assert!(!Value::Text(String::new()).as_bool());
        assert!(!Value::Map(BTreeMap::new()).as_bool());
    }

    #[test]
    fn test_discrete_conversion() {
        assert_eq!(Value::Int(3).as_discrete(), Some(3));
        assert_eq!(Value::Float(2.0).as_discrete(), Some(2));
        assert_eq!(Value::Float(2.5).as_discrete(), None);
        assert_eq!(Value::Text("3".into()).as_discrete(), None);
        assert_eq!(Value::Bool(true).as_discrete(), Some(1));
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"1000Hz_Active_93_ABC": true, "Mode": 3}"#).unwrap();
        let value = Value::from_json(&json);
        match value {
            Value::Map(m) => {
                assert_eq!(m.get("Mode"), Some(&Value::Int(3)));
                assert_eq!(m.get("1000Hz_Active_93_ABC"), Some(&Value::Bool(true)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut snapshot = SignalSnapshot::new();
        snapshot.insert("Pzb.Lm_500Hz".into(), Value::Int(1));
        assert!(lookup(&snapshot, "pzb.lm_500hz").is_some());
        assert!(lookup(&snapshot, "pzb.lm_2000hz").is_none());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::Transport("reset".into()).is_retryable());
        assert!(!BridgeError::Auth("403".into()).is_retryable());
        assert!(!BridgeError::Frame("short".into()).is_retryable());
    }
}

//! Polling HTTP adapter
//!
//! Talks to the simulator's external-interface HTTP API: one GET per
//! configured endpoint per tick, authenticated with a static header token
//! read once at connect time.
//!
//! ## Path encoding
//!
//! Endpoint paths mix `/` (nodes) and `.` (properties) as separators and
//! may contain non-ASCII characters (`Ü_IsActive`) or brackets
//! (`Throttle(Lever)`) inside segments. The API rejects those literally,
//! so every segment is percent-encoded individually while the separators
//! stay untouched.
//!
//! ## Response envelope
//!
//! `{"Result": "Success", "Values": {<property name>: <value>}}` — the
//! inner key repeats the property name, so extraction takes the first
//! value of the `Values` map instead of naming the key. Legacy builds wrap
//! the value one level deeper; that wrapper is unwrapped generically.

use crate::source::SignalSource;
use crate::types::{BridgeError, Result, SignalSnapshot, Value};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

/// Segment encoding: keep the characters the API treats as plain text,
/// encode everything else (including UTF-8 umlauts and brackets)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'-')
    .remove(b'~');

/// Percent-encode an endpoint path segment-wise, preserving the `/` and
/// `.` separators.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut segment = String::new();
    for ch in path.chars() {
        if ch == '/' || ch == '.' {
            out.extend(utf8_percent_encode(&segment, SEGMENT));
            out.push(ch);
            segment.clear();
        } else {
            segment.push(ch);
        }
    }
    out.extend(utf8_percent_encode(&segment, SEGMENT));
    out
}

/// Default endpoint that identifies the driven vehicle
pub const OBJECT_CLASS_ENDPOINT: &str = "CurrentFormation/0.ObjectClass";

/// Connection parameters for the HTTP adapter
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Static API key sent as the auth header on every request
    pub api_key: String,
    pub request_timeout: Duration,
}

impl HttpConfig {
    pub fn new(host: impl Into<String>, port: u16, api_key: impl Into<String>) -> HttpConfig {
        HttpConfig {
            host: host.into(),
            port,
            api_key: api_key.into(),
            request_timeout: Duration::from_millis(1500),
        }
    }
}

/// The polling HTTP signal source
pub struct HttpSource {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    endpoints: Vec<String>,
}

impl HttpSource {
    /// Connect and verify the credential with a probe request.
    ///
    /// A 403 here (or later) is an [`BridgeError::Auth`] and must not be
    /// retried; connection failures are retryable `Transport` errors.
    pub fn connect(config: &HttpConfig, endpoints: Vec<String>) -> Result<HttpSource> {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .build();
        let source = HttpSource {
            agent,
            base_url: format!("http://{}:{}", config.host, config.port),
            api_key: config.api_key.clone(),
            endpoints,
        };
        // Probe: /info answers on any live instance and validates the key
        source.request("/info")?;
        log::info!("Connected to simulator API at {}", source.base_url);
        Ok(source)
    }

    /// Raw GET returning the parsed JSON body
    fn request(&self, route: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, route);
        let response = self
            .agent
            .get(&url)
            .set("DTGCommKey", &self.api_key)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(403, _) => {
                    BridgeError::Auth("API key rejected (403 Forbidden)".to_string())
                }
                ureq::Error::Status(code, _) => {
                    BridgeError::Protocol(format!("HTTP {} from {}", code, route))
                }
                ureq::Error::Transport(t) => BridgeError::Transport(t.to_string()),
            })?;
        response
            .into_json()
            .map_err(|e| BridgeError::Protocol(format!("Invalid JSON from {}: {}", route, e)))
    }

    /// GET one endpoint value, unwrapping the response envelope
    pub fn get_value(&self, endpoint: &str) -> Result<Value> {
        let body = self.request(&format!("/get/{}", encode_path(endpoint)))?;
        unwrap_envelope(&body).ok_or_else(|| {
            BridgeError::Protocol(format!("Empty value envelope for {}", endpoint))
        })
    }

    /// Read the vehicle object class, used for profile selection
    pub fn detect_vehicle(&self) -> Result<Option<String>> {
        match self.get_value(OBJECT_CLASS_ENDPOINT) {
            Ok(value) => Ok(value.as_text().map(str::to_string)),
            Err(BridgeError::Auth(e)) => Err(BridgeError::Auth(e)),
            Err(e) => {
                // Not driving yet: the node answers with an error body
                log::debug!("Vehicle detection unavailable: {}", e);
                Ok(None)
            }
        }
    }
}

/// Extract the payload value from the `{"Result", "Values"}` envelope.
///
/// The first member of `Values` wins, whatever its key. When the API
/// additionally wraps the payload in a single-entry object (legacy
/// convention), that one level is unwrapped too — again without naming
/// the key, unless the inner object has several members (a genuine record
/// the profiles address with `value_key`).
pub fn unwrap_envelope(body: &serde_json::Value) -> Option<Value> {
    let values = body.get("Values")?.as_object()?;
    let first = values.values().next()?;
    match first {
        serde_json::Value::Object(inner) if inner.len() == 1 => {
            inner.values().next().map(Value::from_json)
        }
        other => Some(Value::from_json(other)),
    }
}

impl SignalSource for HttpSource {
    /// One GET per endpoint. Endpoints that answer with protocol errors
    /// (vehicle not driven, component absent on this train) are skipped
    /// for the tick; the tick fails only when the transport itself does.
    fn poll(&mut self) -> Result<SignalSnapshot> {
        let mut snapshot = SignalSnapshot::new();
        let mut transport_errors = 0usize;
        for endpoint in &self.endpoints {
            match self.request(&format!("/get/{}", encode_path(endpoint))) {
                Ok(body) => {
                    if let Some(value) = unwrap_envelope(&body) {
                        snapshot.insert(endpoint.clone(), value);
                    }
                }
                Err(BridgeError::Auth(e)) => return Err(BridgeError::Auth(e)),
                Err(BridgeError::Transport(e)) => {
                    transport_errors += 1;
                    log::debug!("Transport error on {}: {}", endpoint, e);
                }
                Err(e) => {
                    log::debug!("Skipping endpoint {}: {}", endpoint, e);
                }
            }
        }
        if snapshot.is_empty() && transport_errors > 0 {
            return Err(BridgeError::Transport(format!(
                "All {} endpoint requests failed",
                self.endpoints.len()
            )));
        }
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("{} ({} endpoints)", self.base_url, self.endpoints.len())
    }
}

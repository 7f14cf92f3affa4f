//! Streaming binary TCP adapter
//!
//! Connects to the simulator's cab-data TCP service, performs the
//! three-step handshake (HELLO → ACK → SUBSCRIBE → ACK) and then consumes
//! a continuous stream of length-prefixed frames.
//!
//! ## Wire format (little-endian)
//!
//! ```text
//! frame  := [u16 frame_type][u16 length][payload]
//! record := [u16 id][u16 length][body]
//! ```
//!
//! A frame payload is a sequence of records. Record ids with the high bit
//! set are nodes whose body is again a sequence of records; all others
//! are attributes carrying a raw value. Parsing recurses over the bytes
//! remaining at each nesting level: a record that declares more bytes
//! than its parent has left, or a level with trailing bytes shorter than
//! a record header, is a `Frame` error. Unknown frame types, nodes and
//! attributes are skipped by length, never failed.
//!
//! Only the instrument-panel frame is decoded; its fields accumulate in a
//! [`PanelState`] (the stream sends deltas) which flattens into the same
//! snapshot shape the HTTP adapter produces.

use crate::source::SignalSource;
use crate::types::{BridgeError, Result, SignalSnapshot, Value};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Frame types
pub const FRAME_HELLO: u16 = 0x0001;
pub const FRAME_ACK: u16 = 0x0002;
pub const FRAME_SUBSCRIBE: u16 = 0x0003;
/// Instrument-panel data, the only frame type decoded
pub const FRAME_PANEL: u16 = 0x000A;

/// High bit marks a record id as a node
pub const NODE_FLAG: u16 = 0x8000;

/// Node groups inside the panel frame
pub const NODE_PZB: u16 = 0x8001;
pub const NODE_LZB: u16 = 0x8002;
pub const NODE_SIFA: u16 = 0x8003;
pub const NODE_DOORS: u16 = 0x8004;

/// Pseudo-group for top-level attributes of the panel frame
const GROUP_ROOT: u16 = 0x0000;

/// Handshake attribute ids
const ATTR_PROTOCOL_VERSION: u16 = 0x0001;
const ATTR_CLIENT_NAME: u16 = 0x0002;
const ATTR_SUBSCRIBE_GROUP: u16 = 0x0001;

/// Supported protocol version, announced in HELLO
pub const PROTOCOL_VERSION: u16 = 2;

/// Maximum record nesting; deeper payloads are rejected as malformed
const MAX_DEPTH: usize = 8;

/// Lamp-state scale used by all `lm_*` attributes
pub mod lamp {
    pub const OFF: i64 = 0;
    pub const ON: i64 = 1;
    pub const BLINK: i64 = 2;
    pub const BLINK_INVERTED: i64 = 3;
    pub const DARK: i64 = 4;
}

/// Flat signal names emitted by this adapter. Profiles targeting the
/// streaming protocol reference these.
pub mod names {
    pub const SPEED_MS: &str = "speed_ms";
    pub const SIFA_LAMP: &str = "sifa.lamp";
    pub const SIFA_HORN: &str = "sifa.horn";
    pub const PZB_LM_1000HZ: &str = "pzb.lm_1000hz";
    pub const PZB_LM_500HZ: &str = "pzb.lm_500hz";
    pub const PZB_LM_BEFEHL: &str = "pzb.lm_befehl";
    pub const PZB_ZUGART_55: &str = "pzb.zugart_55";
    pub const PZB_ZUGART_70: &str = "pzb.zugart_70";
    pub const PZB_ZUGART_85: &str = "pzb.zugart_85";
    pub const PZB_EMERGENCY: &str = "pzb.emergency";
    pub const LZB_LM_UE: &str = "lzb.lm_ue";
    pub const LZB_LM_G: &str = "lzb.lm_g";
    pub const LZB_LM_S: &str = "lzb.lm_s";
    pub const LZB_LM_ENDE: &str = "lzb.lm_ende";
    pub const LZB_SUPERVISION: &str = "lzb.supervision";
    pub const DOORS_LEFT: &str = "doors.left";
    pub const DOORS_RIGHT: &str = "doors.right";
}

// Attribute ids per group
const ATTR_SPEED: u16 = 0x0001; // root, f32 m/s

const ATTR_PZB_LM_1000HZ: u16 = 0x0001;
const ATTR_PZB_LM_500HZ: u16 = 0x0002;
const ATTR_PZB_LM_BEFEHL: u16 = 0x0003;
const ATTR_PZB_ZUGART_55: u16 = 0x0004;
const ATTR_PZB_ZUGART_70: u16 = 0x0005;
const ATTR_PZB_ZUGART_85: u16 = 0x0006;
const ATTR_PZB_EMERGENCY: u16 = 0x0007;

const ATTR_LZB_LM_UE: u16 = 0x0001;
const ATTR_LZB_LM_G: u16 = 0x0002;
const ATTR_LZB_LM_S: u16 = 0x0003;
const ATTR_LZB_LM_ENDE: u16 = 0x0004;
const ATTR_LZB_SUPERVISION: u16 = 0x0005;

const ATTR_SIFA_LAMP: u16 = 0x0001;
const ATTR_SIFA_HORN: u16 = 0x0002;

const ATTR_DOORS_LEFT: u16 = 0x0001;
const ATTR_DOORS_RIGHT: u16 = 0x0002;

/// Accumulated instrument-panel state. The stream sends only changed
/// attributes, so this persists between frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub speed_ms: f32,
    pub sifa_lamp: bool,
    pub sifa_horn: u8,
    pub pzb_lm_1000hz: u8,
    pub pzb_lm_500hz: u8,
    pub pzb_lm_befehl: u8,
    pub pzb_zugart_55: u8,
    pub pzb_zugart_70: u8,
    pub pzb_zugart_85: u8,
    pub pzb_emergency: bool,
    pub lzb_lm_ue: u8,
    pub lzb_lm_g: u8,
    pub lzb_lm_s: u8,
    pub lzb_lm_ende: u8,
    pub lzb_supervision: bool,
    pub doors_left: u8,
    pub doors_right: u8,
}

impl PanelState {
    /// Apply one panel frame payload
    pub fn apply_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.apply_records(payload, GROUP_ROOT, 0)
    }

    fn apply_records(&mut self, buf: &[u8], group: u16, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(BridgeError::Frame(format!(
                "Record nesting exceeds {} levels",
                MAX_DEPTH
            )));
        }
        let mut rest = buf;
        while !rest.is_empty() {
            if rest.len() < 4 {
                return Err(BridgeError::Frame(format!(
                    "Truncated record header ({} trailing bytes)",
                    rest.len()
                )));
            }
            let id = LittleEndian::read_u16(&rest[0..2]);
            let len = LittleEndian::read_u16(&rest[2..4]) as usize;
            if rest.len() - 4 < len {
                return Err(BridgeError::Frame(format!(
                    "Record {:#06x} declares {} bytes, only {} available",
                    id,
                    len,
                    rest.len() - 4
                )));
            }
            let body = &rest[4..4 + len];
            if id & NODE_FLAG != 0 {
                // Unknown node groups recurse too: their attributes just
                // fall through unmatched, which skips them by length
                self.apply_records(body, id, depth + 1)?;
            } else {
                self.apply_attribute(group, id, body)?;
            }
            rest = &rest[4 + len..];
        }
        Ok(())
    }

    fn apply_attribute(&mut self, group: u16, id: u16, body: &[u8]) -> Result<()> {
        match (group, id) {
            (GROUP_ROOT, ATTR_SPEED) => self.speed_ms = attr_f32(id, body)?,
            (NODE_SIFA, ATTR_SIFA_LAMP) => self.sifa_lamp = attr_u8(id, body)? > 0,
            (NODE_SIFA, ATTR_SIFA_HORN) => self.sifa_horn = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_LM_1000HZ) => self.pzb_lm_1000hz = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_LM_500HZ) => self.pzb_lm_500hz = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_LM_BEFEHL) => self.pzb_lm_befehl = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_ZUGART_55) => self.pzb_zugart_55 = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_ZUGART_70) => self.pzb_zugart_70 = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_ZUGART_85) => self.pzb_zugart_85 = attr_u8(id, body)?,
            (NODE_PZB, ATTR_PZB_EMERGENCY) => self.pzb_emergency = attr_u8(id, body)? > 0,
            (NODE_LZB, ATTR_LZB_LM_UE) => self.lzb_lm_ue = attr_u8(id, body)?,
            (NODE_LZB, ATTR_LZB_LM_G) => self.lzb_lm_g = attr_u8(id, body)?,
            (NODE_LZB, ATTR_LZB_LM_S) => self.lzb_lm_s = attr_u8(id, body)?,
            (NODE_LZB, ATTR_LZB_LM_ENDE) => self.lzb_lm_ende = attr_u8(id, body)?,
            (NODE_LZB, ATTR_LZB_SUPERVISION) => self.lzb_supervision = attr_u8(id, body)? > 0,
            (NODE_DOORS, ATTR_DOORS_LEFT) => self.doors_left = attr_u8(id, body)?,
            (NODE_DOORS, ATTR_DOORS_RIGHT) => self.doors_right = attr_u8(id, body)?,
            // Unknown attribute: skipped by length
            _ => {}
        }
        Ok(())
    }

    /// Flatten into the common snapshot shape
    pub fn to_snapshot(&self) -> SignalSnapshot {
        let mut snap = SignalSnapshot::new();
        let mut lamp = |name: &str, state: u8| {
            snap.insert(name.to_string(), Value::Int(i64::from(state)));
        };
        lamp(names::PZB_LM_1000HZ, self.pzb_lm_1000hz);
        lamp(names::PZB_LM_500HZ, self.pzb_lm_500hz);
        lamp(names::PZB_LM_BEFEHL, self.pzb_lm_befehl);
        lamp(names::PZB_ZUGART_55, self.pzb_zugart_55);
        lamp(names::PZB_ZUGART_70, self.pzb_zugart_70);
        lamp(names::PZB_ZUGART_85, self.pzb_zugart_85);
        lamp(names::LZB_LM_UE, self.lzb_lm_ue);
        lamp(names::LZB_LM_G, self.lzb_lm_g);
        lamp(names::LZB_LM_S, self.lzb_lm_s);
        lamp(names::LZB_LM_ENDE, self.lzb_lm_ende);
        lamp(names::SIFA_HORN, self.sifa_horn);
        lamp(names::DOORS_LEFT, self.doors_left);
        lamp(names::DOORS_RIGHT, self.doors_right);
        snap.insert(names::SPEED_MS.into(), Value::Float(f64::from(self.speed_ms)));
        snap.insert(names::SIFA_LAMP.into(), Value::Bool(self.sifa_lamp));
        snap.insert(names::PZB_EMERGENCY.into(), Value::Bool(self.pzb_emergency));
        snap.insert(names::LZB_SUPERVISION.into(), Value::Bool(self.lzb_supervision));
        snap
    }
}

fn attr_u8(id: u16, body: &[u8]) -> Result<u8> {
    body.first().copied().ok_or_else(|| {
        BridgeError::Frame(format!("Attribute {:#06x} has an empty body", id))
    })
}

fn attr_f32(id: u16, body: &[u8]) -> Result<f32> {
    if body.len() != 4 {
        return Err(BridgeError::Frame(format!(
            "Attribute {:#06x} expects 4 bytes, got {}",
            id,
            body.len()
        )));
    }
    Ok(LittleEndian::read_f32(body))
}

/// Build one `[id][len][body]` record
pub fn record(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Build one complete `[type][len][payload]` frame
pub fn frame(frame_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&frame_type.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Connection parameters for the streaming adapter
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    /// Client name announced in the HELLO frame
    pub client_name: String,
    /// Read timeout; an idle stream past this is a transport error
    pub read_timeout: Duration,
}

impl StreamConfig {
    pub fn new(host: impl Into<String>, port: u16) -> StreamConfig {
        StreamConfig {
            host: host.into(),
            port,
            client_name: "mfa-bridge".to_string(),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// The streaming TCP signal source
pub struct StreamSource {
    stream: TcpStream,
    state: PanelState,
    peer: String,
}

impl StreamSource {
    /// Connect and run the handshake: HELLO, await ACK, SUBSCRIBE (the
    /// four panel groups), await ACK.
    pub fn connect(config: &StreamConfig) -> Result<StreamSource> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = TcpStream::connect(&addr)
            .map_err(|e| BridgeError::Transport(format!("Connect to {}: {}", addr, e)))?;
        stream
            .set_read_timeout(Some(config.read_timeout))
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let mut source = StreamSource {
            stream,
            state: PanelState::default(),
            peer: addr,
        };

        let mut hello = Vec::new();
        hello.extend(record(ATTR_PROTOCOL_VERSION, &PROTOCOL_VERSION.to_le_bytes()));
        hello.extend(record(ATTR_CLIENT_NAME, config.client_name.as_bytes()));
        source.write_frame(FRAME_HELLO, &hello)?;
        source.expect_ack("HELLO")?;

        let mut subscribe = Vec::new();
        for group in [NODE_PZB, NODE_LZB, NODE_SIFA, NODE_DOORS] {
            subscribe.extend(record(ATTR_SUBSCRIBE_GROUP, &group.to_le_bytes()));
        }
        source.write_frame(FRAME_SUBSCRIBE, &subscribe)?;
        source.expect_ack("SUBSCRIBE")?;

        log::info!("Stream handshake complete with {}", source.peer);
        Ok(source)
    }

    fn write_frame(&mut self, frame_type: u16, payload: &[u8]) -> Result<()> {
        self.stream
            .write_all(&frame(frame_type, payload))
            .map_err(|e| BridgeError::Transport(format!("Write to {}: {}", self.peer, e)))
    }

    /// Read one complete frame, reassembling across partial socket reads
    fn read_frame(&mut self) -> Result<(u16, Vec<u8>)> {
        let mut header = [0u8; 4];
        self.stream
            .read_exact(&mut header)
            .map_err(|e| BridgeError::Transport(format!("Read from {}: {}", self.peer, e)))?;
        let frame_type = LittleEndian::read_u16(&header[0..2]);
        let length = LittleEndian::read_u16(&header[2..4]) as usize;
        let mut payload = vec![0u8; length];
        self.stream
            .read_exact(&mut payload)
            .map_err(|e| BridgeError::Transport(format!("Read from {}: {}", self.peer, e)))?;
        Ok((frame_type, payload))
    }

    fn expect_ack(&mut self, step: &str) -> Result<()> {
        let (frame_type, _) = self.read_frame()?;
        if frame_type != FRAME_ACK {
            return Err(BridgeError::Protocol(format!(
                "Expected ACK after {}, got frame type {:#06x}",
                step, frame_type
            )));
        }
        Ok(())
    }
}

impl SignalSource for StreamSource {
    /// Block until the next instrument-panel frame; other frame types are
    /// skipped by their declared length.
    fn poll(&mut self) -> Result<SignalSnapshot> {
        loop {
            let (frame_type, payload) = self.read_frame()?;
            if frame_type != FRAME_PANEL {
                log::trace!(
                    "Skipping frame type {:#06x} ({} bytes)",
                    frame_type,
                    payload.len()
                );
                continue;
            }
            self.state.apply_frame(&payload)?;
            return Ok(self.state.to_snapshot());
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}

//! Loopback test for the streaming adapter: a minimal fake simulator on
//! 127.0.0.1 serves the handshake and a few frames, and the adapter is
//! driven through its public API.

use mfa_bridge::source::stream::{
    self, frame, lamp, names, record, StreamConfig, StreamSource, FRAME_ACK, FRAME_HELLO,
    FRAME_PANEL, FRAME_SUBSCRIBE, NODE_PZB,
};
use mfa_bridge::{SignalSource, Value};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

fn read_frame(stream: &mut impl Read) -> (u16, Vec<u8>) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let frame_type = u16::from_le_bytes([header[0], header[1]]);
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();
    (frame_type, payload)
}

#[test]
fn handshake_then_panel_frames_skipping_unknown_types() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        let (frame_type, _) = read_frame(&mut sock);
        assert_eq!(frame_type, FRAME_HELLO);
        sock.write_all(&frame(FRAME_ACK, &[])).unwrap();

        let (frame_type, payload) = read_frame(&mut sock);
        assert_eq!(frame_type, FRAME_SUBSCRIBE);
        assert!(!payload.is_empty(), "subscription must request groups");
        sock.write_all(&frame(FRAME_ACK, &[])).unwrap();

        // An unrelated frame type first: the client must skip it by length
        sock.write_all(&frame(0x00F0, &[9, 9, 9, 9])).unwrap();

        // Then a panel frame: PZB 1000Hz lamp steady, split across two
        // writes to force reassembly of a partial read
        let pzb = record(0x0001, &[lamp::ON as u8]);
        let panel = frame(FRAME_PANEL, &record(NODE_PZB, &pzb));
        let (head, tail) = panel.split_at(3);
        sock.write_all(head).unwrap();
        sock.flush().unwrap();
        thread::yield_now();
        sock.write_all(tail).unwrap();

        // A second panel frame clears the lamp again
        let pzb = record(0x0001, &[lamp::OFF as u8]);
        let panel = frame(FRAME_PANEL, &record(NODE_PZB, &pzb));
        sock.write_all(&panel).unwrap();
    });

    let config = StreamConfig::new(addr.ip().to_string(), addr.port());
    let mut source = StreamSource::connect(&config).unwrap();
    assert!(source.describe().contains("tcp://"));

    let snap = source.poll().unwrap();
    assert_eq!(snap.get(names::PZB_LM_1000HZ), Some(&Value::Int(stream::lamp::ON)));

    let snap = source.poll().unwrap();
    assert_eq!(snap.get(names::PZB_LM_1000HZ), Some(&Value::Int(stream::lamp::OFF)));

    server.join().unwrap();
}

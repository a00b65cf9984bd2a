//! Scripted replication source: accepts one connection per session script,
//! plays the steps, then hangs up.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread::{self, JoinHandle},
};

use tether_wire::{
    FrameHeader, HEADER_SIZE, IN_SYNC, PADDED, RESUME_REQUEST_SIZE, SYNC_IDX, decode_resume,
    encode_data_frame,
};

/// One scripted action within a source session.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Step {
    /// Read the 8-byte resume request and assert its value.
    ExpectResume(i64),
    Data { index: i64, payload: Vec<u8> },
    /// A data frame cut off after `keep` payload bytes; the session then
    /// drops immediately.
    PartialData { index: i64, payload: Vec<u8>, keep: usize },
    Heartbeat,
    Padding,
    SyncAck(i64),
    /// A raw header with an arbitrary size field.
    RawHeader { size: i32, index: i64 },
    /// Send nothing and hold the session open until the peer hangs up.
    Silence,
}

pub struct ScriptedSource {
    addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedSource {
    pub fn spawn(sessions: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind source");
        let addr = listener.local_addr().expect("source addr");
        let handle = thread::spawn(move || {
            for session in sessions {
                let Ok((mut sock, _)) = listener.accept() else { return };
                run_session(&mut sock, &session);
            }
        });
        Self { addr, handle: Some(handle) }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for all sessions to play out; surfaces source-side assertion
    /// failures. Call after the sink side is closed.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("source thread panicked");
        }
    }
}

fn run_session(sock: &mut TcpStream, steps: &[Step]) {
    for step in steps {
        match step {
            Step::ExpectResume(expected) => {
                let mut request = [0u8; RESUME_REQUEST_SIZE];
                sock.read_exact(&mut request).expect("read resume request");
                assert_eq!(decode_resume(request), *expected, "resume request mismatch");
            }
            Step::Data { index, payload } => {
                sock.write_all(&encode_data_frame(*index, payload)).expect("write data frame");
            }
            Step::PartialData { index, payload, keep } => {
                let frame = encode_data_frame(*index, payload);
                sock.write_all(&frame[..HEADER_SIZE + keep]).expect("write partial frame");
                return;
            }
            Step::Heartbeat => control(sock, IN_SYNC, 0),
            Step::Padding => control(sock, PADDED, 0),
            Step::SyncAck(index) => control(sock, SYNC_IDX, *index),
            Step::RawHeader { size, index } => control(sock, *size, *index),
            Step::Silence => {
                hold(sock);
                return;
            }
        }
    }
    // trailing heartbeats keep the sink's header look-ahead fed
    for _ in 0..4 {
        control(sock, IN_SYNC, 0);
    }
    hold(sock);
}

fn control(sock: &mut TcpStream, size: i32, index: i64) {
    sock.write_all(&FrameHeader { size, index }.encode()).expect("write control frame");
}

/// Keeps the session open until the sink hangs up, draining whatever it
/// still writes.
fn hold(sock: &mut TcpStream) {
    let mut scratch = [0u8; 64];
    while matches!(sock.read(&mut scratch), Ok(n) if n > 0) {}
}

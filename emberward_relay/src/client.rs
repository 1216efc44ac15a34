// TCP client for connecting to the multiplayer relay.
//
// Provides a non-blocking interface for the game's main thread to talk to
// the relay server. Architecture:
// - `connect()` performs TCP connect + Hello handshake on the calling thread,
//   then spawns a background reader thread.
// - The reader thread calls `read_message()` in a loop, deserializes
//   `ServerMessage`, and pushes into an `mpsc` channel.
// - The main thread holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox non-blocking, returning all queued messages.
//
// This separation ensures the main thread never blocks on network I/O. The
// reader thread handles the blocking reads, and the writer flushes
// synchronously (acceptable for the small messages we send).
//
// This module lives in the relay crate (not the sync crate) because it has
// zero game dependencies — it's purely std TCP + protocol framing + mpsc.
// Living here makes it available to any crate (including integration tests)
// without pulling in game logic.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use emberward_protocol::framing::{read_message, write_message};
use emberward_protocol::message::{ClientMessage, PROTOCOL_VERSION, RoomEvent, ServerMessage};
use emberward_protocol::types::{PeerId, RoomId};

/// TCP client for relay communication.
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    peer_id: PeerId,
}

impl NetClient {
    /// Connect to a relay server, perform the Hello handshake, and spawn a
    /// reader thread. Returns the client on success; the assigned peer id is
    /// available via `peer_id()`.
    pub fn connect(addr: &str, player_name: &str) -> Result<Self, String> {
        // TCP connect.
        let stream = TcpStream::connect(addr).map_err(|e| format!("connect failed: {e}"))?;

        // Set a read timeout for the handshake.
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .ok();

        let reader_stream = stream
            .try_clone()
            .map_err(|e| format!("clone failed: {e}"))?;
        let mut writer = BufWriter::new(stream);

        // Send Hello.
        let hello = ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            player_name: player_name.into(),
        };
        send_msg(&mut writer, &hello).map_err(|e| format!("send Hello failed: {e}"))?;

        // Read Welcome or Rejected.
        let mut reader = BufReader::new(reader_stream);
        let response_bytes =
            read_message(&mut reader).map_err(|e| format!("read Welcome failed: {e}"))?;
        let response: ServerMessage = serde_json::from_slice(&response_bytes)
            .map_err(|e| format!("parse Welcome failed: {e}"))?;

        let peer_id = match response {
            ServerMessage::Welcome { peer_id } => peer_id,
            ServerMessage::Rejected { reason } => {
                return Err(format!("rejected: {reason}"));
            }
            other => {
                return Err(format!("unexpected response: {other:?}"));
            }
        };

        // Clear read timeout for the long-lived reader loop.
        if let Ok(inner) = reader.get_ref().try_clone() {
            inner.set_read_timeout(None).ok();
        }

        // Spawn reader thread.
        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(reader, tx);
        });

        Ok(Self {
            writer,
            inbox: rx,
            _reader_thread: Some(reader_thread),
            peer_id,
        })
    }

    /// The transport identity assigned by the relay at handshake.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Ask the relay to pair us with an opponent.
    pub fn send_queue(&mut self) -> Result<(), String> {
        send_msg(&mut self.writer, &ClientMessage::Queue)
            .map_err(|e| format!("send Queue failed: {e}"))
    }

    /// Send a room event for fan-out to the other room member.
    pub fn send_room_event(&mut self, room: &RoomId, event: RoomEvent) -> Result<(), String> {
        let msg = ClientMessage::Room {
            room: room.clone(),
            event,
        };
        send_msg(&mut self.writer, &msg).map_err(|e| format!("send Room failed: {e}"))
    }

    /// Send Goodbye and close the connection.
    pub fn disconnect(&mut self) {
        let _ = send_msg(&mut self.writer, &ClientMessage::Goodbye);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

/// Serialize a `ClientMessage` to JSON and write with length-delimited framing.
fn send_msg(writer: &mut BufWriter<TcpStream>, msg: &ClientMessage) -> Result<(), String> {
    let json = serde_json::to_vec(msg).map_err(|e| e.to_string())?;
    write_message(writer, &json).map_err(|e| e.to_string())
}

/// Reader thread: read framed messages in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(bytes) = read_message(&mut reader) {
        match serde_json::from_slice::<ServerMessage>(&bytes) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break; // Main thread dropped the receiver
                }
            }
            Err(_) => break, // Malformed message
        }
    }
}

// TCP server and main event loop for the relay.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per peer): call `framing::read_message()` in a
//   loop, deserialize `ClientMessage`, and send `InternalEvent::MessageFrom`
//   to the main thread. On error/EOF, send `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Lobby`, receives events from the channel, and
//   dispatches them. There is no periodic work — snapshot pacing and wave
//   timing live entirely on the peers — so the `recv_timeout` only exists to
//   re-check the shutdown flag.
//
// The main thread is the only writer to peer TCP streams (via the lobby's
// send helpers). Reader threads only read from streams. This avoids
// concurrent read/write on the same `TcpStream`, which is safe on most
// platforms but fragile.
//
// Shutdown: the main thread checks a `keep_running` flag (set to false by
// `RelayHandle::stop`) and breaks out of the event loop.

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use emberward_protocol::framing::{read_message, write_message};
use emberward_protocol::message::{ClientMessage, PROTOCOL_VERSION, ServerMessage};
use emberward_protocol::types::PeerId;

use crate::lobby::Lobby;

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    MessageFrom {
        peer_id: PeerId,
        message: ClientMessage,
    },
    Disconnected {
        peer_id: PeerId,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a relay server.
pub struct RelayConfig {
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

/// Start the relay server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_relay(config: RelayConfig) -> std::io::Result<(RelayHandle, std::net::SocketAddr)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_relay(listener, keep_running_clone);
    });

    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(listener: TcpListener, keep_running: Arc<AtomicBool>) {
    let mut lobby = Lobby::new();

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Set the listener to non-blocking so the accept thread can check
    // keep_running periodically.
    listener.set_nonblocking(true).ok();

    // Listener thread: accepts new connections.
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(_) => break,
            }
        }
    });

    // Main event loop. The timeout only bounds how long a shutdown request
    // can go unnoticed.
    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                handle_event(&mut lobby, event, &tx, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut lobby, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Dispatch a single event to the lobby.
fn handle_event(
    lobby: &mut Lobby,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(lobby, stream, tx, keep_running);
        }
        InternalEvent::MessageFrom { peer_id, message } => {
            handle_message(lobby, &peer_id, message);
        }
        InternalEvent::Disconnected { peer_id } => {
            lobby.remove_peer(&peer_id);
        }
    }
}

/// Handle a new TCP connection: read the Hello handshake, add the peer to
/// the lobby, and spawn a reader thread.
fn handle_new_connection(
    lobby: &mut Lobby,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    // Set a read timeout so the handshake doesn't block forever.
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok();

    // Read the Hello message.
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });

    let hello_bytes = match read_message(&mut reader) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };

    let hello: ClientMessage = match serde_json::from_slice(&hello_bytes) {
        Ok(msg) => msg,
        Err(_) => return,
    };

    match hello {
        ClientMessage::Hello {
            protocol_version,
            player_name,
        } => {
            if protocol_version != PROTOCOL_VERSION {
                reject(stream, "protocol version mismatch");
                return;
            }

            // Try to clone the stream for the lobby's write half.
            let write_stream = match stream.try_clone() {
                Ok(s) => s,
                Err(_) => return,
            };

            let peer_id = lobby.add_peer(player_name, write_stream);

            // Clear read timeout for the long-lived reader loop.
            stream.set_read_timeout(None).ok();

            // Spawn a reader thread for this peer.
            let tx_reader = tx.clone();
            let keep_running_reader = keep_running.clone();
            thread::spawn(move || {
                reader_loop(reader, peer_id, tx_reader, keep_running_reader);
            });
        }
        _ => {
            reject(stream, "expected Hello as first message");
        }
    }
}

/// Send `Rejected` and drop the connection.
fn reject(stream: TcpStream, reason: &str) {
    let rejected = ServerMessage::Rejected {
        reason: reason.into(),
    };
    if let Ok(json) = serde_json::to_vec(&rejected) {
        let mut writer = std::io::BufWriter::new(stream);
        let _ = write_message(&mut writer, &json);
    }
}

/// Reader loop for a single peer. Runs in its own thread.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    peer_id: PeerId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match read_message(&mut reader) {
            Ok(bytes) => match serde_json::from_slice::<ClientMessage>(&bytes) {
                Ok(ClientMessage::Goodbye) => {
                    let _ = tx.send(InternalEvent::Disconnected {
                        peer_id: peer_id.clone(),
                    });
                    break;
                }
                Ok(message) => {
                    let _ = tx.send(InternalEvent::MessageFrom {
                        peer_id: peer_id.clone(),
                        message,
                    });
                }
                Err(_) => {
                    // Malformed message — disconnect.
                    let _ = tx.send(InternalEvent::Disconnected {
                        peer_id: peer_id.clone(),
                    });
                    break;
                }
            },
            Err(_) => {
                // Read error or EOF — disconnect.
                let _ = tx.send(InternalEvent::Disconnected {
                    peer_id: peer_id.clone(),
                });
                break;
            }
        }
    }
}

/// Handle a client message that isn't Hello or Goodbye (those are handled
/// during connection setup and in the reader loop respectively).
fn handle_message(lobby: &mut Lobby, peer_id: &PeerId, message: ClientMessage) {
    match message {
        ClientMessage::Queue => {
            lobby.queue_peer(peer_id);
        }
        ClientMessage::Room { room, event } => {
            lobby.relay_room_event(peer_id, &room, event);
        }
        ClientMessage::Hello { .. } | ClientMessage::Goodbye => {
            // Hello is handled during connection setup, Goodbye in the reader loop.
        }
    }
}

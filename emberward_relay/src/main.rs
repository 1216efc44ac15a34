// CLI entry point for the Emberward multiplayer relay.
//
// Starts a standalone relay server that game peers connect to. The relay
// pairs queued peers into rooms and forwards room events between them — it
// never runs game logic. See `server.rs` for the networking architecture and
// `lobby.rs` for the pairing state.
//
// Usage:
//   relay [OPTIONS]
//     --port <PORT>    Listen port (default: 3001)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emberward_relay::server::{RelayConfig, start_relay};

fn main() {
    let config = parse_args();

    let (handle, addr) = match start_relay(config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start relay: {e}");
            std::process::exit(1);
        }
    };

    println!("Relay listening on {addr}");
    println!("Press Ctrl+C to stop.");

    // Wait for Ctrl+C.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc_wait(running_clone);

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    println!("\nShutting down...");
    handle.stop();
}

/// Parse command-line arguments into a `RelayConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> RelayConfig {
    let mut config = RelayConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: relay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>    Listen port (default: 3001)");
    println!("  --help, -h       Show this help");
}

/// Block until Ctrl+C is pressed, then set the flag to false.
fn ctrlc_wait(running: Arc<AtomicBool>) {
    // The process exits on SIGINT/SIGTERM by default, which is fine for a
    // relay — there is no on-disk state to flush. If more graceful shutdown
    // is needed later, add the `ctrlc` crate.
    let _ = running;
}

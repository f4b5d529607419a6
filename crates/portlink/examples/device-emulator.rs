//! Emulated four-port device on a Unix socket.
//!
//! Run with:
//!   cargo run --example device-emulator
//!
//! In another terminal:
//!   cargo run --features cli -- send <printed socket path> 1 2 3 4

use std::fs;

use portlink::frame::{LinkResponder, Outcome, OutputPorts};
use portlink::transport::UnixDomainSocket;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("portlink-device-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("device.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Device listening on {}", sock_path.display());

    let ports = OutputPorts::new();
    let link = listener.accept()?;
    let mut responder = LinkResponder::new(link, ports.clone());

    loop {
        let polled = responder.poll(|ingest| {
            if let Outcome::Applied(frame) = ingest.outcome {
                eprintln!("ports <- {:02X?}", frame.payload);
            }
        });
        if let Err(e) = polled {
            eprintln!("Host disconnected: {e}");
            break;
        }
    }

    eprintln!("final ports: {:02X?}", ports.snapshot());
    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}

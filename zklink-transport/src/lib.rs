//! Transport layer for terminal communication
//!
//! Owns the socket and moves raw command frames. The TCP transport wraps
//! every outgoing frame in the 8-byte envelope and strips it (caching the
//! declared length) on receive; the UDP transport exchanges bare frames
//! as single datagrams.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tracing::debug;

/// Transport trait for the two communication methods
#[async_trait]
pub trait Transport: Send {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Close the socket
    async fn close(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Stream transport? Governs envelope handling and chunk sizing
    fn is_tcp(&self) -> bool;

    /// Send one command frame (the TCP impl prepends the envelope)
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Receive one reply
    ///
    /// Reads up to `expected + 8` bytes on TCP — the device may pack
    /// trailing data beyond the declared length — and up to `expected` on
    /// UDP. On TCP the envelope is validated and stripped, and its
    /// declared length is cached for [`tcp_length`](Self::tcp_length).
    async fn recv(&mut self, expected: usize, timeout: Duration) -> Result<BytesMut>;

    /// Declared inner length from the most recent TCP receive (0 on UDP)
    fn tcp_length(&self) -> u32;

    /// Read exactly `n` raw bytes from the stream (TCP only)
    async fn recv_exact(&mut self, n: usize, timeout: Duration) -> Result<BytesMut>;

    /// Non-blocking raw read of up to `max` bytes
    ///
    /// Returns `Ok(None)` when no data is pending (would-block), which is
    /// the normal idle case while polling for live events.
    fn try_recv(&mut self, max: usize) -> Result<Option<BytesMut>>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}

/// Open a transport to `address:port`
///
/// Tries TCP first and falls back to a UDP socket on any connect
/// failure; `force_udp` skips the TCP attempt. The returned transport is
/// already connected and never changes mode afterwards.
pub async fn open(
    address: &str,
    port: u16,
    timeout: Duration,
    force_udp: bool,
) -> Result<Box<dyn Transport>> {
    if !force_udp {
        let mut tcp = TcpTransport::new(address, port).with_connect_timeout(timeout);
        match tcp.connect().await {
            Ok(()) => return Ok(Box::new(tcp)),
            Err(e) => {
                debug!("TCP connect to {address}:{port} failed ({e}), falling back to UDP");
            }
        }
    }

    let mut udp = UdpTransport::new(address, port);
    udp.connect().await?;
    Ok(Box::new(udp))
}

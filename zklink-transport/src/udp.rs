//! UDP transport
//!
//! Older terminals speak bare datagrams on port 4370; the frame format
//! is the same as TCP minus the envelope.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// UDP transport
pub struct UdpTransport {
    addr: String,
    port: u16,
    socket: Option<UdpSocket>,
    remote: Option<SocketAddr>,
}

impl UdpTransport {
    /// Create new UDP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket: None,
            remote: None,
        }
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.remote {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();

        let addr = addrs
            .first()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.remote = Some(*addr);
        Ok(*addr)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let remote = self.resolve_addr().await?;

        debug!("Connecting to {} via UDP...", remote);

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(Error::Io)?;

        // Pin the peer so plain send/recv apply
        socket.connect(remote).await.map_err(Error::Io)?;

        self.socket = Some(socket);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Disconnecting from {}...", self.remote_addr());
        }

        self.remote = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn is_tcp(&self) -> bool {
        false
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        trace!(
            "Sending {} bytes via UDP: {:02X?}",
            frame.len(),
            &frame[..frame.len().min(24)]
        );

        socket.send(frame).await.map_err(Error::Io)?;

        Ok(())
    }

    async fn recv(&mut self, expected: usize, deadline: Duration) -> Result<BytesMut> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(expected);

        let n = timeout(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                warn!("UDP read timeout");
                Error::ReadTimeout
            })?
            .map_err(Error::Io)?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        buf.truncate(n);

        trace!("Received {} bytes via UDP: {:02X?}", n, &buf[..n.min(24)]);

        Ok(buf)
    }

    fn tcp_length(&self) -> u32 {
        0
    }

    async fn recv_exact(&mut self, _n: usize, _deadline: Duration) -> Result<BytesMut> {
        Err(Error::StreamRequired)
    }

    fn try_recv(&mut self, max: usize) -> Result<Option<BytesMut>> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(max);
        match socket.try_recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!("try_recv picked up {} bytes", n);
                Ok(Some(buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn remote_addr(&self) -> String {
        self.remote
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

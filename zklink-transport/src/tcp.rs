//! TCP transport

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use zklink_core::packet::{tcp_top, test_tcp_top};
use zklink_core::TCP_TOP_SIZE;

use crate::{error::*, Transport};

/// TCP transport
///
/// Every outgoing frame is wrapped in the 8-byte envelope; incoming
/// replies are validated against the envelope magics and returned with
/// the envelope stripped.
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    last_tcp_length: u32,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
            last_tcp_length: 0,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
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

        self.socket_addr = Some(*addr);
        Ok(*addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());

            let _ = stream.shutdown().await;
        }

        self.socket_addr = None;
        self.last_tcp_length = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn is_tcp(&self) -> bool {
        true
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let wrapped = tcp_top(frame);

        trace!(
            "Sending {} bytes: {:02X?}",
            wrapped.len(),
            &wrapped[..wrapped.len().min(24)]
        );

        stream.write_all(&wrapped).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn recv(&mut self, expected: usize, deadline: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(expected + TCP_TOP_SIZE);

        let n = timeout(deadline, stream.read(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        buf.truncate(n);

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(24)]);

        let declared = test_tcp_top(&buf);
        if declared == 0 {
            warn!("received frame without envelope magics");
            return Err(Error::InvalidEnvelope);
        }
        self.last_tcp_length = declared;

        let _ = buf.split_to(TCP_TOP_SIZE);
        Ok(buf)
    }

    fn tcp_length(&self) -> u32 {
        self.last_tcp_length
    }

    async fn recv_exact(&mut self, n: usize, deadline: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(n);

        trace!("expecting {} bytes of raw data", n);

        timeout(deadline, stream.read_exact(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    Error::ConnectionClosed
                } else {
                    Error::Io(e)
                }
            })?;

        Ok(buf)
    }

    fn try_recv(&mut self, max: usize) -> Result<Option<BytesMut>> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(max);
        match stream.try_read(&mut buf) {
            Ok(0) => Err(Error::ConnectionClosed),
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
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.201", 4370);
        assert!(!transport.is_connected());
        assert!(transport.is_tcp());
        assert_eq!(transport.tcp_length(), 0);
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport = TcpTransport::new("invalid..address", 4370)
            .with_connect_timeout(Duration::from_millis(100));

        let result = transport.connect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tcp_send_wraps_envelope() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16];
            sock.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut transport = TcpTransport::new(addr.ip().to_string(), addr.port());
        transport.connect().await.unwrap();
        transport.send(&[1, 2, 3, 4, 5, 6, 7, 8]).await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(&seen[..4], &[0x50, 0x50, 0x74, 0x82]);
        assert_eq!(&seen[4..8], &8u32.to_le_bytes());
        assert_eq!(&seen[8..], &[1, 2, 3, 4, 5, 6, 7, 8]);

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_recv_strips_envelope() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let frame = [0xD0u8, 0x07, 0, 0, 0x34, 0x12, 0, 0];
            let mut wire = vec![0x50, 0x50, 0x74, 0x82];
            wire.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            wire.extend_from_slice(&frame);
            sock.write_all(&wire).await.unwrap();
        });

        let mut transport = TcpTransport::new(addr.ip().to_string(), addr.port());
        transport.connect().await.unwrap();

        let inner = transport.recv(1024, Duration::from_secs(5)).await.unwrap();
        assert_eq!(transport.tcp_length(), 8);
        assert_eq!(&inner[..2], &[0xD0, 0x07]);

        transport.close().await.unwrap();
    }
}

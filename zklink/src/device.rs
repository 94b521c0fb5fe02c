//! Device session and request engine

use std::collections::VecDeque;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, info, trace, warn};

use zklink_core::auth::make_commkey;
use zklink_core::constants::{AUTH_TICKS, DEFAULT_TIMEOUT};
use zklink_core::{Command, Packet, ReplyHeader, Session, DEFAULT_PORT};
use zklink_transport::Transport;
use zklink_types::{Attendance, User, UserPacketSize};

use crate::error::{Error, Result};

/// One command/response exchange, as seen by the caller of the request
/// engine
///
/// The bulk reader inspects the reply directly instead of going through
/// session-held shared state; on TCP `tcp_length` carries the envelope's
/// declared inner length from the receive that produced this reply.
#[derive(Debug)]
pub(crate) struct Reply {
    pub header: ReplyHeader,
    pub payload: BytesMut,
    pub tcp_length: u32,
}

impl Reply {
    pub(crate) fn code(&self) -> u16 {
        self.header.code
    }
}

/// Live-capture state: the pull queue plus the frame assembly buffer
#[derive(Debug, Default)]
pub(crate) struct LiveCapture {
    pub active: bool,
    pub users: Vec<User>,
    pub buffer: BytesMut,
    pub queue: VecDeque<Attendance>,
    pub was_enabled: bool,
}

/// A session with one terminal
///
/// Owns the socket and all per-session protocol state. Every operation
/// takes `&mut self`: the protocol's session-id/reply-id pair cannot
/// survive interleaved commands.
pub struct Device {
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) timeout: Duration,
    pub(crate) password: u32,
    pub(crate) force_udp: bool,
    pub(crate) verbose: bool,

    pub(crate) transport: Option<Box<dyn Transport>>,
    pub(crate) session: Session,

    // Counters cached by read_sizes
    pub(crate) users: u32,
    pub(crate) fingers: u32,
    pub(crate) records: u32,
    pub(crate) users_capacity: u32,
    pub(crate) fingers_capacity: u32,
    pub(crate) records_capacity: u32,

    // Discovered on the first get_users and reused for writes
    pub(crate) user_packet_size: Option<UserPacketSize>,
    pub(crate) next_uid: u16,
    pub(crate) next_user_id: String,

    pub(crate) live: LiveCapture,
}

impl Device {
    /// Create a device handle (nothing is opened until [`connect`](Self::connect))
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            password: 0,
            force_udp: false,
            verbose: false,
            transport: None,
            session: Session::new(),
            users: 0,
            fingers: 0,
            records: 0,
            users_capacity: 0,
            fingers_capacity: 0,
            records_capacity: 0,
            user_packet_size: None,
            next_uid: 1,
            next_user_id: "1".into(),
            live: LiveCapture::default(),
        }
    }

    /// Create a device handle on the default port
    pub fn with_default_port(address: impl Into<String>) -> Self {
        Self::new(address, DEFAULT_PORT)
    }

    /// Set the send/receive timeout (default 60 s)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the communication password (default 0)
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    /// Skip the TCP attempt and talk UDP directly
    pub fn with_force_udp(mut self, force_udp: bool) -> Self {
        self.force_udp = force_udp;
        self
    }

    /// Emit hex dumps of every frame at trace level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
            && self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Connect and perform the handshake
    ///
    /// Opens the transport (TCP first, UDP fallback unless forced), sends
    /// CMD_CONNECT, and answers a CMD_ACK_UNAUTH challenge with the
    /// scrambled password. Any other reply code fails the connect.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        info!("connecting to {}:{}", self.address, self.port);

        let transport =
            zklink_transport::open(&self.address, self.port, self.timeout, self.force_udp).await?;
        self.transport = Some(transport);
        self.session.reset();

        let reply = self.send_command(Command::Connect, &[], 1024).await?;
        let session_id = reply.header.session_id;

        if reply.code() == Command::AckUnauth as u16 {
            debug!(session_id, "device requires authentication");
            self.session.initialize(session_id)?;

            let key = make_commkey(self.password, session_id, AUTH_TICKS);
            let auth = self.send_command(Command::Auth, &key, 1024).await?;

            if auth.code() != Command::AckOk as u16 {
                warn!(code = auth.code(), "authentication rejected");
                self.close_socket().await;
                return Err(Error::AuthenticationFailed);
            }
            self.session.authenticate()?;
        } else if reply.code() == Command::AckOk as u16 {
            self.session.initialize(session_id)?;
        } else {
            let code = reply.code();
            self.close_socket().await;
            return Err(Error::UnexpectedReply {
                command: Command::Connect.name(),
                code,
            });
        }

        info!(session_id, "connected");
        Ok(())
    }

    /// Disconnect from the device
    ///
    /// CMD_EXIT is best effort; the socket is closed regardless.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        if let Err(e) = self.send_command(Command::Exit, &[], 1024).await {
            warn!("EXIT failed during disconnect: {e}");
        }

        self.close_socket().await;
        info!("disconnected");
        Ok(())
    }

    pub(crate) async fn close_socket(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.session.close();
        self.live = LiveCapture::default();
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    pub(crate) fn transport(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or(Error::NotConnected)
    }

    /// Stream session? Governs chunk sizing and envelope handling
    pub(crate) fn tcp(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_tcp())
    }

    /// One command/response exchange
    ///
    /// Bumps the reply id, frames and sends the command, then receives
    /// and leniently parses the reply. `expected` sizes the receive
    /// buffer (the transport reads up to `expected + 8` on TCP).
    pub(crate) async fn send_command(
        &mut self,
        command: Command,
        payload: &[u8],
        expected: usize,
    ) -> Result<Reply> {
        let reply_id = self.session.next_reply_id();
        let packet = Packet::with_payload(
            command,
            self.session.session_id(),
            reply_id,
            payload.to_vec(),
        );
        let frame = packet.encode();

        if self.verbose {
            trace!("-> {:02X?}", &frame[..]);
        }

        let timeout = self.timeout;
        let transport = self.transport()?;
        transport.send(&frame).await?;

        let mut buf = transport.recv(expected, timeout).await?;
        let header = ReplyHeader::parse(&buf)?;
        let payload = buf.split_off(Packet::HEADER_SIZE);
        let tcp_length = self.transport()?.tcp_length();

        if self.verbose {
            trace!("<- {:02X?} {:02X?}", &buf[..], &payload[..]);
        }
        debug!(
            command = command.name(),
            reply_id,
            code = header.code,
            payload_len = payload.len(),
            "exchange"
        );

        Ok(Reply {
            header,
            payload,
            tcp_length,
        })
    }

    /// Exchange expecting a plain acknowledgement
    ///
    /// CMD_ACK_OK, CMD_ACK_DATA and the legacy code 2007 count as
    /// success; anything else surfaces as [`Error::UnexpectedReply`].
    pub(crate) async fn simple_command(
        &mut self,
        command: Command,
        payload: &[u8],
    ) -> Result<Reply> {
        self.ensure_connected()?;
        let reply = self.send_command(command, payload, 1024).await?;

        if reply.header.is_success() {
            Ok(reply)
        } else {
            Err(Error::UnexpectedReply {
                command: command.name(),
                code: reply.code(),
            })
        }
    }

    /// Send a bare CMD_ACK_OK frame without waiting for a reply
    ///
    /// Push frames carry the device's own session and reply ids; the ACK
    /// must echo those, not the session counters.
    pub(crate) async fn send_ack_only(&mut self, header: ReplyHeader) -> Result<()> {
        let frame = Packet::new(Command::AckOk, header.session_id, header.reply_id).encode();
        self.transport()?.send(&frame).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .field("live_capture", &self.live.active)
            .finish()
    }
}

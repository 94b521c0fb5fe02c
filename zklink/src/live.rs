//! Live attendance capture
//!
//! After CMD_REG_EVENT the device pushes event frames on the command
//! socket. The pipeline is pull-style: the caller polls
//! [`next_live_event`](Device::next_live_event), which does a
//! non-blocking read, acknowledges each push frame with the device's own
//! session/reply ids, and drains complete events from the assembly
//! buffer into a FIFO.

use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, info, trace, warn};

use zklink_core::constants::events::EF_ATTLOG;
use zklink_core::constants::UDP_CHUNK_SIZE;
use zklink_core::packet::test_tcp_top;
use zklink_core::{Command, ReplyHeader};
use zklink_types::{Attendance, LiveEvent};

use crate::device::Device;
use crate::error::{Error, Result};

impl Device {
    /// Whether the session is in live-capture mode
    pub fn is_live_capture_active(&self) -> bool {
        self.live.active
    }

    /// Register for attendance events and start polling
    ///
    /// `drain_timeout` bounds each read of the stale-event drain that
    /// runs between registration and the switch to non-blocking polling.
    /// The capture setup commands (cancel-capture, start-verify, enable)
    /// are best effort; a failed CMD_REG_EVENT aborts the start.
    pub async fn start_live_capture(&mut self, drain_timeout: Duration) -> Result<()> {
        self.ensure_connected()?;

        if self.live.active {
            debug!("live capture already active");
            return Ok(());
        }

        // Events only carry a user id; cache the list for the uid join
        let users = self.get_users().await?;
        self.live.users = users;
        self.live.buffer.clear();
        self.live.queue.clear();
        self.live.was_enabled = true;

        if let Err(e) = self.send_command(Command::CancelCapture, &[], 1024).await {
            debug!("cancel-capture before live mode failed: {e}");
        }
        if let Err(e) = self.send_command(Command::StartVerify, &[], 1024).await {
            debug!("start-verify before live mode failed: {e}");
        }
        if let Err(e) = self.enable_device().await {
            debug!("enable before live mode failed: {e}");
        }

        let flags = EF_ATTLOG.to_le_bytes();
        let reply = self.send_command(Command::RegEvent, &flags, 1024).await?;
        if !reply.header.is_success() {
            return Err(Error::UnexpectedReply {
                command: Command::RegEvent.name(),
                code: reply.code(),
            });
        }

        self.flush_stale_events(drain_timeout).await;

        self.live.active = true;
        info!("live capture started");
        Ok(())
    }

    /// Drain frames the device pushed before registration settled,
    /// acknowledging each so it is not retransmitted
    async fn flush_stale_events(&mut self, drain_timeout: Duration) {
        for _ in 0..10 {
            let frame = {
                let Ok(transport) = self.transport() else {
                    return;
                };
                match transport.recv(UDP_CHUNK_SIZE, drain_timeout).await {
                    Ok(frame) => frame,
                    // Timeout means the backlog is gone
                    Err(_) => break,
                }
            };

            debug!(len = frame.len(), "flushed stale frame");
            if let Ok(header) = ReplyHeader::parse(&frame) {
                let _ = self.send_ack_only(header).await;
            }
        }
    }

    /// Pull the next live event, if one is pending
    ///
    /// `Ok(None)` is the normal idle answer (nothing buffered, socket
    /// would block). Frames other than CMD_REG_EVENT pushes are
    /// acknowledged and discarded.
    pub async fn next_live_event(&mut self) -> Result<Option<Attendance>> {
        if !self.live.active {
            return Ok(None);
        }

        if let Some(event) = self.live.queue.pop_front() {
            return Ok(Some(event));
        }

        let raw = match self.transport()?.try_recv(UDP_CHUNK_SIZE) {
            Ok(Some(raw)) => raw,
            // Would-block: nothing pending, the caller polls again
            Ok(None) => return Ok(None),
            Err(e @ zklink_transport::Error::ConnectionClosed) => return Err(e.into()),
            Err(e) => {
                debug!("live receive error, returning empty: {e}");
                return Ok(None);
            }
        };

        if self.tcp() {
            self.ingest_tcp_push(raw).await;
        } else {
            self.ingest_udp_push(raw).await;
        }

        Ok(self.live.queue.pop_front())
    }

    /// Walk the envelopes in one TCP read; a single read may carry
    /// several push frames back to back
    async fn ingest_tcp_push(&mut self, raw: BytesMut) {
        let mut rest = &raw[..];

        while rest.len() >= 16 {
            let declared = test_tcp_top(rest) as usize;
            if declared < 8 {
                warn!("push frame without envelope magics, dropping read");
                return;
            }
            let end = (8 + declared).min(rest.len());
            let frame = &rest[8..end];
            rest = &rest[end..];

            let Ok(header) = ReplyHeader::parse(frame) else {
                continue;
            };
            if let Err(e) = self.send_ack_only(header).await {
                debug!("event ack failed: {e}");
            }

            if header.code != Command::RegEvent as u16 {
                trace!(code = header.code, "not an event frame");
                continue;
            }
            self.live.buffer.extend_from_slice(&frame[8..]);
            self.drain_event_buffer();
        }

        if !rest.is_empty() {
            debug!(len = rest.len(), "partial push frame left unread");
        }
    }

    /// One UDP datagram carries one push frame
    async fn ingest_udp_push(&mut self, raw: BytesMut) {
        if raw.len() < 8 {
            return;
        }

        let Ok(header) = ReplyHeader::parse(&raw) else {
            return;
        };
        if let Err(e) = self.send_ack_only(header).await {
            debug!("event ack failed: {e}");
        }

        if header.code != Command::RegEvent as u16 {
            trace!(code = header.code, "not an event frame");
            return;
        }
        self.live.buffer.extend_from_slice(&raw[8..]);
        self.drain_event_buffer();
    }

    /// Parse complete events off the front of the assembly buffer
    ///
    /// Stops when fewer than 10 bytes remain or the pending length
    /// matches no known frame layout (the buffer is left untouched for
    /// the next read in that case).
    fn drain_event_buffer(&mut self) {
        while self.live.buffer.len() >= 10 {
            let Some(len) = LiveEvent::frame_len(self.live.buffer.len()) else {
                trace!(
                    pending = self.live.buffer.len(),
                    "no event layout matches pending bytes"
                );
                break;
            };

            let frame = self.live.buffer.split_to(len);
            if let Some(event) = LiveEvent::parse(&frame) {
                let row = self.join_event(event);
                debug!(user_id = %row.user_id, uid = row.uid, "live event");
                self.live.queue.push_back(row);
            }
        }
    }

    /// Link an event to the cached user list; unmatched ids fall back to
    /// their numeric value
    fn join_event(&self, event: LiveEvent) -> Attendance {
        let uid = self
            .live
            .users
            .iter()
            .find(|u| u.user_id == event.user_id)
            .map(|u| u.uid as u32)
            .or_else(|| event.user_id.parse().ok())
            .unwrap_or(0);

        Attendance {
            user_id: event.user_id,
            timestamp: event.timestamp,
            status: event.status,
            punch: event.punch,
            uid,
        }
    }

    /// Unregister events and leave live-capture mode
    ///
    /// The device keeps the prior enabled state; buffered events are
    /// discarded.
    pub async fn stop_live_capture(&mut self) -> Result<()> {
        if !self.live.active {
            return Ok(());
        }

        let zero = 0u32.to_le_bytes();
        if let Err(e) = self.send_command(Command::RegEvent, &zero, 1024).await {
            warn!("event unregister failed: {e}");
        }

        if !self.live.was_enabled {
            if let Err(e) = self.disable_device().await {
                warn!("restoring disabled state failed: {e}");
            }
        }

        self.live.active = false;
        self.live.users.clear();
        self.live.buffer.clear();
        self.live.queue.clear();

        info!("live capture stopped");
        Ok(())
    }
}

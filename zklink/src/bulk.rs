//! Chunked bulk reads ("read with buffer")
//!
//! Datasets larger than one reply — the user database, the attendance
//! log, template dumps — move through a staging buffer on the device:
//!
//! 1. CMD_PREPARE_BUFFER announces the wanted dataset; the reply either
//!    carries the whole dataset inline (CMD_DATA) or declares its total
//!    size (CMD_PREPARE_DATA).
//! 2. CMD_READ_BUFFER pulls one chunk per round trip. On TCP each chunk
//!    reply is a CMD_PREPARE_DATA frame, one or more CMD_DATA frames
//!    carrying the bytes, and a trailing 16-byte CMD_ACK_OK frame; any of
//!    them may straddle socket reads, and the next frame's prefix may be
//!    tacked onto the current read. On UDP the chunk arrives as a run of
//!    1032-byte datagrams terminated by CMD_ACK_OK.
//! 3. CMD_FREE_DATA releases the staging buffer.

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace, warn};

use zklink_core::constants::{MAX_CHUNK_RETRIES, MAX_CHUNK_TCP, MAX_CHUNK_UDP, UDP_CHUNK_SIZE};
use zklink_core::packet::test_tcp_top;
use zklink_core::Command;

use crate::device::{Device, Reply};
use crate::error::{Error, Result};

impl Device {
    /// Read a complete dataset through the staging buffer
    ///
    /// Returns the raw dataset and its length. `sub_command` names the
    /// dataset (e.g. CMD_USERTEMP_RRQ), `fct` and `ext` are its
    /// parameters.
    pub(crate) async fn read_with_buffer(
        &mut self,
        sub_command: Command,
        fct: u32,
        ext: u32,
    ) -> Result<(BytesMut, usize)> {
        self.ensure_connected()?;

        let max_chunk = if self.tcp() {
            MAX_CHUNK_TCP
        } else {
            MAX_CHUNK_UDP
        };

        let mut payload = BytesMut::with_capacity(11);
        payload.put_u8(1);
        payload.put_u16_le(sub_command as u16);
        payload.put_u32_le(fct);
        payload.put_u32_le(ext);

        let reply = self
            .send_command(Command::PrepareBuffer, &payload, 1024)
            .await?;

        // Small datasets come back inline
        if reply.code() == Command::Data as u16 {
            let data = self.complete_inline_data(reply).await?;
            let size = data.len();
            return Ok((data, size));
        }

        if reply.code() != Command::PrepareData as u16 {
            return Err(Error::UnexpectedReply {
                command: Command::PrepareBuffer.name(),
                code: reply.code(),
            });
        }

        // Payload is status(8) | total_size(32)
        if reply.payload.len() < 5 {
            return Err(Error::Malformed(format!(
                "prepare-buffer reply carries {} bytes, need 5",
                reply.payload.len()
            )));
        }
        let total = u32::from_le_bytes([
            reply.payload[1],
            reply.payload[2],
            reply.payload[3],
            reply.payload[4],
        ]);

        let remain = total % max_chunk;
        let packets = total / max_chunk;
        debug!(
            total,
            packets, remain, max_chunk, "bulk read: dataset staged"
        );

        let mut data = BytesMut::with_capacity(total as usize);
        let mut start = 0u32;

        for _ in 0..packets {
            let chunk = self.read_chunk(start, max_chunk).await?;
            data.extend_from_slice(&chunk);
            start += max_chunk;
        }
        if remain > 0 {
            let chunk = self.read_chunk(start, remain).await?;
            data.extend_from_slice(&chunk);
            start += remain;
        }

        self.free_data().await?;
        debug!(bytes = start, "bulk read complete");

        Ok((data, start as usize))
    }

    /// Release the device-side staging buffer
    pub(crate) async fn free_data(&mut self) -> Result<()> {
        self.send_command(Command::FreeData, &[], 1024).await?;
        Ok(())
    }

    /// Fetch one chunk, retrying up to three times
    async fn read_chunk(&mut self, start: u32, size: u32) -> Result<BytesMut> {
        for attempt in 0..MAX_CHUNK_RETRIES {
            let mut payload = BytesMut::with_capacity(8);
            payload.put_u32_le(start);
            payload.put_u32_le(size);

            let expected = if self.tcp() {
                size as usize + 32
            } else {
                UDP_CHUNK_SIZE
            };

            match self.send_command(Command::ReadBuffer, &payload, expected).await {
                Ok(reply) => match self.receive_chunk(reply).await {
                    Ok(data) if !data.is_empty() => return Ok(data),
                    Ok(_) => debug!(start, size, attempt, "empty chunk"),
                    Err(e) => debug!(start, size, attempt, "chunk receive failed: {e}"),
                },
                Err(e) => debug!(start, size, attempt, "chunk request failed: {e}"),
            }
        }

        Err(Error::BulkRead { start, size })
    }

    /// Assemble the data carried by one chunk reply
    pub(crate) async fn receive_chunk(&mut self, reply: Reply) -> Result<BytesMut> {
        if reply.code() == Command::Data as u16 {
            return self.complete_inline_data(reply).await;
        }

        if reply.code() != Command::PrepareData as u16 {
            return Err(Error::UnexpectedReply {
                command: Command::ReadBuffer.name(),
                code: reply.code(),
            });
        }

        // Chunk replies declare their size in the first word of the
        // CMD_PREPARE_DATA payload
        if reply.payload.len() < 4 {
            return Err(Error::Malformed("prepare-data header too short".into()));
        }
        let size = u32::from_le_bytes([
            reply.payload[0],
            reply.payload[1],
            reply.payload[2],
            reply.payload[3],
        ]) as usize;
        trace!(size, "receiving chunk");

        if self.tcp() {
            // Whatever followed the 8-byte prepare payload in the same
            // read is the prefix of the first CMD_DATA frame
            let mut prep = reply.payload;
            let initial = if prep.len() > 8 {
                prep.split_off(8)
            } else {
                BytesMut::new()
            };

            let (data, broken_header) = self.receive_tcp_chunk(initial, size).await?;

            // The trailing ACK frame is 16 bytes (envelope + header);
            // fragments carried over from the data read are completed
            // from the socket
            let mut ack = broken_header;
            if ack.len() < 16 {
                let need = 16 - ack.len();
                let timeout = self.timeout;
                let more = self.transport()?.recv_exact(need, timeout).await?;
                ack.extend_from_slice(&more);
            }

            if test_tcp_top(&ack) == 0 {
                warn!("chunk trailer is not a valid frame");
                return Err(Error::Malformed("invalid chunk trailer".into()));
            }
            let code = u16::from_le_bytes([ack[8], ack[9]]);
            if code != Command::AckOk as u16 {
                return Err(Error::UnexpectedReply {
                    command: Command::ReadBuffer.name(),
                    code,
                });
            }
            trace!("chunk trailer acknowledged");

            Ok(data)
        } else {
            self.receive_udp_chunk(size).await
        }
    }

    /// CMD_DATA replies carry the bytes inline; on TCP the envelope may
    /// declare more than one read delivered, in which case the deficit
    /// is pulled from the socket
    async fn complete_inline_data(&mut self, reply: Reply) -> Result<BytesMut> {
        let mut data = reply.payload;

        if self.tcp() {
            let declared = (reply.tcp_length as usize).saturating_sub(8);
            if data.len() < declared {
                let need = declared - data.len();
                trace!(need, "inline data short of declared length");
                let timeout = self.timeout;
                let more = self.transport()?.recv_exact(need, timeout).await?;
                data.extend_from_slice(&more);
            }
        }

        Ok(data)
    }

    /// Reassemble `size` data bytes from one or more CMD_DATA frames
    ///
    /// `initial` holds bytes already pulled off the socket. Consumes what
    /// is present, reads exactly the deficit when a frame straddles
    /// reads, and returns the data plus any bytes past the final frame
    /// (the "broken header" prefix of the trailing ACK).
    async fn receive_tcp_chunk(
        &mut self,
        initial: BytesMut,
        size: usize,
    ) -> Result<(BytesMut, BytesMut)> {
        let timeout = self.timeout;
        let mut out = BytesMut::with_capacity(size);
        let mut cur = initial;
        let mut remaining = size;

        while remaining > 0 {
            // Envelope plus inner header ahead of any data byte
            if cur.len() < 16 {
                let need = 16 - cur.len();
                let more = self.transport()?.recv_exact(need, timeout).await?;
                cur.extend_from_slice(&more);
            }

            let declared = test_tcp_top(&cur) as usize;
            if declared == 0 {
                warn!("chunk frame without envelope magics");
                return Err(Error::Malformed("invalid chunk frame".into()));
            }

            let code = u16::from_le_bytes([cur[8], cur[9]]);
            if code != Command::Data as u16 {
                return Err(Error::UnexpectedReply {
                    command: Command::ReadBuffer.name(),
                    code,
                });
            }

            // This frame carries declared-8 data bytes; it may cover only
            // part of the chunk, with the rest in follow-up frames
            let frame_data = declared.saturating_sub(8);
            let want = remaining.min(frame_data);

            if cur.len() < 16 + want {
                let need = 16 + want - cur.len();
                trace!(need, "chunk frame straddles reads");
                let more = self.transport()?.recv_exact(need, timeout).await?;
                cur.extend_from_slice(&more);
            }

            out.extend_from_slice(&cur[16..16 + want]);
            remaining -= want;
            cur = cur.split_off(16 + want);
        }

        Ok((out, cur))
    }

    /// Drain CMD_DATA datagrams until the device sends CMD_ACK_OK
    async fn receive_udp_chunk(&mut self, size: usize) -> Result<BytesMut> {
        let timeout = self.timeout;
        let mut out = BytesMut::with_capacity(size);

        loop {
            let datagram = self.transport()?.recv(UDP_CHUNK_SIZE, timeout).await?;
            if datagram.len() < 8 {
                warn!("runt datagram in chunk stream");
                break;
            }

            let code = u16::from_le_bytes([datagram[0], datagram[1]]);
            if code == Command::Data as u16 {
                out.extend_from_slice(&datagram[8..]);
                trace!(
                    got = out.len(),
                    size,
                    "chunk datagram"
                );
            } else if code == Command::AckOk as u16 {
                break;
            } else {
                warn!(code, "unexpected datagram in chunk stream");
                break;
            }
        }

        Ok(out)
    }
}

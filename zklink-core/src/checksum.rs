//! Frame checksum
//!
//! The device checksums the whole frame with the checksum field zeroed:
//! 1. Sum 16-bit little-endian words; a trailing odd byte counts as a
//!    word with a zero high byte
//! 2. After each addition, while the sum exceeds 0xFFFF, subtract 0xFFFF
//!    (end-around carry; this is not the textbook Internet checksum,
//!    which subtracts 0x10000)
//! 3. Take the ones-complement and mask to 16 bits

use tracing::trace;

/// Calculate the frame checksum
///
/// The buffer is the header with a zeroed checksum field followed by the
/// payload: `[cmd_lo, cmd_hi, 0, 0, sess_lo, sess_hi, reply_lo, reply_hi,
/// payload...]`.
pub fn calculate(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(8 + payload.len());

    buf.extend_from_slice(&command.to_le_bytes());
    buf.extend_from_slice(&[0, 0]); // Checksum placeholder
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.extend_from_slice(&reply_id.to_le_bytes());
    buf.extend_from_slice(payload);

    let mut sum: u32 = 0;

    for chunk in buf.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_le_bytes([chunk[0], chunk[1]]) as u32
        } else {
            chunk[0] as u32
        };

        sum += word;

        while sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    }

    let checksum = !sum as u16;

    trace!(
        command = command,
        session_id = session_id,
        reply_id = reply_id,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", checksum),
        "calculated checksum"
    );

    checksum
}

/// Verify a received checksum
pub fn verify(
    command: u16,
    session_id: u16,
    reply_id: u16,
    payload: &[u8],
    expected: u16,
) -> bool {
    calculate(command, session_id, reply_id, payload) == expected
}

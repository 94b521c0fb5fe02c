//! Authentication key derivation
//!
//! Devices with a communication password answer CMD_CONNECT with
//! CMD_ACK_UNAUTH; the client must follow up with CMD_AUTH carrying the
//! password scrambled with the session id.

use bytes::Bytes;

/// Derive the 4-byte CMD_AUTH payload from password and session id
///
/// # Algorithm
///
/// 1. Bit-reverse the low 32 bits of the password
/// 2. Add the session id (32-bit wrap)
/// 3. Emit as 4 little-endian bytes and XOR with `b"ZKSO"`
/// 4. Swap byte pairs (0↔2, 1↔3)
/// 5. XOR bytes 0, 1 and 3 with `ticks`; byte 2 is *set* to `ticks`
///    (the device expects the set, not an XOR)
///
/// `ticks` is 50 in every known firmware (see
/// [`constants::AUTH_TICKS`](crate::constants::AUTH_TICKS)).
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> Bytes {
    let mut k: u32 = 0;
    for i in 0..32 {
        k <<= 1;
        if password & (1 << i) != 0 {
            k |= 1;
        }
    }

    k = k.wrapping_add(session_id as u32);

    let mut buf = k.to_le_bytes();
    for (b, x) in buf.iter_mut().zip(*b"ZKSO") {
        *b ^= x;
    }

    buf.swap(0, 2);
    buf.swap(1, 3);

    buf[0] ^= ticks;
    buf[1] ^= ticks;
    buf[2] = ticks;
    buf[3] ^= ticks;

    Bytes::copy_from_slice(&buf)
}

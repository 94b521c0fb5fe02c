//! Protocol constants

/// TCP envelope magic words (prefix every frame on stream transport)
pub const TCP_MAGIC_1: u16 = 0x5050;
pub const TCP_MAGIC_2: u16 = 0x8274;

/// Largest reply id value; the counter wraps to 0 before reaching it
pub const USHRT_MAX: u16 = 65535;

/// Ticks constant fed into the auth key derivation
pub const AUTH_TICKS: u8 = 50;

/// Legacy success code returned by some devices in place of CMD_ACK_OK
pub const ACK_OK_LEGACY: u16 = 2007;

/// Default connection timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 60;

/// Maximum retries for a single bulk-read chunk
pub const MAX_CHUNK_RETRIES: usize = 3;

/// Largest chunk requested per CMD_READ_BUFFER on a TCP session
pub const MAX_CHUNK_TCP: u32 = 0xFFC0;

/// Largest chunk requested per CMD_READ_BUFFER on a UDP session
pub const MAX_CHUNK_UDP: u32 = 16 * 1024;

/// UDP bulk/event datagram size (1024 bytes of data plus an 8-byte header)
pub const UDP_CHUNK_SIZE: usize = 1024 + 8;

/// Real-time event flags
pub mod events {
    /// Attendance log event
    pub const EF_ATTLOG: u32 = 1;

    /// Fingerprint pressed
    pub const EF_FINGER: u32 = 1 << 1;

    /// User enrolled
    pub const EF_ENROLLUSER: u32 = 1 << 2;

    /// Fingerprint enrolled
    pub const EF_ENROLLFINGER: u32 = 1 << 3;

    /// Button pressed
    pub const EF_BUTTON: u32 = 1 << 4;

    /// Door unlocked
    pub const EF_UNLOCK: u32 = 1 << 5;

    /// Verification event
    pub const EF_VERIFY: u32 = 1 << 7;

    /// Fingerprint minutiae captured
    pub const EF_FPFTR: u32 = 1 << 8;

    /// Alarm signal
    pub const EF_ALARM: u32 = 1 << 9;
}

/// Data-set function codes (second word of a CMD_PREPARE_BUFFER payload)
pub mod data_types {
    /// Attendance log
    pub const FCT_ATTLOG: u32 = 1;

    /// Fingerprint template
    pub const FCT_FINGERTMP: u32 = 2;

    /// Operation log
    pub const FCT_OPLOG: u32 = 4;

    /// User record
    pub const FCT_USER: u32 = 5;

    /// SMS
    pub const FCT_SMS: u32 = 6;

    /// User data
    pub const FCT_UDATA: u32 = 7;

    /// Work code
    pub const FCT_WORKCODE: u32 = 8;
}

/// User privilege levels
pub mod privilege {
    pub const USER_DEFAULT: u8 = 0;
    pub const USER_ADMIN: u8 = 14;
}

//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] zklink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] zklink_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] zklink_types::Error),

    #[error("Device not connected")]
    NotConnected,

    #[error("Authentication failed - check the communication password")]
    AuthenticationFailed,

    #[error("Unexpected reply to {command}: code {code}")]
    UnexpectedReply { command: &'static str, code: u16 },

    #[error("Bulk read failed after retries at {start}:[{size}]")]
    BulkRead { start: u32, size: u32 },

    #[error("Malformed reply: {0}")]
    Malformed(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

//! Session management
//!
//! A session represents a connection to a device and tracks:
//! - Session ID (assigned by device)
//! - Reply counter (increments per command)
//! - Authentication state

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use crate::constants::USHRT_MAX;
use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Connected, no communication password in play
    Connected,

    /// Connected and authenticated with CMD_AUTH
    Authenticated,
}

/// Session manager
///
/// Manages session state and reply ID generation. Cheap to clone (Arc
/// internally); command traffic itself is single-writer — see the device
/// facade.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Session ID assigned by device (0 when not connected)
    session_id: AtomicU16,

    /// Reply counter (starts at USHRT_MAX - 1, incremented before use)
    reply_counter: AtomicU16,

    /// Current session state
    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Initial reply counter value (USHRT_MAX - 1)
    ///
    /// The counter is bumped before each command, so the first command on
    /// a fresh session goes out with reply id 0.
    pub const INITIAL_REPLY_ID: u16 = USHRT_MAX - 1;

    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: AtomicU16::new(0),
                reply_counter: AtomicU16::new(Self::INITIAL_REPLY_ID),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
            }),
        }
    }

    /// Get current session ID
    pub fn session_id(&self) -> u16 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), SessionState::Authenticated)
    }

    /// Reset counters ahead of a CMD_CONNECT exchange
    pub fn reset(&self) {
        self.inner.session_id.store(0, Ordering::Release);
        self.inner
            .reply_counter
            .store(Self::INITIAL_REPLY_ID, Ordering::Release);
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Adopt the device-assigned session ID from the connect reply
    pub fn initialize(&self, session_id: u16) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "cannot initialize from state: {:?}",
                *state
            )));
        }

        self.inner.session_id.store(session_id, Ordering::Release);
        *state = SessionState::Connected;

        Ok(())
    }

    /// Mark session as authenticated
    pub fn authenticate(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Connected {
            return Err(Error::InvalidSessionState(format!(
                "cannot authenticate from state: {:?}",
                *state
            )));
        }

        *state = SessionState::Authenticated;
        Ok(())
    }

    /// Close session
    pub fn close(&self) {
        self.reset();
    }

    /// Bump the reply counter and return the id for the next command
    ///
    /// The counter increments before each command and wraps to 0 when it
    /// would reach 65535 — the value 65535 itself is never emitted.
    /// Servers in the field key retransmit deduplication on this exact
    /// sequence; do not replace it with `(x + 1) % 65536`.
    pub fn next_reply_id(&self) -> u16 {
        let current = self.inner.reply_counter.load(Ordering::Acquire);
        let bumped = current.wrapping_add(1);
        let next = if bumped >= USHRT_MAX { 0 } else { bumped };
        self.inner.reply_counter.store(next, Ordering::Release);
        next
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

//! Device capacity counters
//!
//! CMD_GET_FREE_SIZES answers with 20 little-endian 32-bit words; newer
//! face-capable firmware appends three more.

/// Face slot usage (absent on fingerprint-only firmware)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCapacity {
    pub used: u32,
    pub capacity: u32,
    pub available: u32,
}

/// Storage counters reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryInfo {
    pub users: u32,
    pub fingers: u32,
    pub records: u32,
    pub dummy: u32,
    pub cards: u32,
    pub fingers_capacity: u32,
    pub users_capacity: u32,
    pub records_capacity: u32,
    pub fingers_available: u32,
    pub users_available: u32,
    pub records_available: u32,
    pub faces: Option<FaceCapacity>,
}

impl MemoryInfo {
    /// Parse the CMD_GET_FREE_SIZES payload; `None` if it is too short
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 80 {
            return None;
        }

        let word = |i: usize| {
            u32::from_le_bytes([
                payload[i * 4],
                payload[i * 4 + 1],
                payload[i * 4 + 2],
                payload[i * 4 + 3],
            ])
        };

        let faces = if payload.len() >= 92 {
            let used = word(20);
            let capacity = word(22);
            Some(FaceCapacity {
                used,
                capacity,
                available: capacity.saturating_sub(used),
            })
        } else {
            None
        };

        Some(Self {
            users: word(4),
            fingers: word(6),
            records: word(8),
            dummy: word(10),
            cards: word(12),
            fingers_capacity: word(14),
            users_capacity: word(15),
            records_capacity: word(16),
            fingers_available: word(17),
            users_available: word(18),
            records_available: word(19),
            faces,
        })
    }
}

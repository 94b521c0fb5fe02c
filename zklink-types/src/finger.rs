//! Fingerprint template records
//!
//! Templates are self-delimiting: each record opens with its own total
//! length, `size(16) uid(16) fid(8) valid(8) blob[size-6]`.

use bytes::Bytes;

use crate::error::{Error, Result};

/// One enrolled fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerTemplate {
    pub uid: u16,
    /// Finger index, 0–9
    pub finger_id: u8,
    pub valid: u8,
    /// Opaque template blob
    pub template: Bytes,
}

impl FingerTemplate {
    /// Parse one record; returns the template and its declared length
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 6 {
            return Err(Error::RecordTooShort {
                expected: 6,
                actual: data.len(),
            });
        }

        let size = u16::from_le_bytes([data[0], data[1]]) as usize;
        if size < 6 || size > data.len() {
            return Err(Error::Parse(format!(
                "template record declares {size} bytes, {} available",
                data.len()
            )));
        }

        let template = Self {
            uid: u16::from_le_bytes([data[2], data[3]]),
            finger_id: data[4],
            valid: data[5],
            template: Bytes::copy_from_slice(&data[6..size]),
        };

        Ok((template, size))
    }

    /// Parse records sequentially until `total_size` is exhausted
    ///
    /// A record that does not parse cleanly ends the walk; everything
    /// decoded so far is returned.
    pub fn decode_stream(data: &[u8], total_size: usize) -> Vec<Self> {
        let mut out = Vec::new();
        let mut rest = data;
        let mut remaining = total_size;

        while remaining > 0 && rest.len() >= 6 {
            match Self::decode(rest) {
                Ok((template, size)) => {
                    out.push(template);
                    rest = &rest[size..];
                    remaining = remaining.saturating_sub(size);
                }
                Err(_) => break,
            }
        }

        out
    }
}

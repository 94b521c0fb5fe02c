//! Attendance log retrieval

use tracing::{debug, warn};

use zklink_core::Command;
use zklink_types::Attendance;

use crate::device::Device;
use crate::error::Result;

impl Device {
    /// Fetch the attendance log
    ///
    /// The record layout is discovered as `total_size / record_count`;
    /// rows are joined against the user list fetched in the same
    /// operation so each carries both identifiers where possible.
    pub async fn get_attendance(&mut self) -> Result<Vec<Attendance>> {
        self.read_sizes().await?;

        if self.records == 0 {
            return Ok(Vec::new());
        }

        let users = self.get_users().await?;
        debug!(users = users.len(), "users loaded for attendance join");

        let (data, size) = self.read_with_buffer(Command::AttLogRrq, 0, 0).await?;

        if size < 4 {
            warn!("attendance dataset missing its record block");
            return Ok(Vec::new());
        }

        let total = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let record_size = total / self.records as usize;
        if !matches!(record_size, 8 | 16 | 40) {
            warn!(record_size, "unexpected attendance record size");
        }
        debug!(record_size, records = self.records, "decoding attendance");

        let mut rows = Vec::with_capacity(self.records as usize);
        let mut rest = &data[4..];

        match record_size {
            8 => {
                while rest.len() >= 8 {
                    let mut row = Attendance::decode_8(&rest[..8])?;
                    if let Some(user) = users.iter().find(|u| u.uid as u32 == row.uid) {
                        row.user_id = user.user_id.clone();
                    }
                    rows.push(row);
                    rest = &rest[8..];
                }
            }
            16 => {
                while rest.len() >= 16 {
                    let mut row = Attendance::decode_16(&rest[..16])?;
                    if let Some(user) = users.iter().find(|u| u.user_id == row.user_id) {
                        row.uid = user.uid as u32;
                    }
                    rows.push(row);
                    rest = &rest[16..];
                }
            }
            // 40-byte rows carry both identifiers; unknown sizes fall
            // through here too, stepping by the discovered size
            step => {
                if step == 0 {
                    return Ok(rows);
                }
                while rest.len() >= 40 {
                    rows.push(Attendance::decode_40(&rest[..40])?);
                    rest = &rest[step.min(rest.len())..];
                }
            }
        }

        debug!(count = rows.len(), "attendance decoded");
        Ok(rows)
    }
}

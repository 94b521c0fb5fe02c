//! User database operations

use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use zklink_core::constants::data_types::FCT_USER;
use zklink_core::Command;
use zklink_types::{User, UserPacketSize};

use crate::device::Device;
use crate::error::Result;

impl Device {
    /// Fetch the user database
    ///
    /// Discovers the record layout (`total_size / user_count`) on the
    /// way and caches it for subsequent writes, along with the next free
    /// uid / user id.
    pub async fn get_users(&mut self) -> Result<Vec<User>> {
        self.read_sizes().await?;

        if self.users == 0 {
            self.next_uid = 1;
            self.next_user_id = "1".into();
            return Ok(Vec::new());
        }

        let (data, size) = self
            .read_with_buffer(Command::UserTempRrq, FCT_USER, 0)
            .await?;

        if size <= 4 {
            warn!("user dataset missing its record block");
            return Ok(Vec::new());
        }

        let total = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let record_len = total / self.users as usize;

        let kind = match UserPacketSize::from_len(record_len) {
            Some(kind) => kind,
            None => {
                warn!(record_len, "unexpected user packet size, assuming wide layout");
                UserPacketSize::Long
            }
        };
        self.user_packet_size = Some(kind);
        debug!(record_len, users = self.users, "decoding user records");

        let mut users = Vec::with_capacity(self.users as usize);
        let mut rest = &data[4..];
        while rest.len() >= kind.len() {
            users.push(User::decode(&rest[..kind.len()], kind)?);
            rest = &rest[kind.len()..];
        }

        // Next free uid, then advance the user id past any collision
        let max_uid = users.iter().map(|u| u.uid).max().unwrap_or(0);
        let mut next_uid = max_uid.saturating_add(1);
        let mut next_user_id = next_uid.to_string();
        while users.iter().any(|u| u.user_id == next_user_id) {
            next_uid = next_uid.saturating_add(1);
            next_user_id = next_uid.to_string();
        }
        self.next_uid = next_uid;
        self.next_user_id = next_user_id;

        debug!(
            count = users.len(),
            next_uid = self.next_uid,
            "users decoded"
        );
        Ok(users)
    }

    /// Create or update a user record
    ///
    /// A zero `uid` takes the next free uid (and, when the user id is
    /// empty, the next free user id) discovered by the last
    /// [`get_users`](Self::get_users). The record is written in the
    /// layout the device was seen using, defaulting to the short one.
    pub async fn set_user(&mut self, user: &User) -> Result<()> {
        self.ensure_connected()?;

        let kind = self.user_packet_size.unwrap_or(UserPacketSize::Short);

        let mut record = user.clone();
        if record.uid == 0 {
            record.uid = self.next_uid;
            if record.user_id.is_empty() {
                record.user_id = self.next_user_id.clone();
            }
        }
        if record.user_id.is_empty() {
            record.user_id = record.uid.to_string();
        }
        if record.group_id.is_empty() {
            record.group_id = "0".into();
        }

        let payload = record.encode(kind);
        self.simple_command(Command::UserWrq, &payload).await?;

        if self.next_uid == record.uid {
            self.next_uid = self.next_uid.saturating_add(1);
        }
        if self.next_user_id == record.user_id {
            self.next_user_id = self.next_uid.to_string();
        }

        debug!(uid = record.uid, user_id = %record.user_id, "user written");
        Ok(())
    }

    /// Delete a user by uid
    pub async fn delete_user(&mut self, uid: u16) -> Result<()> {
        self.ensure_connected()?;

        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16_le(uid);
        self.simple_command(Command::DeleteUser, &payload).await?;

        if uid == self.next_uid.wrapping_sub(1) {
            self.next_uid = uid;
        }

        debug!(uid, "user deleted");
        Ok(())
    }
}

//! Fingerprint template operations

use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use zklink_core::constants::data_types::FCT_FINGERTMP;
use zklink_core::Command;
use zklink_types::FingerTemplate;

use crate::device::Device;
use crate::error::{Error, Result};

impl Device {
    /// Dump every enrolled template
    pub async fn get_templates(&mut self) -> Result<Vec<FingerTemplate>> {
        self.read_sizes().await?;

        if self.fingers == 0 {
            return Ok(Vec::new());
        }

        let (data, size) = self
            .read_with_buffer(Command::DbRrq, FCT_FINGERTMP, 0)
            .await?;

        if size < 4 {
            warn!("template dataset missing its record block");
            return Ok(Vec::new());
        }

        let total = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let templates = FingerTemplate::decode_stream(&data[4..], total);

        debug!(count = templates.len(), "templates decoded");
        Ok(templates)
    }

    /// Fetch one user's template for a single finger
    ///
    /// Retried up to three times. The device appends one spurious byte,
    /// and some firmware a run of six zero bytes, past the template;
    /// both are stripped.
    pub async fn get_user_template(
        &mut self,
        uid: u16,
        finger_id: u8,
    ) -> Result<FingerTemplate> {
        self.ensure_connected()?;

        for attempt in 0..3 {
            let mut payload = BytesMut::with_capacity(3);
            payload.put_u16_le(uid);
            payload.put_u8(finger_id);

            let reply = match self
                .send_command(Command::GetUserTemp, &payload, 1024 + 8)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(uid, finger_id, attempt, "template request failed: {e}");
                    continue;
                }
            };

            match self.receive_chunk(reply).await {
                Ok(data) if !data.is_empty() => {
                    let mut template = data;
                    template.truncate(template.len() - 1);
                    if template.len() >= 6 && template[template.len() - 6..].iter().all(|&b| b == 0)
                    {
                        // padding? bug? present on some firmware
                        let trimmed = template.len() - 6;
                        template.truncate(trimmed);
                    }

                    return Ok(FingerTemplate {
                        uid,
                        finger_id,
                        valid: 1,
                        template: template.freeze(),
                    });
                }
                Ok(_) => debug!(uid, finger_id, attempt, "empty template chunk"),
                Err(e) => debug!(uid, finger_id, attempt, "template receive failed: {e}"),
            }
        }

        Err(Error::NotFound(format!(
            "template for uid {uid}, finger {finger_id}"
        )))
    }

    /// Delete one enrolled template
    ///
    /// On TCP, a supplied `user_id` selects the wide form of the command
    /// (`user_id[24] fid`); otherwise the uid form is used.
    pub async fn delete_user_template(
        &mut self,
        uid: u16,
        finger_id: u8,
        user_id: Option<&str>,
    ) -> Result<()> {
        self.ensure_connected()?;

        if let Some(user_id) = user_id.filter(|_| self.tcp()) {
            let mut payload = BytesMut::with_capacity(25);
            let mut field = [0u8; 24];
            let bytes = user_id.as_bytes();
            let n = bytes.len().min(24);
            field[..n].copy_from_slice(&bytes[..n]);
            payload.put_slice(&field);
            payload.put_u8(finger_id);

            self.simple_command(Command::DelUserTemp, &payload).await?;
            debug!(user_id, finger_id, "template deleted (wide form)");
            return Ok(());
        }

        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(uid);
        payload.put_u8(finger_id);

        self.simple_command(Command::DeleteUserTemp, &payload).await?;
        debug!(uid, finger_id, "template deleted");
        Ok(())
    }
}

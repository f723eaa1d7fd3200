//! Persistent per-device identity, used to attribute shared-state writes.
//!
//! Format: `focusguard-<uuid>`, stored as a single line in the local data
//! directory so the id survives restarts and reinstalls of the same profile.

use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

const DEVICE_ID_FILE: &str = "device_id";
const DEVICE_ID_PREFIX: &str = "focusguard-";

#[derive(Debug, thiserror::Error)]
pub enum DeviceIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed device id on disk: {0}")]
    Malformed(String),
}

/// Read the device id stored under `dir`, creating one on first use.
pub fn load_or_create_device_id(dir: &Path) -> Result<String, DeviceIdError> {
    let path = dir.join(DEVICE_ID_FILE);

    if path.exists() {
        let id = fs::read_to_string(&path)?.trim().to_string();
        if !id.starts_with(DEVICE_ID_PREFIX) {
            return Err(DeviceIdError::Malformed(id));
        }
        return Ok(id);
    }

    let id = format!("{DEVICE_ID_PREFIX}{}", Uuid::new_v4());
    fs::create_dir_all(dir)?;
    let mut file = fs::File::create(&path)?;
    writeln!(file, "{id}")?;
    Ok(id)
}

use std::path::Path;

use crate::errors::CoreError;
use crate::models::ledger::Ledger;

use super::format;

/// High-level storage operations: save/load the ledger to/from bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// Flow: Ledger → bincode → FNDL envelope bytes
    pub fn save_to_bytes(ledger: &Ledger) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(ledger)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize ledger: {e}")))?;
        Ok(format::write_file(format::CURRENT_VERSION, &payload))
    }

    /// Flow: FNDL bytes → parse header → bincode → Ledger
    pub fn load_from_bytes(data: &[u8]) -> Result<Ledger, CoreError> {
        let (_header, payload) = format::read_file(data)?;
        bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize ledger: {e}")))
    }

    pub fn save_to_file(ledger: &Ledger, path: &Path) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(ledger)?;
        Self::write_atomic(path, &bytes)
    }

    /// Write `bytes` next to `path` and rename them into place, so a crash
    /// mid-write never leaves a half-written ledger behind. Callers must not
    /// run two writes to the same path at once.
    pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Ledger, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}

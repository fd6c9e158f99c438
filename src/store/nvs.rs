//! NVS-backed storage for ESP32 builds.
//!
//! Each record maps to one key in a dedicated NVS namespace, so records
//! persist across reboots. ESP-IDF commits every blob write, which is
//! stronger than the staged-write contract requires; `flush` is therefore
//! a checkpoint that always succeeds once the writes did.

use super::{RecordId, StorageBackend, StoreError};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;

/// NVS namespace for the station records.
const NVS_NAMESPACE: &str = "wifi_station";

/// Largest record we expect to read back. The profile map dominates;
/// at ~100 bytes per saved network this allows dozens of profiles.
const MAX_RECORD_LEN: usize = 4096;

/// ESP32 storage backend over NVS.
pub struct NvsBackend {
    nvs: EspNvs<NvsDefault>,
}

impl NvsBackend {
    /// Open the station namespace on the default NVS partition.
    pub fn open() -> Result<Self, StoreError> {
        let partition = EspNvsPartition::<NvsDefault>::take().map_err(unavailable)?;
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true).map_err(unavailable)?;
        Ok(Self { nvs })
    }
}

impl StorageBackend for NvsBackend {
    fn read(&mut self, record: RecordId) -> Result<Option<Vec<u8>>, StoreError> {
        // Heap buffer: the default main task stack is smaller than this.
        let mut buf = vec![0u8; MAX_RECORD_LEN];
        let bytes = self
            .nvs
            .get_raw(record.key_str(), &mut buf)
            .map_err(|e| io_error(record, e))?;
        Ok(bytes.map(|b| b.to_vec()))
    }

    fn write(&mut self, record: RecordId, bytes: &[u8]) -> Result<(), StoreError> {
        self.nvs
            .set_raw(record.key_str(), bytes)
            .map_err(|e| io_error(record, e))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        // Writes above are already committed by ESP-IDF.
        Ok(())
    }
}

fn unavailable(e: EspError) -> StoreError {
    StoreError::StorageUnavailable(format!("NVS: {:?}", e))
}

fn io_error(record: RecordId, e: EspError) -> StoreError {
    StoreError::Io(format!("NVS {}: {:?}", record, e))
}

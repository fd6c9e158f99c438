//! Persistent store for the four station configuration records.
//!
//! The store owns exactly four fixed-key records (profiles, AP identity,
//! AP settings, last-connected SSID) on top of a [`StorageBackend`]
//! capability. Durability is explicit: `put` stages an overwrite and only
//! `flush` commits it. Every typed mutation helper performs put+flush, so a
//! mutation is never considered complete without a commit.
//!
//! Backends: [`FileBackend`] for host builds, `NvsBackend` on ESP32
//! (`esp32` feature), and [`MemoryBackend`] for tests and host development.

mod file;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::FileBackend;
#[cfg(feature = "esp32")]
pub use nvs::NvsBackend;

use crate::config::{ActiveConnection, ApIdentity, ApSettings, ConfigError, StationProfiles};
use log::info;
use std::fmt;

/// Fixed keys addressing the four records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordId {
    /// Record 0: SSID → password mapping.
    StationProfiles,
    /// Record 1: the SSID/password the device advertises.
    ApIdentity,
    /// Record 2: AP tuning (client limit).
    ApSettings,
    /// Record 3: SSID of the last successful association.
    ActiveConnection,
}

impl RecordId {
    /// All records, in key order.
    pub const ALL: [RecordId; 4] = [
        RecordId::StationProfiles,
        RecordId::ApIdentity,
        RecordId::ApSettings,
        RecordId::ActiveConnection,
    ];

    /// The record's small integer key.
    pub fn key(self) -> u8 {
        match self {
            Self::StationProfiles => 0,
            Self::ApIdentity => 1,
            Self::ApSettings => 2,
            Self::ActiveConnection => 3,
        }
    }

    /// The record's key as a storage key string ("0".."3").
    pub fn key_str(self) -> &'static str {
        match self {
            Self::StationProfiles => "0",
            Self::ApIdentity => "1",
            Self::ApSettings => "2",
            Self::ActiveConnection => "3",
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StationProfiles => "station profiles",
            Self::ApIdentity => "AP identity",
            Self::ApSettings => "AP settings",
            Self::ActiveConnection => "active connection",
        };
        write!(f, "{}", name)
    }
}

/// Byte-level storage the store runs on. Implementations decide where the
/// bytes live; the store decides what they mean.
///
/// `write` stages data; only `flush` must make prior writes durable. A
/// `read` is guaranteed to observe a `write` only after an intervening
/// `flush`. Exactly one writer may hold the backing resource for the
/// process lifetime.
pub trait StorageBackend {
    /// Read the current bytes of a record, or `None` if it was never written.
    fn read(&mut self, record: RecordId) -> Result<Option<Vec<u8>>, StoreError>;
    /// Stage an overwrite of a record.
    fn write(&mut self, record: RecordId, bytes: &[u8]) -> Result<(), StoreError>;
    /// Durably commit all writes staged since the last flush.
    fn flush(&mut self) -> Result<(), StoreError>;
}

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing resource cannot be opened or created. Unrecoverable
    /// locally: the caller's policy is to write defaults and restart.
    StorageUnavailable(String),
    /// Stored bytes fail the strict decode for this record.
    CorruptRecord { record: RecordId, reason: String },
    /// The record was never written (store not initialized).
    MissingRecord(RecordId),
    /// Backend I/O failure on read, write, or flush.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageUnavailable(msg) => write!(f, "storage unavailable: {}", msg),
            Self::CorruptRecord { record, reason } => {
                write!(f, "corrupt {} record: {}", record, reason)
            }
            Self::MissingRecord(record) => write!(f, "missing {} record", record),
            Self::Io(msg) => write!(f, "storage I/O error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// The four-record configuration store.
///
/// The [`crate::manager::ConnectionManager`] is the sole writer; other
/// layers reach the records through its operations only.
pub struct ProfileStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> ProfileStore<B> {
    /// Wrap an opened backend. Backend constructors (`FileBackend::open`,
    /// `NvsBackend::open`) fail with [`StoreError::StorageUnavailable`]
    /// when the backing resource cannot be created.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Whether all four records are present (i.e. defaults were written at
    /// some point).
    pub fn is_initialized(&mut self) -> Result<bool, StoreError> {
        for record in RecordId::ALL {
            if self.backend.read(record)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Write the first-run defaults for all four records, then flush.
    ///
    /// Contract: this is a pre-restart operation. Configuration only takes
    /// effect reliably after a reboot, so callers follow it with a
    /// controlled restart rather than using it to reconfigure live.
    pub fn initialize_defaults(&mut self) -> Result<(), StoreError> {
        self.put(
            RecordId::StationProfiles,
            StationProfiles::new().encode().as_bytes(),
        )?;
        self.put(
            RecordId::ApIdentity,
            ApIdentity::default_identity().encode().as_bytes(),
        )?;
        self.put(
            RecordId::ApSettings,
            ApSettings::default_settings().encode().as_bytes(),
        )?;
        self.put(
            RecordId::ActiveConnection,
            ActiveConnection::none().encode().as_bytes(),
        )?;
        self.flush()?;
        info!("Store initialized with default records");
        Ok(())
    }

    /// Raw bytes of a record.
    pub fn get(&mut self, record: RecordId) -> Result<Vec<u8>, StoreError> {
        self.backend
            .read(record)?
            .ok_or(StoreError::MissingRecord(record))
    }

    /// Stage an overwrite. Not durable until [`ProfileStore::flush`].
    pub fn put(&mut self, record: RecordId, bytes: &[u8]) -> Result<(), StoreError> {
        self.backend.write(record, bytes)
    }

    /// Durably commit all prior puts.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.backend.flush()
    }

    fn get_str(&mut self, record: RecordId) -> Result<String, StoreError> {
        let bytes = self.get(record)?;
        String::from_utf8(bytes).map_err(|e| StoreError::CorruptRecord {
            record,
            reason: format!("not UTF-8: {}", e),
        })
    }

    fn corrupt(record: RecordId, e: ConfigError) -> StoreError {
        StoreError::CorruptRecord {
            record,
            reason: e.to_string(),
        }
    }

    /// Decode record 0.
    pub fn station_profiles(&mut self) -> Result<StationProfiles, StoreError> {
        let text = self.get_str(RecordId::StationProfiles)?;
        StationProfiles::decode(&text).map_err(|e| Self::corrupt(RecordId::StationProfiles, e))
    }

    /// Persist record 0 (put + flush).
    pub fn set_station_profiles(&mut self, profiles: &StationProfiles) -> Result<(), StoreError> {
        self.put(RecordId::StationProfiles, profiles.encode().as_bytes())?;
        self.flush()
    }

    /// Decode record 1.
    pub fn ap_identity(&mut self) -> Result<ApIdentity, StoreError> {
        let text = self.get_str(RecordId::ApIdentity)?;
        ApIdentity::decode(&text).map_err(|e| Self::corrupt(RecordId::ApIdentity, e))
    }

    /// Persist record 1 (put + flush).
    pub fn set_ap_identity(&mut self, identity: &ApIdentity) -> Result<(), StoreError> {
        self.put(RecordId::ApIdentity, identity.encode().as_bytes())?;
        self.flush()
    }

    /// Decode record 2.
    pub fn ap_settings(&mut self) -> Result<ApSettings, StoreError> {
        let text = self.get_str(RecordId::ApSettings)?;
        ApSettings::decode(&text).map_err(|e| Self::corrupt(RecordId::ApSettings, e))
    }

    /// Persist record 2 (put + flush).
    pub fn set_ap_settings(&mut self, settings: &ApSettings) -> Result<(), StoreError> {
        self.put(RecordId::ApSettings, settings.encode().as_bytes())?;
        self.flush()
    }

    /// Decode record 3.
    pub fn active_connection(&mut self) -> Result<ActiveConnection, StoreError> {
        let text = self.get_str(RecordId::ActiveConnection)?;
        Ok(ActiveConnection::decode(&text))
    }

    /// Persist record 3 (put + flush).
    pub fn set_active_connection(&mut self, active: &ActiveConnection) -> Result<(), StoreError> {
        self.put(RecordId::ActiveConnection, active.encode().as_bytes())?;
        self.flush()
    }
}

/// In-memory backend for tests and host development runs.
///
/// Keeps staged and committed states separate so the flush contract is
/// observable: `read` sees staged writes, [`MemoryBackend::committed`]
/// only what a flush made durable.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    staged: [Option<Vec<u8>>; 4],
    durable: [Option<Vec<u8>>; 4],
    flushes: u32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The durably committed bytes of a record, if any.
    pub fn committed(&self, record: RecordId) -> Option<&[u8]> {
        self.durable[record.key() as usize].as_deref()
    }

    /// How many times `flush` has been called.
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&mut self, record: RecordId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.staged[record.key() as usize].clone())
    }

    fn write(&mut self, record: RecordId, bytes: &[u8]) -> Result<(), StoreError> {
        self.staged[record.key() as usize] = Some(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.durable = self.staged.clone();
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized_store() -> ProfileStore<MemoryBackend> {
        let mut store = ProfileStore::new(MemoryBackend::new());
        store.initialize_defaults().unwrap();
        store
    }

    #[test]
    fn test_put_flush_get_round_trip_all_records() {
        let mut store = ProfileStore::new(MemoryBackend::new());
        for (i, record) in RecordId::ALL.into_iter().enumerate() {
            let payload = format!("payload-{}", i);
            store.put(record, payload.as_bytes()).unwrap();
            store.flush().unwrap();
            assert_eq!(store.get(record).unwrap(), payload.as_bytes());
        }
    }

    #[test]
    fn test_get_missing_record() {
        let mut store = ProfileStore::new(MemoryBackend::new());
        assert_eq!(
            store.get(RecordId::StationProfiles),
            Err(StoreError::MissingRecord(RecordId::StationProfiles))
        );
    }

    #[test]
    fn test_initialize_defaults_writes_all_records() {
        let mut store = initialized_store();
        assert!(store.is_initialized().unwrap());
        assert!(store.station_profiles().unwrap().is_empty());

        let identity = store.ap_identity().unwrap();
        assert_eq!(identity.ssid, "ESP_Station");
        assert_eq!(identity.password.as_deref(), Some("MicroPython"));

        assert_eq!(store.ap_settings().unwrap().max_clients, 1);
        assert_eq!(store.active_connection().unwrap().ssid(), None);
    }

    #[test]
    fn test_defaults_are_flushed() {
        let mut store = initialized_store();
        assert_eq!(
            store.backend.committed(RecordId::StationProfiles),
            Some("{}".as_bytes())
        );
    }

    #[test]
    fn test_not_initialized_when_record_missing() {
        let mut store = ProfileStore::new(MemoryBackend::new());
        assert!(!store.is_initialized().unwrap());
        store.put(RecordId::StationProfiles, b"{}").unwrap();
        store.flush().unwrap();
        assert!(!store.is_initialized().unwrap());
    }

    #[test]
    fn test_put_alone_is_not_durable() {
        let mut store = initialized_store();
        let before = store.backend.flush_count();
        store.put(RecordId::ActiveConnection, b"home").unwrap();
        assert_eq!(store.backend.flush_count(), before);
        assert_eq!(
            store.backend.committed(RecordId::ActiveConnection),
            Some("".as_bytes())
        );
        store.flush().unwrap();
        assert_eq!(
            store.backend.committed(RecordId::ActiveConnection),
            Some("home".as_bytes())
        );
    }

    #[test]
    fn test_typed_setters_flush() {
        let mut store = initialized_store();
        let mut profiles = crate::config::StationProfiles::new();
        profiles.add("home", "pw1").unwrap();
        store.set_station_profiles(&profiles).unwrap();
        assert_eq!(
            store.backend.committed(RecordId::StationProfiles),
            Some("{'home': 'pw1'}".as_bytes())
        );
    }

    #[test]
    fn test_corrupt_profiles_surface_typed_error() {
        let mut store = initialized_store();
        store
            .put(RecordId::StationProfiles, b"__import__('os')")
            .unwrap();
        store.flush().unwrap();
        assert!(matches!(
            store.station_profiles(),
            Err(StoreError::CorruptRecord {
                record: RecordId::StationProfiles,
                ..
            })
        ));
    }

    #[test]
    fn test_corrupt_settings_surface_typed_error() {
        let mut store = initialized_store();
        store.put(RecordId::ApSettings, b"{'max_client/s': 'x'}").unwrap();
        store.flush().unwrap();
        assert!(matches!(
            store.ap_settings(),
            Err(StoreError::CorruptRecord {
                record: RecordId::ApSettings,
                ..
            })
        ));
    }

    #[test]
    fn test_non_utf8_record_is_corrupt() {
        let mut store = initialized_store();
        store.put(RecordId::ApIdentity, &[0xff, 0xfe]).unwrap();
        store.flush().unwrap();
        assert!(matches!(
            store.ap_identity(),
            Err(StoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_active_connection_update() {
        let mut store = initialized_store();
        store
            .set_active_connection(&crate::config::ActiveConnection::some("home"))
            .unwrap();
        assert_eq!(store.active_connection().unwrap().ssid(), Some("home"));
    }
}

//! Wi-Fi station firmware library.
//!
//! Persists known network credentials, configures the device's own access
//! point, and re-associates the station radio with a known network after
//! boot or disconnection. The core (record store and connection state
//! machine) is platform-independent and tested on the host machine; the
//! ESP-IDF radio driver and NVS storage backends are gated behind the
//! `esp32` feature.

pub mod config;
pub mod literal;
pub mod manager;
pub mod radio;
pub mod store;

// Re-export commonly used items
pub use config::{ActiveConnection, ApIdentity, ApSettings, ConfigError, StationProfiles};
pub use manager::{ConnectOutcome, ConnectionManager, ConnectionState, StationError};
pub use radio::{Clock, Radio, RadioError, SystemClock};
pub use store::{FileBackend, MemoryBackend, ProfileStore, RecordId, StorageBackend, StoreError};

#[cfg(feature = "esp32")]
pub use radio::EspRadio;
#[cfg(feature = "esp32")]
pub use store::NvsBackend;

//! Radio and clock capabilities consumed by the connection manager.
//!
//! The manager drives the device's two radio roles (station and access
//! point) through the [`Radio`] trait and sleeps through the [`Clock`]
//! trait, so the whole state machine runs on the host against mocks
//! without hardware or real delays. [`EspRadio`] is the ESP-IDF
//! implementation (`esp32` feature).

#[cfg(feature = "esp32")]
mod esp;

#[cfg(feature = "esp32")]
pub use esp::EspRadio;

use std::fmt;
use std::time::Duration;

/// Blocking driver surface for both radio roles.
///
/// The device control flow is single-threaded; every method blocks until
/// the driver returns. Implementations apply only what the board supports:
/// `configure_access_point` receives the password and client limit as
/// options and may ignore either.
pub trait Radio {
    /// Activate or deactivate the station (client) radio.
    fn set_station_active(&mut self, active: bool) -> Result<(), RadioError>;

    /// Apply the advertised identity and tuning to the AP radio.
    fn configure_access_point(
        &mut self,
        essid: &str,
        password: Option<&str>,
        max_clients: Option<u8>,
    ) -> Result<(), RadioError>;

    /// Activate or deactivate the AP radio.
    fn set_access_point_active(&mut self, active: bool) -> Result<(), RadioError>;

    /// Scan for visible networks. The returned order is the driver's
    /// report order and is meaningful to callers.
    fn scan(&mut self) -> Result<Vec<String>, RadioError>;

    /// Begin associating the station radio with a network.
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// Whether the station radio is currently associated.
    fn is_connected(&mut self) -> bool;

    /// Human-readable address info (IP etc.) for status reporting, if the
    /// driver can provide it.
    fn address_info(&mut self) -> Option<String>;
}

/// Time source for settle delays and retry pacing.
pub trait Clock {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// [`Clock`] backed by the OS.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// SSID rejected by the driver (too long or invalid characters).
    InvalidSsid,
    /// Password rejected by the driver.
    InvalidPassword,
    /// Any other driver failure.
    Driver(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::Driver(msg) => write!(f, "radio driver error: {}", msg),
        }
    }
}

impl std::error::Error for RadioError {}

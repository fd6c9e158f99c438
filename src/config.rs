//! Record types for the station configuration store.
//!
//! These are platform-independent and testable on the host machine. Each
//! type knows how to encode itself into, and decode itself from, the record
//! literal grammar in [`crate::literal`].
//!
//! # Example
//!
//! ```
//! use wifi_station_esp32::config::StationProfiles;
//!
//! let mut profiles = StationProfiles::new();
//! profiles.add("home", "pw1").unwrap();
//! assert_eq!(profiles.password_for("home"), Some("pw1"));
//! ```

use crate::literal::{self, Literal};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Upper bound on access-point clients; larger values are clamped at
/// write time. There is deliberately no lower clamp.
pub const MAX_AP_CLIENTS: u8 = 10;

/// SSID the device advertises before an AP identity is configured.
pub const DEFAULT_AP_SSID: &str = "ESP_Station";

/// Password paired with [`DEFAULT_AP_SSID`] on first run.
pub const DEFAULT_AP_PASSWORD: &str = "MicroPython";

/// `max_clients` written on first run.
pub const DEFAULT_MAX_CLIENTS: u8 = 1;

/// Mapping key the AP settings record stores `max_clients` under.
const MAX_CLIENTS_KEY: &str = "max_client/s";

/// The stored set of known networks: SSID → password.
///
/// An empty set is a valid, distinguishable state ("no profiles"). SSIDs
/// are unique by construction; enumeration order is not part of the
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StationProfiles {
    entries: BTreeMap<String, String>,
}

impl StationProfiles {
    /// Create an empty profile set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `{ssid: password}` into the set, replacing any existing entry.
    ///
    /// The password may be empty (open network).
    pub fn add(
        &mut self,
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let ssid = ssid.into();
        let password = password.into();
        validate_ssid(&ssid)?;
        validate_password(&password)?;
        self.entries.insert(ssid, password);
        Ok(())
    }

    /// Remove the entry for `ssid`.
    pub fn remove(&mut self, ssid: &str) -> Result<(), ConfigError> {
        match self.entries.remove(ssid) {
            Some(mut password) => {
                password.zeroize();
                Ok(())
            }
            None => Err(ConfigError::UnknownSsid(ssid.to_string())),
        }
    }

    /// Stored password for `ssid`, if the profile exists.
    pub fn password_for(&self, ssid: &str) -> Option<&str> {
        self.entries.get(ssid).map(String::as_str)
    }

    /// Whether a profile for `ssid` is stored.
    pub fn contains(&self, ssid: &str) -> bool {
        self.entries.contains_key(ssid)
    }

    /// Snapshot of the stored SSIDs. Ordering may differ between calls on
    /// different sets; callers must not rely on index stability.
    pub fn ssids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Encode as a string→string literal mapping (record 0).
    pub fn encode(&self) -> String {
        let map = Literal::Map(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), Literal::Str(v.clone())))
                .collect(),
        );
        map.encode()
    }

    /// Decode from a string→string literal mapping.
    pub fn decode(text: &str) -> Result<Self, ConfigError> {
        let entries = match literal::parse(text).map_err(ConfigError::bad_literal)? {
            Literal::Map(entries) => entries,
            other => return Err(ConfigError::bad_shape("profile record is not a mapping", &other)),
        };
        let mut profiles = Self::new();
        for (ssid, value) in entries {
            let password = match value {
                Literal::Str(password) => password,
                other => {
                    return Err(ConfigError::bad_shape("profile password is not a string", &other))
                }
            };
            // Parse-level duplicate detection already ran; this re-checks
            // the SSID constraints the mutation path enforces.
            profiles.add(ssid, password)?;
        }
        Ok(profiles)
    }
}

impl Drop for StationProfiles {
    fn drop(&mut self) {
        for password in self.entries.values_mut() {
            password.zeroize();
        }
    }
}

/// The SSID/password the device itself advertises (record 1).
///
/// The password is optional: boards whose AP mode is driven without a
/// secured configuration store `None` here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApIdentity {
    pub ssid: String,
    pub password: Option<String>,
}

impl ApIdentity {
    /// Create a secured AP identity.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let identity = Self {
            ssid: ssid.into(),
            password: Some(password.into()),
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Create an AP identity without a password.
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        let identity = Self {
            ssid: ssid.into(),
            password: None,
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Validate the identity. The fields are public, so values built with
    /// a struct literal must pass through here before being persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.ssid)?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }

    /// Identity written on first run.
    pub fn default_identity() -> Self {
        Self {
            ssid: DEFAULT_AP_SSID.to_string(),
            password: Some(DEFAULT_AP_PASSWORD.to_string()),
        }
    }

    /// Encode as a one-entry literal mapping (record 1).
    pub fn encode(&self) -> String {
        let value = match &self.password {
            Some(password) => Literal::Str(password.clone()),
            None => Literal::None,
        };
        Literal::Map(vec![(self.ssid.clone(), value)]).encode()
    }

    /// Decode from a one-entry literal mapping.
    pub fn decode(text: &str) -> Result<Self, ConfigError> {
        let entries = match literal::parse(text).map_err(ConfigError::bad_literal)? {
            Literal::Map(entries) => entries,
            other => return Err(ConfigError::bad_shape("AP identity is not a mapping", &other)),
        };
        let entry_count = entries.len();
        let (ssid, value) = match entries.into_iter().next() {
            Some(entry) if entry_count == 1 => entry,
            _ => {
                return Err(ConfigError::BadRecord(format!(
                    "AP identity has {} entries, expected 1",
                    entry_count
                )))
            }
        };
        let password = match value {
            Literal::Str(password) => Some(password),
            Literal::None => None,
            other => {
                return Err(ConfigError::bad_shape("AP password is not a string or None", &other))
            }
        };
        let identity = Self { ssid, password };
        identity.validate()?;
        Ok(identity)
    }
}

impl Drop for ApIdentity {
    fn drop(&mut self) {
        if let Some(password) = &mut self.password {
            password.zeroize();
        }
    }
}

/// Access-point tuning (record 2). Currently just the client limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApSettings {
    pub max_clients: u8,
}

impl ApSettings {
    /// Build settings with the write-time clamp applied: values above
    /// [`MAX_AP_CLIENTS`] become [`MAX_AP_CLIENTS`]. `0` is kept as-is.
    pub fn clamped(max_clients: u8) -> Self {
        Self {
            max_clients: max_clients.min(MAX_AP_CLIENTS),
        }
    }

    /// Settings written on first run.
    pub fn default_settings() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }

    /// Encode as `{'max_client/s': n}` (record 2).
    pub fn encode(&self) -> String {
        Literal::Map(vec![(
            MAX_CLIENTS_KEY.to_string(),
            Literal::Int(i64::from(self.max_clients)),
        )])
        .encode()
    }

    /// Decode from `{'max_client/s': n}`.
    pub fn decode(text: &str) -> Result<Self, ConfigError> {
        let parsed = literal::parse(text).map_err(ConfigError::bad_literal)?;
        let value = parsed.get(MAX_CLIENTS_KEY).ok_or_else(|| {
            ConfigError::BadRecord(format!("AP settings missing {:?} key", MAX_CLIENTS_KEY))
        })?;
        match value {
            Literal::Int(n) if (0..=i64::from(u8::MAX)).contains(n) => Ok(Self {
                max_clients: *n as u8,
            }),
            other => Err(ConfigError::bad_shape("max clients is not a small integer", other)),
        }
    }
}

/// The SSID the station radio last successfully joined (record 3), stored
/// as a raw string with "" meaning "none". Updated only on successful
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveConnection(Option<String>);

impl ActiveConnection {
    /// The "never connected" sentinel.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn some(ssid: impl Into<String>) -> Self {
        Self(Some(ssid.into()))
    }

    pub fn ssid(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Encode as a raw string; the empty string is the sentinel.
    pub fn encode(&self) -> String {
        self.0.clone().unwrap_or_default()
    }

    /// Decode from the raw stored string.
    pub fn decode(text: &str) -> Self {
        if text.is_empty() {
            Self(None)
        } else {
            Self(Some(text.to_string()))
        }
    }
}

fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConfigError> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Errors from record validation and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// No profile stored for this SSID.
    UnknownSsid(String),
    /// Stored bytes do not decode into the expected record shape.
    BadRecord(String),
}

impl ConfigError {
    fn bad_literal(e: crate::literal::LiteralError) -> Self {
        Self::BadRecord(e.to_string())
    }

    fn bad_shape(what: &str, got: &Literal) -> Self {
        Self::BadRecord(format!("{}: {:?}", what, got))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::UnknownSsid(ssid) => write!(f, "no stored profile for {:?}", ssid),
            Self::BadRecord(msg) => write!(f, "bad record: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== StationProfiles Tests ====================

    #[test]
    fn test_empty_profiles_encode() {
        let profiles = StationProfiles::new();
        assert!(profiles.is_empty());
        assert_eq!(profiles.encode(), "{}");
    }

    #[test]
    fn test_add_and_lookup() {
        let mut profiles = StationProfiles::new();
        profiles.add("home", "pw1").unwrap();
        profiles.add("work", "pw2").unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles.password_for("home"), Some("pw1"));
        assert_eq!(profiles.password_for("cafe"), None);
    }

    #[test]
    fn test_add_empty_ssid_rejected() {
        let mut profiles = StationProfiles::new();
        assert_eq!(profiles.add("", "pw"), Err(ConfigError::SsidEmpty));
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_add_open_network() {
        let mut profiles = StationProfiles::new();
        profiles.add("cafe", "").unwrap();
        assert_eq!(profiles.password_for("cafe"), Some(""));
    }

    #[test]
    fn test_add_replaces_existing() {
        let mut profiles = StationProfiles::new();
        profiles.add("home", "old").unwrap();
        profiles.add("home", "new").unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles.password_for("home"), Some("new"));
        assert_eq!(
            profiles.ssids().iter().filter(|s| *s == "home").count(),
            1
        );
    }

    #[test]
    fn test_remove_existing() {
        let mut profiles = StationProfiles::new();
        profiles.add("home", "pw1").unwrap();
        profiles.add("work", "pw2").unwrap();
        profiles.remove("home").unwrap();
        assert!(!profiles.contains("home"));
        assert_eq!(profiles.password_for("work"), Some("pw2"));
    }

    #[test]
    fn test_remove_missing() {
        let mut profiles = StationProfiles::new();
        assert_eq!(
            profiles.remove("ghost"),
            Err(ConfigError::UnknownSsid("ghost".to_string()))
        );
    }

    #[test]
    fn test_remove_leaves_others_byte_identical() {
        let mut profiles = StationProfiles::new();
        profiles.add("home", "pw1").unwrap();
        profiles.add("work", "pw2").unwrap();
        profiles.add("cafe", "").unwrap();

        let mut expected = StationProfiles::new();
        expected.add("home", "pw1").unwrap();
        expected.add("cafe", "").unwrap();

        profiles.remove("work").unwrap();
        assert_eq!(profiles.encode(), expected.encode());
    }

    #[test]
    fn test_profiles_round_trip() {
        let mut profiles = StationProfiles::new();
        profiles.add("home", "pw1").unwrap();
        profiles.add("cafe", "").unwrap();
        let decoded = StationProfiles::decode(&profiles.encode()).unwrap();
        assert_eq!(decoded, profiles);
    }

    #[test]
    fn test_profiles_decode_rejects_non_map() {
        assert!(matches!(
            StationProfiles::decode("42"),
            Err(ConfigError::BadRecord(_))
        ));
    }

    #[test]
    fn test_profiles_decode_rejects_int_password() {
        assert!(matches!(
            StationProfiles::decode("{'home': 3}"),
            Err(ConfigError::BadRecord(_))
        ));
    }

    // ==================== ApIdentity Tests ====================

    #[test]
    fn test_identity_secured() {
        let identity = ApIdentity::new("MyAp", "hunter22").unwrap();
        assert_eq!(identity.password.as_deref(), Some("hunter22"));
    }

    #[test]
    fn test_identity_open() {
        let identity = ApIdentity::open("MyAp").unwrap();
        assert!(identity.password.is_none());
    }

    #[test]
    fn test_identity_empty_ssid_rejected() {
        assert_eq!(ApIdentity::open(""), Err(ConfigError::SsidEmpty));
    }

    #[test]
    fn test_identity_round_trip() {
        for identity in [
            ApIdentity::new("MyAp", "hunter22").unwrap(),
            ApIdentity::open("Bare").unwrap(),
        ] {
            let decoded = ApIdentity::decode(&identity.encode()).unwrap();
            assert_eq!(decoded, identity);
        }
    }

    #[test]
    fn test_identity_default_matches_first_run_record() {
        let identity = ApIdentity::default_identity();
        assert_eq!(identity.encode(), "{'ESP_Station': 'MicroPython'}");
    }

    #[test]
    fn test_identity_decode_rejects_multiple_entries() {
        assert!(matches!(
            ApIdentity::decode("{'a': 'x', 'b': 'y'}"),
            Err(ConfigError::BadRecord(_))
        ));
    }

    // ==================== ApSettings Tests ====================

    #[test]
    fn test_settings_clamped_above_maximum() {
        assert_eq!(ApSettings::clamped(15).max_clients, 10);
        assert_eq!(ApSettings::clamped(10).max_clients, 10);
    }

    #[test]
    fn test_settings_no_lower_clamp() {
        assert_eq!(ApSettings::clamped(0).max_clients, 0);
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = ApSettings::clamped(4);
        assert_eq!(settings.encode(), "{'max_client/s': 4}");
        assert_eq!(ApSettings::decode(&settings.encode()).unwrap(), settings);
    }

    #[test]
    fn test_settings_decode_rejects_string_value() {
        assert!(matches!(
            ApSettings::decode("{'max_client/s': 'many'}"),
            Err(ConfigError::BadRecord(_))
        ));
    }

    #[test]
    fn test_settings_decode_rejects_missing_key() {
        assert!(matches!(
            ApSettings::decode("{}"),
            Err(ConfigError::BadRecord(_))
        ));
    }

    // ==================== ActiveConnection Tests ====================

    #[test]
    fn test_active_connection_sentinel() {
        let none = ActiveConnection::none();
        assert_eq!(none.ssid(), None);
        assert_eq!(none.encode(), "");
        assert_eq!(ActiveConnection::decode(""), none);
    }

    #[test]
    fn test_active_connection_round_trip() {
        let active = ActiveConnection::some("home");
        assert_eq!(active.encode(), "home");
        assert_eq!(ActiveConnection::decode("home"), active);
        assert_eq!(active.ssid(), Some("home"));
    }
}

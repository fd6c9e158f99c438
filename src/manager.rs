//! Connection manager: brings the radios into a known-good state and keeps
//! the station associated with a known network whenever possible.
//!
//! The manager owns the store, the radio, and the clock — there is no
//! ambient shared state. Execution is single-threaded and blocking: scan,
//! connect, and the bounded retry loop all suspend the caller, and there
//! is no cancellation short of external reset. Worst case a single
//! candidate blocks for the settle delays plus ten two-second polls.
//!
//! Known limitation: once `Connected`, the machine does not re-enter
//! scanning on its own if the station later disassociates. A new cycle
//! starts only when a caller invokes [`ConnectionManager::connect_automatically`]
//! again.

use crate::config::{ActiveConnection, ApIdentity, ApSettings, ConfigError};
use crate::radio::{Clock, Radio, RadioError};
use crate::store::{ProfileStore, RecordId, StorageBackend, StoreError};
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

/// Delay between `is_connected` polls while associating.
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll budget per connection candidate.
pub const MAX_CONNECT_ATTEMPTS: u32 = 10;

/// Settle time after toggling the station radio before connecting.
pub const STATION_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Settle time after toggling the station radio before scanning.
pub const SCAN_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Where the state machine currently rests.
///
/// `Connected` and `NoProfiles` are the stable rest states;
/// `RetryExhausted` always advances to the next candidate or falls back to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    ApplyingApConfig,
    NoProfiles,
    ScanningForStation,
    Matching,
    Connecting,
    Connected,
    RetryExhausted,
}

/// How a connection cycle ended. `NoProfiles` and `NoMatch` are valid
/// outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The station associated with `ssid` during this cycle.
    Connected { ssid: String },
    /// The station was already associated when the cycle started.
    AlreadyAssociated,
    /// No stored profiles; stable until one is added.
    NoProfiles,
    /// No visible network matched a stored profile.
    NoMatch,
    /// Every candidate exhausted its retry budget.
    RetryExhausted,
}

/// Errors surfaced by manager operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// Store failure (unavailable backing resource, corrupt record, I/O).
    Store(StoreError),
    /// Radio driver failure.
    Radio(RadioError),
    /// Rejected caller input: empty SSID, unknown selector. The operation
    /// aborts without mutating state.
    InvalidInput(String),
    /// The retry budget for `ssid` ran out without an association.
    ConnectionTimeout { ssid: String },
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {}", e),
            Self::Radio(e) => write!(f, "radio error: {}", e),
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::ConnectionTimeout { ssid } => {
                write!(
                    f,
                    "gave up connecting to {:?} after {} attempts",
                    ssid, MAX_CONNECT_ATTEMPTS
                )
            }
        }
    }
}

impl std::error::Error for StationError {}

impl From<StoreError> for StationError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RadioError> for StationError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<ConfigError> for StationError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Orchestrates AP configuration, scanning, profile matching, and
/// bounded-retry connection. Sole writer of the store for the process
/// lifetime; interactive layers act through these operations only.
pub struct ConnectionManager<B: StorageBackend, R: Radio, C: Clock> {
    store: ProfileStore<B>,
    radio: R,
    clock: C,
    state: ConnectionState,
    #[cfg(test)]
    transitions: Vec<ConnectionState>,
}

impl<B: StorageBackend, R: Radio, C: Clock> ConnectionManager<B, R, C> {
    /// Build a manager in the `Idle` state.
    pub fn new(store: ProfileStore<B>, radio: R, clock: C) -> Self {
        Self {
            store,
            radio,
            clock,
            state: ConnectionState::Idle,
            #[cfg(test)]
            transitions: Vec::new(),
        }
    }

    /// Current state machine position.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn enter(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("state {:?} -> {:?}", self.state, state);
            self.state = state;
            #[cfg(test)]
            self.transitions.push(state);
        }
    }

    /// Boot-time sequence: configure and activate the AP from the stored
    /// records, then bring the station onto a known network if possible.
    pub fn boot_sequence(&mut self) -> Result<ConnectOutcome, StationError> {
        self.enter(ConnectionState::ApplyingApConfig);
        self.apply_access_point()?;

        if self.store.station_profiles()?.is_empty() {
            warn!("No saved networks; station stays down until a profile is added");
            self.enter(ConnectionState::NoProfiles);
            return Ok(ConnectOutcome::NoProfiles);
        }

        if self.radio.is_connected() {
            info!("Station already associated, skipping scan");
            self.enter(ConnectionState::Connected);
            return Ok(ConnectOutcome::AlreadyAssociated);
        }

        self.connect_automatically()
    }

    fn apply_access_point(&mut self) -> Result<(), StationError> {
        let identity = self.store.ap_identity()?;
        let settings = self.store.ap_settings()?;
        // The essid is always applied; the password only when present; the
        // client limit is passed through for boards that expose it.
        self.radio.configure_access_point(
            &identity.ssid,
            identity.password.as_deref(),
            Some(settings.max_clients),
        )?;
        self.radio.set_access_point_active(true)?;
        info!("Discoverable as {:?}", identity.ssid);
        Ok(())
    }

    /// Scan for visible networks, match them against the stored profiles,
    /// and try candidates until one connects.
    ///
    /// Candidates are attempted in order of first appearance in the scan
    /// result, which makes the multi-match case deterministic.
    pub fn connect_automatically(&mut self) -> Result<ConnectOutcome, StationError> {
        let profiles = self.store.station_profiles()?;
        if profiles.is_empty() {
            warn!("No saved networks");
            self.enter(ConnectionState::NoProfiles);
            return Ok(ConnectOutcome::NoProfiles);
        }

        self.enter(ConnectionState::ScanningForStation);
        let visible = self.scan_visible()?;
        debug!("Scan found {} networks", visible.len());

        self.enter(ConnectionState::Matching);
        let mut candidates: Vec<&str> = Vec::new();
        for ssid in &visible {
            if profiles.contains(ssid) && !candidates.contains(&ssid.as_str()) {
                candidates.push(ssid);
            }
        }

        if candidates.is_empty() {
            info!("No visible network matches a saved profile");
            self.enter(ConnectionState::Idle);
            return Ok(ConnectOutcome::NoMatch);
        }
        info!("Matched saved networks: {:?}", candidates);

        for candidate in candidates {
            let password = match profiles.password_for(candidate) {
                Some(password) => password.to_string(),
                None => continue,
            };
            match self.try_connect(candidate, &password) {
                Ok(()) => {
                    let ssid = candidate.to_string();
                    self.record_connected(&ssid)?;
                    return Ok(ConnectOutcome::Connected { ssid });
                }
                Err(StationError::ConnectionTimeout { ssid }) => {
                    self.enter(ConnectionState::RetryExhausted);
                    warn!("Retry budget exhausted for {:?}, trying next candidate", ssid);
                    self.enter(ConnectionState::Matching);
                }
                Err(e) => return Err(e),
            }
        }

        warn!("All candidates failed");
        self.enter(ConnectionState::Idle);
        Ok(ConnectOutcome::RetryExhausted)
    }

    /// Connect to a specific saved network, bypassing scan and match.
    ///
    /// `InvalidInput` if no profile is stored for `ssid`;
    /// `ConnectionTimeout` if the retry budget runs out.
    pub fn connect_manually(&mut self, ssid: &str) -> Result<ConnectOutcome, StationError> {
        let profiles = self.store.station_profiles()?;
        let password = profiles
            .password_for(ssid)
            .ok_or_else(|| StationError::InvalidInput(format!("no stored profile for {:?}", ssid)))?
            .to_string();

        match self.try_connect(ssid, &password) {
            Ok(()) => {
                self.record_connected(ssid)?;
                Ok(ConnectOutcome::Connected {
                    ssid: ssid.to_string(),
                })
            }
            Err(e) => {
                if matches!(e, StationError::ConnectionTimeout { .. }) {
                    // No further candidates on the manual path, so the
                    // exhausted state falls straight back to idle.
                    self.enter(ConnectionState::RetryExhausted);
                    self.enter(ConnectionState::Idle);
                }
                Err(e)
            }
        }
    }

    fn scan_visible(&mut self) -> Result<Vec<String>, StationError> {
        // Toggle the station radio to clear stale state before scanning.
        self.radio.set_station_active(false)?;
        self.clock.sleep(SCAN_SETTLE_DELAY);
        self.radio.set_station_active(true)?;
        Ok(self.radio.scan()?)
    }

    /// The `Connecting` sequence: toggle, settle, connect, then poll the
    /// association up to [`MAX_CONNECT_ATTEMPTS`] times, reissuing the
    /// connect after each failed poll.
    fn try_connect(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        self.enter(ConnectionState::Connecting);
        info!("Connecting to {:?}...", ssid);

        self.radio.set_station_active(false)?;
        self.clock.sleep(STATION_SETTLE_DELAY);
        self.radio.set_station_active(true)?;
        self.radio.connect(ssid, password)?;

        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            self.clock.sleep(CONNECT_POLL_INTERVAL);
            if self.radio.is_connected() {
                info!("Connected to {:?} after {} poll(s)", ssid, attempt);
                return Ok(());
            }
            debug!("Not connected yet ({}/{})", attempt, MAX_CONNECT_ATTEMPTS);
            if attempt < MAX_CONNECT_ATTEMPTS {
                self.radio.connect(ssid, password)?;
            }
        }

        Err(StationError::ConnectionTimeout {
            ssid: ssid.to_string(),
        })
    }

    fn record_connected(&mut self, ssid: &str) -> Result<(), StationError> {
        self.store
            .set_active_connection(&ActiveConnection::some(ssid))?;
        self.enter(ConnectionState::Connected);
        if let Some(addr) = self.radio.address_info() {
            info!("Network config: {}", addr);
        }
        Ok(())
    }

    /// Merge `{ssid: password}` into the stored profiles (put + flush).
    pub fn add_profile(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        let mut profiles = self.store.station_profiles()?;
        profiles.add(ssid, password)?;
        self.store.set_station_profiles(&profiles)?;
        info!("Saved network {:?} ({} total)", ssid, profiles.len());
        Ok(())
    }

    /// Remove the stored profile for `ssid` (put + flush).
    ///
    /// `InvalidInput` when no such profile exists.
    pub fn delete_profile(&mut self, ssid: &str) -> Result<(), StationError> {
        let mut profiles = self.store.station_profiles()?;
        profiles.remove(ssid)?;
        self.store.set_station_profiles(&profiles)?;
        info!("Removed network {:?} ({} left)", ssid, profiles.len());
        Ok(())
    }

    /// Snapshot of the stored SSIDs for display. Ordering is not stable
    /// between separate calls; callers must not depend on index stability.
    pub fn list_profiles(&mut self) -> Result<Vec<String>, StationError> {
        Ok(self.store.station_profiles()?.ssids())
    }

    /// Persist a new AP identity and settings (two puts + flush).
    ///
    /// `max_clients` above 10 is clamped, not rejected; there is no lower
    /// clamp. The new records take effect at the next boot/apply cycle —
    /// the AP radio is deliberately not reconfigured live, so a restart is
    /// required.
    pub fn set_access_point(
        &mut self,
        identity: &ApIdentity,
        settings: ApSettings,
    ) -> Result<(), StationError> {
        // Reject unvalidated struct-literal identities before any put:
        // decode re-validates on read, so persisting one would turn a
        // caller error into a corrupt record at the next boot.
        identity.validate()?;
        let settings = ApSettings::clamped(settings.max_clients);
        self.store
            .put(RecordId::ApIdentity, identity.encode().as_bytes())?;
        self.store
            .put(RecordId::ApSettings, settings.encode().as_bytes())?;
        self.store.flush()?;
        info!(
            "AP records updated (ssid {:?}, max clients {}); restart required to apply",
            identity.ssid, settings.max_clients
        );
        Ok(())
    }

    /// Store access for state inspection in tests.
    #[cfg(test)]
    fn store_mut(&mut self) -> &mut ProfileStore<B> {
        &mut self.store
    }
}

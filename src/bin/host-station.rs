//! Host-based station for development and testing.
//!
//! Runs the full boot sequence on the host machine against a file-backed
//! store and a scripted radio, so the state machine can be exercised
//! without hardware or real radio delays.
//!
//! # Usage
//!
//! ```bash
//! STATION_ADD_SSID=home STATION_ADD_PASSWORD=pw1 \
//! STATION_VISIBLE="cafe,home,office" cargo run --bin host-station
//! ```

use log::{error, info};
use std::time::Duration;
use wifi_station_esp32::{
    Clock, ConnectionManager, FileBackend, ProfileStore, Radio, RadioError,
};

/// Scripted radio standing in for the driver on the host.
struct ScriptedRadio {
    visible: Vec<String>,
    target: Option<String>,
}

impl ScriptedRadio {
    fn from_env() -> Self {
        let visible = std::env::var("STATION_VISIBLE")
            .unwrap_or_else(|_| "cafe,home,office".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            visible,
            target: None,
        }
    }
}

impl Radio for ScriptedRadio {
    fn set_station_active(&mut self, active: bool) -> Result<(), RadioError> {
        info!("[radio] station active = {}", active);
        Ok(())
    }

    fn configure_access_point(
        &mut self,
        essid: &str,
        password: Option<&str>,
        max_clients: Option<u8>,
    ) -> Result<(), RadioError> {
        info!(
            "[radio] AP config: essid={:?} secured={} max_clients={:?}",
            essid,
            password.is_some(),
            max_clients
        );
        Ok(())
    }

    fn set_access_point_active(&mut self, active: bool) -> Result<(), RadioError> {
        info!("[radio] AP active = {}", active);
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<String>, RadioError> {
        info!("[radio] scan -> {:?}", self.visible);
        Ok(self.visible.clone())
    }

    fn connect(&mut self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        info!("[radio] connect({:?})", ssid);
        self.target = Some(ssid.to_string());
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        // Any scripted connect "succeeds" on the first poll.
        self.target.is_some()
    }

    fn address_info(&mut self) -> Option<String> {
        self.target.as_ref().map(|_| "192.168.1.50".to_string())
    }
}

/// Clock that logs instead of sleeping, so a scripted run is instant.
struct InstantClock;

impl Clock for InstantClock {
    fn sleep(&mut self, duration: Duration) {
        info!("[clock] skip {:?} sleep", duration);
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== Host station starting ===");

    let path = match std::env::var("STATION_DB") {
        Ok(path) => path.into(),
        Err(_) => match FileBackend::default_path() {
            Ok(path) => path,
            Err(e) => {
                error!("No usable store path: {}", e);
                std::process::exit(1);
            }
        },
    };
    info!("Store file: {:?}", path);

    let backend = match FileBackend::open(&path) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Storage unavailable: {}", e);
            std::process::exit(1);
        }
    };
    let mut store = ProfileStore::new(backend);

    // On the device this path ends in a controlled restart; for host
    // development we just continue with the fresh defaults.
    match store.is_initialized() {
        Ok(true) => {}
        Ok(false) => {
            info!("First run: writing default records");
            if let Err(e) = store.initialize_defaults() {
                error!("Failed to write defaults: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Cannot inspect store: {}", e);
            std::process::exit(1);
        }
    }

    let mut manager = ConnectionManager::new(store, ScriptedRadio::from_env(), InstantClock);

    if let Ok(ssid) = std::env::var("STATION_ADD_SSID") {
        let password = std::env::var("STATION_ADD_PASSWORD").unwrap_or_default();
        match manager.add_profile(&ssid, &password) {
            Ok(()) => info!("Added profile {:?}", ssid),
            Err(e) => {
                error!("Cannot add profile: {}", e);
                std::process::exit(1);
            }
        }
    }

    match manager.list_profiles() {
        Ok(ssids) => info!("Saved networks: {:?}", ssids),
        Err(e) => {
            error!("Cannot list profiles: {}", e);
            std::process::exit(1);
        }
    }

    match manager.boot_sequence() {
        Ok(outcome) => info!("Boot sequence finished: {:?}", outcome),
        Err(e) => {
            error!("Boot sequence failed: {}", e);
            std::process::exit(1);
        }
    }
}

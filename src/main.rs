//! Wi-Fi station firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    println!("=== Wi-Fi station starting ===");

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info, warn};
    use std::time::Duration;
    use wifi_station_esp32::{
        ConnectOutcome, ConnectionManager, EspRadio, NvsBackend, ProfileStore, SystemClock,
    };

    /// Pause so serial output flushes, then reboot the device.
    fn restart() -> ! {
        std::thread::sleep(Duration::from_secs(4));
        esp_idf_hal::reset::restart();
    }

    // Open the record store. An unavailable backing resource is
    // unrecoverable here: report and reboot.
    let backend = match NvsBackend::open() {
        Ok(backend) => backend,
        Err(e) => {
            error!("Storage unavailable: {}", e);
            restart();
        }
    };
    let mut store = ProfileStore::new(backend);

    // First run: write default records, then restart so the configuration
    // takes effect from a clean boot.
    match store.is_initialized() {
        Ok(true) => {}
        Ok(false) => {
            warn!("No saved records; writing defaults and restarting");
            if let Err(e) = store.initialize_defaults() {
                error!("Failed to write defaults: {}", e);
            }
            restart();
        }
        Err(e) => {
            error!("Cannot inspect store: {}", e);
            restart();
        }
    }

    let peripherals = match esp_idf_hal::peripherals::Peripherals::take() {
        Ok(peripherals) => peripherals,
        Err(e) => {
            error!("Failed to take peripherals: {:?}", e);
            restart();
        }
    };
    let sysloop = match EspSystemEventLoop::take() {
        Ok(sysloop) => sysloop,
        Err(e) => {
            error!("Failed to take system event loop: {:?}", e);
            restart();
        }
    };
    let radio = match EspRadio::new(peripherals.modem, sysloop) {
        Ok(radio) => radio,
        Err(e) => {
            error!("Failed to initialize radio: {}", e);
            restart();
        }
    };

    let mut manager = ConnectionManager::new(store, radio, SystemClock);

    match manager.boot_sequence() {
        Ok(ConnectOutcome::Connected { ssid }) => info!("Joined {:?}", ssid),
        Ok(ConnectOutcome::AlreadyAssociated) => info!("Station already associated"),
        Ok(ConnectOutcome::NoProfiles) => info!("AP up; no saved networks to join"),
        Ok(ConnectOutcome::NoMatch) => info!("AP up; no saved network in range"),
        Ok(ConnectOutcome::RetryExhausted) => {
            warn!("AP up; could not join any saved network")
        }
        Err(e) => error!("Boot sequence failed: {}", e),
    }

    info!("Entering main loop...");
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-station' for host development.");
}

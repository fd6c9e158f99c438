//! Profile seeding utility for ESP32.
//!
//! Stores one station profile so the main firmware can join the network
//! on its next boot.
//!
//! Usage:
//!   STATION_SSID="MyNetwork" STATION_PASSWORD="secret" cargo run --bin configure-station --features esp32
//!
//! For open networks (no password):
//!   STATION_SSID="OpenNetwork" STATION_PASSWORD="" cargo run --bin configure-station --features esp32
//!
//! After running this once, the device will remember the profile across reboots.

/// Station SSID - set via STATION_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const STATION_SSID: Option<&str> = option_env!("STATION_SSID");

/// Station password - set via STATION_PASSWORD environment variable at
/// compile time. Empty string for open networks.
#[cfg(feature = "esp32")]
const STATION_PASSWORD: Option<&str> = option_env!("STATION_PASSWORD");

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    // Brief pause to ensure serial output is flushed before process exits
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use wifi_station_esp32::{NvsBackend, ProfileStore};

    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== Station Profile Utility ===\n");

    // Check for compile-time credentials
    let ssid = match STATION_SSID {
        Some(s) if !s.is_empty() => s,
        _ => {
            halt_with_error(
                "Error: STATION_SSID environment variable not set at compile time.\n\n\
                 Usage:\n  \
                 STATION_SSID=\"MyNetwork\" STATION_PASSWORD=\"secret\" cargo run --bin configure-station --features esp32\n\n\
                 For open networks:\n  \
                 STATION_SSID=\"OpenNetwork\" STATION_PASSWORD=\"\" cargo run --bin configure-station --features esp32",
            );
        }
    };

    let password = STATION_PASSWORD.unwrap_or("");

    println!("SSID: {}", ssid);
    println!(
        "Password: {}",
        if password.is_empty() { "(open network)" } else { "(set)" }
    );

    let backend = match NvsBackend::open() {
        Ok(backend) => backend,
        Err(e) => halt_with_error(&format!("Error: storage unavailable: {}", e)),
    };
    let mut store = ProfileStore::new(backend);

    match store.is_initialized() {
        Ok(true) => {}
        Ok(false) => {
            println!("First run: writing default records");
            if let Err(e) = store.initialize_defaults() {
                halt_with_error(&format!("Error: cannot write defaults: {}", e));
            }
        }
        Err(e) => halt_with_error(&format!("Error: cannot inspect store: {}", e)),
    }

    let mut profiles = match store.station_profiles() {
        Ok(profiles) => profiles,
        Err(e) => halt_with_error(&format!("Error: cannot read profiles: {}", e)),
    };
    if let Err(e) = profiles.add(ssid, password) {
        halt_with_error(&format!("Error: {}", e));
    }
    if let Err(e) = store.set_station_profiles(&profiles) {
        halt_with_error(&format!("Error: cannot persist profiles: {}", e));
    }

    println!("\nProfile for {:?} saved ({} total)", ssid, profiles.len());
    println!("\n=== Configuration complete ===\n");
    println!("The station will try this network on its next boot.");
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This utility requires the 'esp32' feature.");
    println!("Build with: cargo run --bin configure-station --features esp32");
}

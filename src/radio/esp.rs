//! ESP-IDF implementation of the [`Radio`] capability.
//!
//! Drives both radio roles through one `BlockingWifi<EspWifi>` handle with
//! a mixed client + access-point configuration. The two halves of the
//! configuration are cached so reconfiguring one role does not clobber the
//! other.

use super::{Radio, RadioError};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi,
};
use esp_idf_sys::EspError;
use log::{debug, info};

/// ESP-IDF radio driver wrapper.
pub struct EspRadio<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    client: ClientConfiguration,
    access_point: AccessPointConfiguration,
    started: bool,
}

impl<'a> EspRadio<'a> {
    /// Create a new radio handle over the modem peripheral.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, RadioError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), None).map_err(driver)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(driver)?;
        Ok(Self {
            wifi,
            client: ClientConfiguration::default(),
            access_point: AccessPointConfiguration::default(),
            started: false,
        })
    }

    fn apply_configuration(&mut self) -> Result<(), RadioError> {
        self.wifi
            .set_configuration(&Configuration::Mixed(
                self.client.clone(),
                self.access_point.clone(),
            ))
            .map_err(driver)
    }

    fn ensure_started(&mut self) -> Result<(), RadioError> {
        if !self.started {
            self.wifi.start().map_err(driver)?;
            self.started = true;
        }
        Ok(())
    }
}

impl<'a> Radio for EspRadio<'a> {
    fn set_station_active(&mut self, active: bool) -> Result<(), RadioError> {
        if active {
            self.ensure_started()
        } else {
            // Dropping the association is the closest the driver offers to
            // deactivating the station role alone.
            if self.wifi.is_connected().unwrap_or(false) {
                self.wifi.disconnect().map_err(driver)?;
            }
            Ok(())
        }
    }

    fn configure_access_point(
        &mut self,
        essid: &str,
        password: Option<&str>,
        max_clients: Option<u8>,
    ) -> Result<(), RadioError> {
        let mut ap = AccessPointConfiguration {
            ssid: essid.try_into().map_err(|_| RadioError::InvalidSsid)?,
            ..Default::default()
        };
        match password {
            Some(password) if !password.is_empty() => {
                ap.password = password
                    .try_into()
                    .map_err(|_| RadioError::InvalidPassword)?;
                ap.auth_method = AuthMethod::WPA2Personal;
            }
            _ => {
                ap.auth_method = AuthMethod::None;
            }
        }
        if let Some(max_clients) = max_clients {
            ap.max_connections = u16::from(max_clients);
        }
        debug!(
            "AP config: essid={} secured={} max_connections={}",
            essid,
            ap.auth_method != AuthMethod::None,
            ap.max_connections
        );
        self.access_point = ap;
        self.apply_configuration()
    }

    fn set_access_point_active(&mut self, active: bool) -> Result<(), RadioError> {
        if active {
            self.ensure_started()?;
            info!("AP active, discoverable as {}", self.access_point.ssid);
            Ok(())
        } else {
            self.wifi.stop().map_err(driver)?;
            self.started = false;
            Ok(())
        }
    }

    fn scan(&mut self) -> Result<Vec<String>, RadioError> {
        self.ensure_started()?;
        let found = self.wifi.scan().map_err(driver)?;
        // Keep the driver's report order; callers treat it as meaningful.
        Ok(found.into_iter().map(|ap| ap.ssid.to_string()).collect())
    }

    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        self.client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::InvalidSsid)?,
            password: password.try_into().map_err(|_| RadioError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.apply_configuration()?;
        self.ensure_started()?;

        self.wifi.connect().map_err(driver)?;
        // Wait for DHCP so address_info is answerable right after connect
        self.wifi.wait_netif_up().map_err(driver)?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn address_info(&mut self) -> Option<String> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| format!("{}", info.ip))
    }
}

fn driver(e: EspError) -> RadioError {
    RadioError::Driver(format!("{:?}", e))
}

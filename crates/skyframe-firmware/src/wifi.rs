use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::{debug, info};

use skyframe::connectivity::LinkDriver;
use skyframe::error::NetworkError;

use crate::debug_flags::{self, DEBUG_WIFI};

/// Log WiFi/AP state from ESP-IDF internals.
fn log_wifi_diag(label: &str) {
    unsafe {
        let mut ap_info: esp_idf_sys::wifi_ap_record_t = core::mem::zeroed();
        let rc = esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info);
        if rc == esp_idf_sys::ESP_OK {
            let ssid = core::str::from_utf8(&ap_info.ssid)
                .unwrap_or("?")
                .trim_end_matches('\0');
            info!(
                "WiFi [{}]: assoc=YES rssi={} ch={} ssid={}",
                label, ap_info.rssi, ap_info.primary, ssid
            );
        } else {
            info!("WiFi [{}]: assoc=NO (ap_info err={})", label, rc);
        }
    }
}

/// Station-mode radio driven by the core's connectivity manager.
///
/// `start_connect` only asks the driver to associate; progress is observed
/// through `is_connected` on later loop iterations, so nothing here blocks.
pub struct WifiLink {
    wifi: Box<EspWifi<'static>>,
    ssid: String,
    started: bool,
    was_up: bool,
}

impl WifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        ssid: &str,
        password: &str,
    ) -> Result<Self> {
        let mut wifi = Box::new(EspWifi::new(modem, sysloop, Some(nvs))?);

        let auth = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let mut wifi_ssid = heapless::String::<32>::new();
        let mut wifi_pass = heapless::String::<64>::new();
        if wifi_ssid.push_str(ssid).is_err() || wifi_pass.push_str(password).is_err() {
            anyhow::bail!("WiFi SSID or password too long");
        }

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: wifi_ssid,
            password: wifi_pass,
            auth_method: auth,
            ..Default::default()
        }))?;

        Ok(Self { wifi, ssid: ssid.to_string(), started: false, was_up: false })
    }

    pub fn ip_address(&self) -> Option<String> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        Some(info.ip.to_string())
    }
}

impl LinkDriver for WifiLink {
    fn is_connected(&mut self) -> bool {
        let up = self.wifi.is_connected().unwrap_or(false)
            && self.wifi.sta_netif().is_up().unwrap_or(false);
        if up != self.was_up {
            self.was_up = up;
            if up {
                info!(
                    "WiFi connected to '{}', IP: {}",
                    self.ssid,
                    self.ip_address().unwrap_or_else(|| "?".into())
                );
            }
            if debug_flags::is_on(&DEBUG_WIFI) {
                log_wifi_diag(if up { "up" } else { "down" });
            }
        }
        up
    }

    fn start_connect(&mut self) -> Result<(), NetworkError> {
        if self.ssid.is_empty() {
            return Err(NetworkError::Connect(
                "no SSID configured (console: wifi set <ssid> <pass>)".into(),
            ));
        }
        if !self.started {
            self.wifi
                .start()
                .map_err(|e| NetworkError::Connect(format!("wifi start: {}", e)))?;
            self.started = true;
        } else {
            // Drop any half-finished association before trying again.
            if let Err(e) = self.wifi.disconnect() {
                debug!("WiFi disconnect before retry failed: {}", e);
            }
        }
        debug!("WiFi associating with '{}'", self.ssid);
        self.wifi
            .connect()
            .map_err(|e| NetworkError::Connect(format!("wifi connect: {}", e)))
    }
}

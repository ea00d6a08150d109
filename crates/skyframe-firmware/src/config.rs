use anyhow::Result;
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::info;
use skyframe::config::{DEFAULT_QUALITY, DEFAULT_REFRESH_MS, DEFAULT_SERVER_URL};
use skyframe::Settings;

pub const NS: &str = "skyframe";

const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASS: &str = "wifi_pass";
const KEY_SERVER_URL: &str = "server_url";
const KEY_QUALITY: &str = "quality";
const KEY_REFRESH_S: &str = "refresh_s";

const DEFAULT_WIFI_SSID: &str = match option_env!("LOCAL_WIFI_SSID") {
    Some(v) => v,
    None => "",
};
const DEFAULT_WIFI_PASS: &str = match option_env!("LOCAL_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const BUILD_SERVER_URL: &str = match option_env!("LOCAL_SERVER_URL") {
    Some(v) => v,
    None => DEFAULT_SERVER_URL,
};

/// Device configuration persisted in NVS.
#[derive(Debug, Clone)]
pub struct Config {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub server_url: String,
    pub quality: u8,
    pub refresh_s: u32,
}

/// Read a string from NVS, returning None if the key is absent or empty.
fn nvs_get_str(nvs: &EspNvs<NvsDefault>, key: &str) -> Option<String> {
    let len = match nvs.str_len(key) {
        Ok(Some(len)) => len,
        _ => return None,
    };

    let mut buf = vec![0u8; len];
    match nvs.get_str(key, &mut buf) {
        Ok(Some(val)) => {
            let s = val.trim_end_matches('\0').to_string();
            if s.is_empty() { None } else { Some(s) }
        }
        _ => None,
    }
}

impl Config {
    /// Load configuration from NVS, falling back to build-time defaults for
    /// any missing keys.
    pub fn load(nvs: &EspNvs<NvsDefault>) -> Config {
        let wifi_ssid = nvs_get_str(nvs, KEY_WIFI_SSID)
            .unwrap_or_else(|| DEFAULT_WIFI_SSID.to_string());
        info!("NVS wifi_ssid = {:?}", wifi_ssid);

        let wifi_pass = nvs_get_str(nvs, KEY_WIFI_PASS)
            .unwrap_or_else(|| DEFAULT_WIFI_PASS.to_string());
        info!("NVS wifi_pass = <{} chars>", wifi_pass.len());

        let server_url = nvs_get_str(nvs, KEY_SERVER_URL)
            .unwrap_or_else(|| BUILD_SERVER_URL.to_string());
        info!("NVS server_url = {:?}", server_url);

        let quality = nvs.get_u8(KEY_QUALITY).unwrap_or(None).unwrap_or(DEFAULT_QUALITY);
        info!("NVS quality = {}", quality);

        let refresh_s = nvs
            .get_u32(KEY_REFRESH_S)
            .unwrap_or(None)
            .unwrap_or((DEFAULT_REFRESH_MS / 1000) as u32);
        info!("NVS refresh_s = {}", refresh_s);

        Config { wifi_ssid, wifi_pass, server_url, quality, refresh_s }
    }

    /// Runtime settings for the app; range checks happen in `Settings::validated`.
    pub fn to_settings(&self) -> Settings {
        Settings {
            server_url: self.server_url.clone(),
            jpeg_quality: self.quality,
            refresh_interval_ms: u64::from(self.refresh_s) * 1000,
            ..Settings::default()
        }
    }

    pub fn save_wifi(nvs: &mut EspNvs<NvsDefault>, ssid: &str, pass: &str) -> Result<()> {
        nvs.set_str(KEY_WIFI_SSID, ssid)?;
        nvs.set_str(KEY_WIFI_PASS, pass)?;
        info!("NVS saved wifi_ssid={:?}", ssid);
        Ok(())
    }

    pub fn save_server_url(nvs: &mut EspNvs<NvsDefault>, url: &str) -> Result<()> {
        nvs.set_str(KEY_SERVER_URL, url)?;
        info!("NVS saved server_url={:?}", url);
        Ok(())
    }

    pub fn save_quality(nvs: &mut EspNvs<NvsDefault>, quality: u8) -> Result<()> {
        nvs.set_u8(KEY_QUALITY, quality)?;
        info!("NVS saved quality={}", quality);
        Ok(())
    }

    pub fn save_refresh(nvs: &mut EspNvs<NvsDefault>, seconds: u32) -> Result<()> {
        nvs.set_u32(KEY_REFRESH_S, seconds)?;
        info!("NVS saved refresh_s={}", seconds);
        Ok(())
    }

    /// Remove the stored credentials so the build-time defaults apply again.
    pub fn clear_wifi(nvs: &mut EspNvs<NvsDefault>) -> Result<()> {
        nvs.remove(KEY_WIFI_SSID)?;
        nvs.remove(KEY_WIFI_PASS)?;
        info!("NVS cleared wifi credentials");
        Ok(())
    }
}

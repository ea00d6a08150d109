use log::{info, warn};

pub const DEFAULT_SERVER_URL: &str = "http://192.168.1.50:5000";
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_REFRESH_MS: u64 = 60_000;
pub const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_WEATHER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_WIFI_RETRY_MS: u64 = 10_000;
pub const DEFAULT_READ_YIELD_MS: u32 = 5;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 512 * 1024;

const MIN_REFRESH_MS: u64 = 5_000;
const MIN_TIMEOUT_MS: u64 = 1_000;

/// Every runtime tunable of the display client.
///
/// The firmware builds one of these from NVS at boot; tests construct it
/// directly. Call [`Settings::validated`] before handing it to the app.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub image_width: u32,
    pub image_height: u32,
    pub jpeg_quality: u8,
    pub rotation_deg: u16,
    pub refresh_interval_ms: u64,
    pub image_timeout_ms: u64,
    pub weather_timeout_ms: u64,
    pub debounce_ms: u64,
    pub wifi_retry_ms: u64,
    pub read_yield_ms: u32,
    pub max_image_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            image_width: crate::layout::SCREEN_W_PORTRAIT as u32,
            image_height: crate::layout::SCREEN_H_PORTRAIT as u32,
            jpeg_quality: DEFAULT_QUALITY,
            rotation_deg: 0,
            refresh_interval_ms: DEFAULT_REFRESH_MS,
            image_timeout_ms: DEFAULT_IMAGE_TIMEOUT_MS,
            weather_timeout_ms: DEFAULT_WEATHER_TIMEOUT_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            wifi_retry_ms: DEFAULT_WIFI_RETRY_MS,
            read_yield_ms: DEFAULT_READ_YIELD_MS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl Settings {
    /// Clamp every field into its usable range, logging each correction.
    pub fn validated(mut self) -> Self {
        let url = self.server_url.trim().trim_end_matches('/').to_string();
        if url != self.server_url {
            info!("config: server_url normalised to {:?}", url);
            self.server_url = url;
        }
        if self.server_url.is_empty() {
            warn!("config: empty server_url, using {}", DEFAULT_SERVER_URL);
            self.server_url = DEFAULT_SERVER_URL.to_string();
        }

        let quality = self.jpeg_quality.clamp(1, 100);
        if quality != self.jpeg_quality {
            warn!("config: jpeg_quality {} clamped to {}", self.jpeg_quality, quality);
            self.jpeg_quality = quality;
        }

        let rotation = normalize_rotation(self.rotation_deg);
        if rotation != self.rotation_deg {
            warn!("config: rotation {} normalised to {}", self.rotation_deg, rotation);
            self.rotation_deg = rotation;
        }

        let max_w = crate::layout::SCREEN_W_PORTRAIT as u32;
        let max_h = crate::layout::SCREEN_H_PORTRAIT as u32;
        if self.image_width == 0 || self.image_width > max_w {
            warn!("config: image_width {} out of range, using {}", self.image_width, max_w);
            self.image_width = max_w;
        }
        if self.image_height == 0 || self.image_height > max_h {
            warn!("config: image_height {} out of range, using {}", self.image_height, max_h);
            self.image_height = max_h;
        }

        if self.refresh_interval_ms < MIN_REFRESH_MS {
            warn!(
                "config: refresh interval {}ms too short, using {}ms",
                self.refresh_interval_ms, MIN_REFRESH_MS
            );
            self.refresh_interval_ms = MIN_REFRESH_MS;
        }
        self.image_timeout_ms = self.image_timeout_ms.max(MIN_TIMEOUT_MS);
        self.weather_timeout_ms = self.weather_timeout_ms.max(MIN_TIMEOUT_MS);
        self.wifi_retry_ms = self.wifi_retry_ms.max(MIN_TIMEOUT_MS);
        self
    }

    pub fn image_request(&self) -> crate::http::ImageRequest {
        crate::http::ImageRequest {
            width: self.image_width,
            height: self.image_height,
            quality: self.jpeg_quality,
            rotation_deg: self.rotation_deg,
        }
    }
}

/// Snap an arbitrary angle to the nearest quarter turn in `0..360`.
pub fn normalize_rotation(deg: u16) -> u16 {
    let d = deg % 360;
    ((d + 45) / 90 % 4) * 90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_quality_and_trims_url() {
        let s = Settings {
            server_url: " http://10.0.0.2:5000/ ".to_string(),
            jpeg_quality: 0,
            ..Settings::default()
        }
        .validated();
        assert_eq!(s.server_url, "http://10.0.0.2:5000");
        assert_eq!(s.jpeg_quality, 1);
    }

    #[test]
    fn rotation_snaps_to_quarter_turns() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(89), 90);
        assert_eq!(normalize_rotation(270), 270);
        assert_eq!(normalize_rotation(359), 0);
        assert_eq!(normalize_rotation(450), 90);
    }

    #[test]
    fn refresh_has_a_floor() {
        let s = Settings { refresh_interval_ms: 10, ..Settings::default() }.validated();
        assert_eq!(s.refresh_interval_ms, MIN_REFRESH_MS);
    }
}

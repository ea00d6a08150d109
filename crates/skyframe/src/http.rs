use embedded_hal::delay::DelayNs;

use crate::error::NetworkError;
use crate::schedule::Clock;

pub const IMAGE_PATH: &str = "/api/latest_image_preview";
pub const WEATHER_PATH: &str = "/api/weather";

pub const HEADER_FILENAME: &str = "X-Image-Filename";
pub const HEADER_TIMESTAMP: &str = "X-Image-Timestamp";
pub const HEADER_EXPOSURE: &str = "X-Image-Exposure-Ms";

/// Minimal blocking HTTP GET client with a pollable body.
///
/// Every `get` opens a fresh connection; nothing is kept alive between
/// requests. Headers and body belong to the most recent `get`.
pub trait HttpTransport {
    /// Connect, send the request and wait for the status line and headers.
    fn get(&mut self, url: &str, timeout_ms: u64) -> Result<u16, NetworkError>;

    fn header(&self, name: &str) -> Option<&str>;

    fn content_length(&self) -> Option<usize>;

    /// Read whatever body bytes are available. `Ok(0)` means none right now;
    /// check [`HttpTransport::is_open`] to tell a pause from the end.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError>;

    fn is_open(&self) -> bool;

    /// Drop the connection.
    fn close(&mut self);
}

/// Parameters for the server-side scale/rotate of the preview image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRequest {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub rotation_deg: u16,
}

impl ImageRequest {
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}{}?width={}&height={}&quality={}&rotate={}",
            base.trim_end_matches('/'),
            IMAGE_PATH,
            self.width,
            self.height,
            self.quality.clamp(1, 100),
            self.rotation_deg
        )
    }
}

pub fn weather_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), WEATHER_PATH)
}

/// Fill `buf` completely from the response body, yielding `yield_ms` between
/// empty polls. Gives up when the peer closes early or `deadline_ms` passes.
pub fn read_exact_polling<H, C, D>(
    http: &mut H,
    buf: &mut [u8],
    clock: &C,
    delay: &mut D,
    deadline_ms: u64,
    yield_ms: u32,
) -> Result<(), NetworkError>
where
    H: HttpTransport + ?Sized,
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
{
    let expected = buf.len();
    let mut received = 0usize;
    while received < expected {
        let n = http.read(&mut buf[received..])?;
        if n > 0 {
            received += n;
            continue;
        }
        if !http.is_open() {
            return Err(NetworkError::Disconnected { received, expected });
        }
        if clock.now_ms() >= deadline_ms {
            return Err(NetworkError::Timeout);
        }
        delay.delay_ms(yield_ms);
    }
    Ok(())
}

/// Read a small body of unknown length, up to `limit` bytes.
pub fn read_small_body<H, C, D>(
    http: &mut H,
    limit: usize,
    clock: &C,
    delay: &mut D,
    deadline_ms: u64,
    yield_ms: u32,
) -> Result<Vec<u8>, NetworkError>
where
    H: HttpTransport + ?Sized,
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
{
    let mut body = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = http.read(&mut chunk)?;
        if n > 0 {
            body.extend_from_slice(&chunk[..n]);
            if body.len() > limit {
                return Err(NetworkError::Transport(format!(
                    "response too large (>{} bytes)",
                    limit
                )));
            }
            if http.content_length() == Some(body.len()) {
                return Ok(body);
            }
            continue;
        }
        if !http.is_open() {
            return Ok(body);
        }
        if clock.now_ms() >= deadline_ms {
            return Err(NetworkError::Timeout);
        }
        delay.delay_ms(yield_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_encodes_all_parameters() {
        let req = ImageRequest { width: 320, height: 480, quality: 85, rotation_deg: 90 };
        assert_eq!(
            req.url("http://10.0.0.5:5000/"),
            "http://10.0.0.5:5000/api/latest_image_preview?width=320&height=480&quality=85&rotate=90"
        );
    }

    #[test]
    fn weather_url_joins_path() {
        assert_eq!(weather_url("http://host"), "http://host/api/weather");
    }
}

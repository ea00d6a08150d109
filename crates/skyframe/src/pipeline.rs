use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::{DecodeError, FetchError, NetworkError};
use crate::http::{
    read_exact_polling, HttpTransport, HEADER_EXPOSURE, HEADER_FILENAME, HEADER_TIMESTAMP,
};
use crate::jpeg::JpegDecoder;
use crate::layout::{SCREEN_H_PORTRAIT, SCREEN_W_PORTRAIT};
use crate::memory::BufferPool;
use crate::render::{Panel, Placeholder, Renderer, Screen};
use crate::schedule::Clock;

/// Log a one-line summary after this many fetches.
pub const STATS_EVERY: u32 = 10;

/// Which capture the server handed out, taken from the response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageIdentity {
    pub filename: String,
    pub timestamp: String,
    pub exposure_ms: u32,
}

impl ImageIdentity {
    pub fn from_headers<H: HttpTransport + ?Sized>(http: &H) -> Self {
        let text = |name: &str| http.header(name).unwrap_or("").trim().to_string();
        Self {
            filename: text(HEADER_FILENAME),
            timestamp: text(HEADER_TIMESTAMP),
            exposure_ms: http
                .header(HEADER_EXPOSURE)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResult {
    Displayed,
    Unchanged,
    NoImagesAvailable,
    CaptureDisabled,
    NetworkFailure,
    HttpError(u16),
    DecodeFailure,
    OutOfMemory,
}

impl FetchResult {
    fn of_error(e: &FetchError) -> Self {
        match e {
            FetchError::Network(_) => FetchResult::NetworkFailure,
            FetchError::Http(status) => FetchResult::HttpError(*status),
            FetchError::Decode(_) => FetchResult::DecodeFailure,
            FetchError::Memory { .. } => FetchResult::OutOfMemory,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub total: u32,
    pub displayed: u32,
    pub unchanged: u32,
    pub idle: u32,
    pub errors: u32,
}

impl FetchStats {
    fn record(&mut self, result: FetchResult) {
        self.total += 1;
        match result {
            FetchResult::Displayed => self.displayed += 1,
            FetchResult::Unchanged => self.unchanged += 1,
            FetchResult::NoImagesAvailable | FetchResult::CaptureDisabled => self.idle += 1,
            _ => self.errors += 1,
        }
        if self.total.is_multiple_of(STATS_EVERY) {
            info!(
                "fetch stats: {} total, {} displayed, {} unchanged, {} idle, {} errors",
                self.total, self.displayed, self.unchanged, self.idle, self.errors
            );
        }
    }
}

enum Fetched {
    Displayed(ImageIdentity),
    /// Some blocks were painted before the stream broke.
    Partial(DecodeError),
    Unchanged,
    Idle(Placeholder),
}

/// Fetch-and-paint cycle for the camera preview.
#[derive(Debug, Default)]
pub struct ImagePipeline {
    last: Option<ImageIdentity>,
    image_shown: bool,
    stats: FetchStats,
    verbose: bool,
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn identity(&self) -> Option<&ImageIdentity> {
        self.last.as_ref()
    }

    pub fn image_shown(&self) -> bool {
        self.image_shown
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Something else was drawn over the image; the next fetch must redraw
    /// even if the server still serves the same file.
    pub fn invalidate(&mut self) {
        self.image_shown = false;
    }

    /// Fetch the latest preview and paint it. The connection is closed and
    /// the compressed buffer released before this returns, on every path.
    pub fn fetch_and_render<H, B, C, D, P>(
        &mut self,
        http: &mut H,
        pool: &mut B,
        clock: &C,
        delay: &mut D,
        renderer: &mut Renderer<P>,
        settings: &Settings,
    ) -> FetchResult
    where
        H: HttpTransport + ?Sized,
        B: BufferPool + ?Sized,
        C: Clock + ?Sized,
        D: DelayNs + ?Sized,
        P: Panel,
    {
        let started = clock.now_ms();
        let outcome = self.fetch(http, pool, clock, delay, renderer, settings);
        http.close();

        let result = match outcome {
            Ok(Fetched::Displayed(identity)) => {
                info!(
                    "image: {} (taken {}, exposure {} ms) in {} ms",
                    identity.filename,
                    identity.timestamp,
                    identity.exposure_ms,
                    clock.now_ms().saturating_sub(started)
                );
                self.last = Some(identity);
                self.image_shown = true;
                FetchResult::Displayed
            }
            Ok(Fetched::Unchanged) => {
                if self.verbose {
                    info!("image: unchanged, skipping decode");
                } else {
                    debug!("image: unchanged, skipping decode");
                }
                FetchResult::Unchanged
            }
            Ok(Fetched::Partial(e)) => {
                warn!("image: decode stopped part way: {}", e);
                self.image_shown = false;
                FetchResult::DecodeFailure
            }
            Ok(Fetched::Idle(kind)) => {
                info!("image: server idle ({:?})", kind);
                renderer.show_placeholder(kind);
                self.image_shown = false;
                match kind {
                    Placeholder::NoImages => FetchResult::NoImagesAvailable,
                    Placeholder::CaptureDisabled => FetchResult::CaptureDisabled,
                }
            }
            Err(FetchError::Network(e)) => {
                // Transient: keep the current screen unless it belongs to weather view.
                warn!("image: network failure: {}", e);
                if matches!(renderer.screen(), Screen::Weather { .. }) {
                    renderer.show_error(&FetchError::Network(e).label());
                    self.image_shown = false;
                }
                FetchResult::NetworkFailure
            }
            Err(e) => {
                warn!("image: {}", e);
                renderer.show_error(&e.label());
                self.image_shown = false;
                FetchResult::of_error(&e)
            }
        };
        self.stats.record(result);
        result
    }

    fn fetch<H, B, C, D, P>(
        &self,
        http: &mut H,
        pool: &mut B,
        clock: &C,
        delay: &mut D,
        renderer: &mut Renderer<P>,
        settings: &Settings,
    ) -> Result<Fetched, FetchError>
    where
        H: HttpTransport + ?Sized,
        B: BufferPool + ?Sized,
        C: Clock + ?Sized,
        D: DelayNs + ?Sized,
        P: Panel,
    {
        let url = settings.image_request().url(&settings.server_url);
        let deadline = clock.now_ms() + settings.image_timeout_ms;
        if self.verbose {
            info!("image: GET {}", url);
        }

        match http.get(&url, settings.image_timeout_ms)? {
            200 => {}
            404 => return Ok(Fetched::Idle(Placeholder::NoImages)),
            503 => return Ok(Fetched::Idle(Placeholder::CaptureDisabled)),
            status => return Err(FetchError::Http(status)),
        }

        let identity = ImageIdentity::from_headers(http);
        let same_file = !identity.filename.is_empty()
            && self.last.as_ref().is_some_and(|l| l.filename == identity.filename);
        if same_file && self.image_shown {
            return Ok(Fetched::Unchanged);
        }

        let len = http.content_length().ok_or(NetworkError::MissingLength)?;
        if len == 0 {
            return Err(DecodeError::NotJpeg.into());
        }
        if len > settings.max_image_bytes || len > pool.largest_free_block() {
            return Err(FetchError::Memory { requested: len });
        }
        let mut buf = pool.allocate(len).ok_or(FetchError::Memory { requested: len })?;
        debug!("image: {} byte buffer allocated", len);

        read_exact_polling(http, &mut buf, clock, delay, deadline, settings.read_yield_ms)?;
        http.close();

        let decoder = JpegDecoder::new(&buf)?;
        let (w, h) = (decoder.width(), decoder.height());
        // Smaller frames are centered on the panel.
        let dx = (SCREEN_W_PORTRAIT as u32).saturating_sub(w) / 2;
        let dy = (SCREEN_H_PORTRAIT as u32).saturating_sub(h) / 2;
        if self.verbose {
            info!("image: decoding {}x{} at ({}, {})", w, h, dx, dy);
        }

        renderer.begin_image();
        let mut blocks = decoder.into_blocks();
        let mut broken = None;
        while let Some(block) = blocks.next_block() {
            match block {
                Ok(b) => renderer.draw_block(b.x + dx, b.y + dy, b.width, b.height, b.pixels),
                Err(e) => {
                    broken = Some(e);
                    break;
                }
            }
        }
        renderer.present();

        Ok(match broken {
            None => Fetched::Displayed(identity),
            Some(e) => Fetched::Partial(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Headers(Vec<(&'static str, &'static str)>);

    impl HttpTransport for Headers {
        fn get(&mut self, _url: &str, _timeout_ms: u64) -> Result<u16, NetworkError> {
            Ok(200)
        }
        fn header(&self, name: &str) -> Option<&str> {
            self.0.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| *v)
        }
        fn content_length(&self) -> Option<usize> {
            None
        }
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, NetworkError> {
            Ok(0)
        }
        fn is_open(&self) -> bool {
            false
        }
        fn close(&mut self) {}
    }

    #[test]
    fn identity_reads_headers_with_defaults() {
        let h = Headers(vec![
            ("X-Image-Filename", "img_20240101_2300.jpg"),
            ("X-Image-Timestamp", "2024-01-01 23:00:00"),
            ("X-Image-Exposure-Ms", " 1500 "),
        ]);
        let id = ImageIdentity::from_headers(&h);
        assert_eq!(id.filename, "img_20240101_2300.jpg");
        assert_eq!(id.timestamp, "2024-01-01 23:00:00");
        assert_eq!(id.exposure_ms, 1500);

        let id = ImageIdentity::from_headers(&Headers(vec![("X-Image-Exposure-Ms", "n/a")]));
        assert_eq!(id, ImageIdentity::default());
    }

    #[test]
    fn stats_bucket_outcomes() {
        let mut stats = FetchStats::default();
        for r in [
            FetchResult::Displayed,
            FetchResult::Unchanged,
            FetchResult::CaptureDisabled,
            FetchResult::HttpError(500),
            FetchResult::OutOfMemory,
        ] {
            stats.record(r);
        }
        assert_eq!(
            stats,
            FetchStats { total: 5, displayed: 1, unchanged: 1, idle: 1, errors: 2 }
        );
    }
}

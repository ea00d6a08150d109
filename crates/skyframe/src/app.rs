use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::Settings;
use crate::connectivity::{ConnectionState, Connectivity, LinkDriver};
use crate::error::{NetworkError, WeatherError};
use crate::http::HttpTransport;
use crate::memory::BufferPool;
use crate::pipeline::{FetchResult, ImagePipeline};
use crate::render::{Panel, Renderer};
use crate::schedule::{Cadence, Clock};
use crate::touch::TouchSource;
use crate::view::{Command, ViewMachine, ViewMode};
use crate::weather::{fetch_weather, WeatherRecord};

/// What one [`App::tick`] did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Offline,
    Fetched(FetchResult),
    WeatherShown { stale: bool },
}

/// Everything the control loop owns. One instance lives for the life of
/// the device; each component reads or changes only its own part.
pub struct App<L, H, B, T, P> {
    settings: Settings,
    net: Connectivity<L>,
    http: H,
    pool: B,
    touch: T,
    renderer: Renderer<P>,
    view: ViewMachine,
    pipeline: ImagePipeline,
    weather: Option<WeatherRecord>,
    refresh: Cadence,
    offline_shown: bool,
}

impl<L, H, B, T, P> App<L, H, B, T, P>
where
    L: LinkDriver,
    H: HttpTransport,
    B: BufferPool,
    T: TouchSource,
    P: Panel,
{
    pub fn new(settings: Settings, link: L, http: H, pool: B, touch: T, panel: P) -> Self {
        let settings = settings.validated();
        Self {
            net: Connectivity::new(link, settings.wifi_retry_ms),
            view: ViewMachine::new(settings.debounce_ms),
            refresh: Cadence::new(settings.refresh_interval_ms),
            settings,
            http,
            pool,
            touch,
            renderer: Renderer::new(panel),
            pipeline: ImagePipeline::new(),
            weather: None,
            offline_shown: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn renderer(&self) -> &Renderer<P> {
        &self.renderer
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn connection(&self) -> ConnectionState {
        self.net.status()
    }

    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut ImagePipeline {
        &mut self.pipeline
    }

    pub fn weather(&self) -> Option<&WeatherRecord> {
        self.weather.as_ref()
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }

    pub fn pool(&self) -> &B {
        &self.pool
    }

    pub fn touch_mut(&mut self) -> &mut T {
        &mut self.touch
    }

    /// Paint the boot screen before the first tick.
    pub fn boot(&mut self, line: &str) {
        self.renderer.show_status("Starting", line);
    }

    /// Make the next tick in image view fetch and redraw, even an unchanged image.
    pub fn request_refresh(&mut self) {
        self.pipeline.invalidate();
        self.refresh.expire();
    }

    /// One control loop iteration: link check, touch, then the refresh timer.
    pub fn tick<C, D>(&mut self, clock: &C, delay: &mut D) -> TickOutcome
    where
        C: Clock + ?Sized,
        D: DelayNs + ?Sized,
    {
        let now = clock.now_ms();
        let online = self.poll_link(now);

        match self.view.on_touch(self.touch.read(), now) {
            Command::ShowWeather => return self.show_weather(clock, delay, online),
            Command::ShowImage => {
                self.pipeline.invalidate();
                if online {
                    return TickOutcome::Fetched(self.refresh_image(clock, delay));
                }
                self.refresh.expire();
            }
            Command::None => {}
        }

        if !online {
            return TickOutcome::Offline;
        }
        if self.view.refresh_enabled() && self.refresh.is_due(now) {
            return TickOutcome::Fetched(self.refresh_image(clock, delay));
        }
        TickOutcome::Idle
    }

    fn poll_link(&mut self, now: u64) -> bool {
        let state = self.net.poll();
        if state == ConnectionState::Connected {
            if self.offline_shown {
                info!("app: network back, refreshing image");
                self.offline_shown = false;
                self.refresh.expire();
            }
            return true;
        }
        self.net.ensure_connected(now);
        if !self.offline_shown && self.view.mode() == ViewMode::ImageView {
            let line = match self.net.status() {
                ConnectionState::Connecting => "Connecting to WiFi...",
                _ => "WiFi link down, retrying",
            };
            self.renderer.show_status("No network", line);
            self.pipeline.invalidate();
            self.offline_shown = true;
        }
        false
    }

    fn refresh_image<C, D>(&mut self, clock: &C, delay: &mut D) -> FetchResult
    where
        C: Clock + ?Sized,
        D: DelayNs + ?Sized,
    {
        self.refresh.mark(clock.now_ms());
        self.pipeline.fetch_and_render(
            &mut self.http,
            &mut self.pool,
            clock,
            delay,
            &mut self.renderer,
            &self.settings,
        )
    }

    fn show_weather<C, D>(&mut self, clock: &C, delay: &mut D, online: bool) -> TickOutcome
    where
        C: Clock + ?Sized,
        D: DelayNs + ?Sized,
    {
        let fetched = if online {
            fetch_weather(&mut self.http, clock, delay, &self.settings)
        } else {
            Err(WeatherError::Network(NetworkError::LinkDown))
        };
        let stale = match fetched {
            Ok(record) => {
                self.weather = Some(record);
                false
            }
            Err(e) => {
                warn!("app: weather refresh failed ({}), keeping previous", e.label());
                true
            }
        };
        self.renderer.show_weather(self.weather.as_ref(), stale);
        self.pipeline.invalidate();
        TickOutcome::WeatherShown { stale }
    }
}

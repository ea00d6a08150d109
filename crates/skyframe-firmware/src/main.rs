mod config;
mod console;
mod debug_flags;
mod http_client;
mod lcd;
mod psram;
mod wifi;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use log::{debug, info};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use skyframe::schedule::Clock;
use skyframe::touch::Axs15231b;
use skyframe::{App, TickOutcome};

use crate::debug_flags::{DEBUG_FETCH, DEBUG_TOUCH, REQUEST_REFETCH};

// ── I2C ──────────────────────────────────────────────────────────────
const I2C_FREQ_HZ: u32 = 100_000;

// ── Timing ──────────────────────────────────────────────────────────
const TICK_MS: u64 = 20;

extern "C" {
    fn board_power_init() -> esp_idf_sys::esp_err_t;
}

// ── Helpers ─────────────────────────────────────────────────────────

pub(crate) fn esp_check(res: esp_idf_sys::esp_err_t, msg: &str) -> Result<()> {
    if res != esp_idf_sys::ESP_OK {
        Err(anyhow::anyhow!("{} (err {})", msg, res))
    } else {
        Ok(())
    }
}

/// Microsecond system timer, monotonic since boot.
struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_sys::esp_timer_get_time() } / 1000) as u64
    }
}

// ── Entry point ─────────────────────────────────────────────────────

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("BOOT: skyframe display client v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Board power (IO expander + PMIC + LCD reset) ──
    esp_check(unsafe { board_power_init() }, "board_power_init")?;
    info!("Power + LCD reset OK");

    // ── 2. Display ──
    let panel = lcd::LcdPanel::init()?;

    // ── 3. Peripherals ──
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 4. NVS config ──
    let nvs = EspNvs::new(nvs_partition.clone(), config::NS, true)?;
    let cfg = config::Config::load(&nvs);
    let settings = cfg.to_settings();
    let wifi_ssid = cfg.wifi_ssid.clone();
    let wifi_pass = cfg.wifi_pass.clone();

    // ── 5. Console (serial interactive) ──
    console::spawn_console(Arc::new(Mutex::new(nvs)), Arc::new(Mutex::new(cfg)))?;

    // ── 6. I2C bus + touch ──
    // board_power_init() leaves its own I2C driver on port 0 for the PMIC.
    unsafe { esp_idf_sys::i2c_driver_delete(0) };
    let i2c_config = I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ));
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio7,
        &i2c_config,
    )?;
    let mut touch = Axs15231b::new(i2c);
    touch.probe();

    // ── 7. WiFi (association runs from the control loop) ──
    let link = wifi::WifiLink::new(peripherals.modem, sysloop, nvs_partition, &wifi_ssid, &wifi_pass)?;
    if wifi_ssid.is_empty() {
        log::warn!("No WiFi SSID configured (use console: wifi set <ssid> <pass>)");
    }

    // ── 8. App ──
    let mut app = App::new(
        settings,
        link,
        http_client::EspTransport::new(),
        psram::PsramPool,
        touch,
        panel,
    );
    let boot_line = if wifi_ssid.is_empty() {
        "No WiFi configured".to_string()
    } else {
        format!("Connecting to '{}'...", wifi_ssid)
    };
    app.boot(&boot_line);

    // ── 9. Control loop ──
    info!("Entering main loop (server {})", app.settings().server_url);
    let clock = EspClock;
    let mut delay = FreeRtos;
    let mut next_tick = clock.now_ms();
    loop {
        app.pipeline_mut().set_verbose(debug_flags::is_on(&DEBUG_FETCH));
        app.touch_mut().set_verbose(debug_flags::is_on(&DEBUG_TOUCH));
        if REQUEST_REFETCH.swap(false, Ordering::Relaxed) {
            app.request_refresh();
        }

        match app.tick(&clock, &mut delay) {
            TickOutcome::Idle | TickOutcome::Offline => {}
            outcome => debug!("tick: {:?}", outcome),
        }

        // Fixed-rate tick; a long fetch just makes the next one start immediately.
        next_tick += TICK_MS;
        let now = clock.now_ms();
        if now < next_tick {
            FreeRtos::delay_ms((next_tick - now) as u32);
        } else {
            next_tick = now;
            // Let the idle task run.
            FreeRtos::delay_ms(1);
        }
    }
}

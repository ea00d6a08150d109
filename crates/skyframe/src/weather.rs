use embedded_hal::delay::DelayNs;
use log::{debug, info};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Settings;
use crate::error::WeatherError;
use crate::http::{read_small_body, weather_url, HttpTransport};
use crate::schedule::Clock;

const MAX_BODY_BYTES: usize = 4096;

// ── Record ──────────────────────────────────────────────────────────

/// Current conditions as served by the backend. Every field defaults, so a
/// sparse payload still yields a usable record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherRecord {
    pub description: String,
    pub temperature_c: f32,
    pub humidity_pct: i32,
    pub pressure_hpa: i32,
    pub clouds_pct: i32,
    pub rain_mm: f32,
    pub wind_speed_ms: f32,
    pub wind_gust_ms: f32,
    pub icon_code: String,
}

impl WeatherRecord {
    pub fn icon(&self) -> WeatherIcon {
        WeatherIcon::from_code(&self.icon_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Condition {
    Clear,
    #[default]
    Cloud,
    Rain,
    Storm,
    Snow,
    Mist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeatherIcon {
    pub condition: Condition,
    pub night: bool,
}

impl WeatherIcon {
    /// Map an OpenWeather style icon code (`"10n"`) to a drawable icon.
    /// Unknown codes fall back to a daytime cloud.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        let condition = match code.get(..2) {
            Some("01") => Condition::Clear,
            Some("02" | "03" | "04") => Condition::Cloud,
            Some("09" | "10") => Condition::Rain,
            Some("11") => Condition::Storm,
            Some("13") => Condition::Snow,
            Some("50") => Condition::Mist,
            _ => Condition::Cloud,
        };
        WeatherIcon {
            condition,
            night: code.ends_with('n'),
        }
    }
}

// ── Payload ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WeatherPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    description: String,
    #[serde(default, deserialize_with = "lenient_number")]
    temperature: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    humidity: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pressure: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    clouds: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    rain: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    wind_speed: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    wind_gust: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    icon_code: String,
}

/// Numbers, numeric strings and `{"1h": n}` volumes all count; anything else
/// (null, bool, garbage) is 0.
fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(number_of(&Value::deserialize(d)?))
}

fn number_of(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Object(map) => map.get("1h").map(number_of).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Parse a weather body. Only invalid JSON or a non-object document fails.
pub fn parse_weather(body: &[u8]) -> Result<WeatherRecord, WeatherError> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(WeatherError::Parse("expected a JSON object".into()));
    }
    let p = WeatherPayload::deserialize(value)?;
    Ok(WeatherRecord {
        description: p.description.trim().to_string(),
        temperature_c: p.temperature as f32,
        humidity_pct: p.humidity.round() as i32,
        pressure_hpa: p.pressure.round() as i32,
        clouds_pct: p.clouds.round() as i32,
        rain_mm: p.rain as f32,
        wind_speed_ms: p.wind_speed as f32,
        wind_gust_ms: p.wind_gust as f32,
        icon_code: p.icon_code.trim().to_string(),
    })
}

// ── Fetch ───────────────────────────────────────────────────────────

/// GET `/api/weather` and parse it. The connection is closed on every path.
pub fn fetch_weather<H, C, D>(
    http: &mut H,
    clock: &C,
    delay: &mut D,
    settings: &Settings,
) -> Result<WeatherRecord, WeatherError>
where
    H: HttpTransport + ?Sized,
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
{
    let url = weather_url(&settings.server_url);
    let deadline = clock.now_ms() + settings.weather_timeout_ms;
    debug!("weather: GET {}", url);
    let result = request(http, &url, clock, delay, deadline, settings);
    http.close();
    match &result {
        Ok(rec) => info!(
            "weather: {} {:.1}C {}% icon={}",
            rec.description, rec.temperature_c, rec.humidity_pct, rec.icon_code
        ),
        Err(e) => info!("weather: fetch failed: {}", e),
    }
    result
}

fn request<H, C, D>(
    http: &mut H,
    url: &str,
    clock: &C,
    delay: &mut D,
    deadline: u64,
    settings: &Settings,
) -> Result<WeatherRecord, WeatherError>
where
    H: HttpTransport + ?Sized,
    C: Clock + ?Sized,
    D: DelayNs + ?Sized,
{
    let status = http.get(url, settings.weather_timeout_ms)?;
    if status != 200 {
        return Err(WeatherError::Http(status));
    }
    let body = read_small_body(
        http,
        MAX_BODY_BYTES,
        clock,
        delay,
        deadline,
        settings.read_yield_ms,
    )?;
    parse_weather(&body)
}

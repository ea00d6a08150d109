use embedded_graphics::{
    mono_font::MonoTextStyle,
    pixelcolor::Rgb565,
    prelude::*,
    text::{Alignment, Text},
};
use log::debug;
use profont::{PROFONT_10_POINT, PROFONT_12_POINT, PROFONT_14_POINT, PROFONT_24_POINT};

use crate::canvas::Canvas;
use crate::icons::draw_icon;
use crate::layout::*;
use crate::weather::WeatherRecord;

/// Physical display behind the canvas.
pub trait Panel {
    /// Push the whole canvas to the glass.
    fn flush(&mut self, canvas: &Canvas);
    fn set_backlight(&mut self, on: bool);
}

/// The two idle answers of the image endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    NoImages,
    CaptureDisabled,
}

/// What the glass currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Blank,
    Image,
    Weather { stale: bool },
    Placeholder(Placeholder),
    Error(String),
    Status(String),
}

/// Owns the canvas and its orientation. The camera image is drawn in
/// portrait; every other screen switches to landscape for the draw and
/// switches back afterwards.
pub struct Renderer<P> {
    canvas: Canvas,
    panel: P,
    backlight: bool,
    screen: Screen,
}

impl<P: Panel> Renderer<P> {
    pub fn new(panel: P) -> Self {
        Self {
            canvas: Canvas::new(),
            panel,
            backlight: false,
            screen: Screen::Blank,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn clear(&mut self, color: Rgb565) {
        self.canvas.clear_color(color);
    }

    /// Paint one decoded image block (portrait coordinates).
    pub fn draw_block(&mut self, x: u32, y: u32, w: u32, h: u32, pixels: &[u16]) {
        self.canvas.draw_block(x as i32, y as i32, w, h, pixels);
    }

    /// Prepare for a fresh camera frame.
    pub fn begin_image(&mut self) {
        self.canvas.set_orientation(Orientation::Portrait);
        self.canvas.clear_color(BG_IDLE);
        self.screen = Screen::Image;
    }

    /// Flush to the panel, lighting the backlight on the first frame.
    pub fn present(&mut self) {
        self.panel.flush(&self.canvas);
        if !self.backlight {
            self.panel.set_backlight(true);
            self.backlight = true;
        }
    }

    pub fn show_weather(&mut self, record: Option<&WeatherRecord>, stale: bool) {
        self.landscape(|c| draw_weather(c, record, stale));
        self.screen = Screen::Weather { stale };
    }

    pub fn show_placeholder(&mut self, kind: Placeholder) {
        self.landscape(|c| draw_placeholder(c, kind));
        self.screen = Screen::Placeholder(kind);
    }

    pub fn show_error(&mut self, label: &str) {
        self.landscape(|c| draw_error(c, label));
        self.screen = Screen::Error(label.to_string());
    }

    pub fn show_status(&mut self, title: &str, line: &str) {
        self.landscape(|c| draw_status(c, title, line));
        self.screen = Screen::Status(title.to_string());
    }

    fn landscape(&mut self, draw: impl FnOnce(&mut Canvas)) {
        self.canvas.set_orientation(Orientation::Landscape);
        draw(&mut self.canvas);
        self.present();
        self.canvas.set_orientation(Orientation::Portrait);
        debug!("render: landscape screen presented");
    }
}

// ── Screens ─────────────────────────────────────────────────────────

fn centered<D>(target: &mut D, text: &str, y: i32, style: MonoTextStyle<'_, Rgb565>)
where
    D: DrawTarget<Color = Rgb565>,
{
    Text::with_alignment(text, Point::new(SCREEN_W_LANDSCAPE / 2, y), style, Alignment::Center)
        .draw(target)
        .ok();
}

pub fn draw_weather<D>(target: &mut D, record: Option<&WeatherRecord>, stale: bool)
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(BG_WEATHER).ok();
    draw_hline(target, HEADER_LINE_Y, LINE_COLOR);

    let header = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_HEADER);
    Text::new("Weather", Point::new(10, 24), header).draw(target).ok();
    if stale && record.is_some() {
        let warn = MonoTextStyle::new(&PROFONT_12_POINT, TEXT_WARN);
        Text::with_alignment(
            "stale",
            Point::new(SCREEN_W_LANDSCAPE - 10, 24),
            warn,
            Alignment::Right,
        )
        .draw(target)
        .ok();
    }

    let card = Rect::new(CARD_MARGIN, HEADER_LINE_Y + 8, SCREEN_W_LANDSCAPE - 2 * CARD_MARGIN, 210);
    draw_card(target, card, CARD_FILL, CARD_BORDER, 1);

    match record {
        Some(w) => {
            draw_icon(target, w.icon(), Point::new(card.x + 14, card.y + 20), 110, CARD_FILL);

            let col = card.x + 146;
            let temp = MonoTextStyle::new(&PROFONT_24_POINT, TEXT_PRIMARY);
            Text::new(&format!("{:.1}°C", w.temperature_c), Point::new(col, card.y + 46), temp)
                .draw(target)
                .ok();

            let cond = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_CONDITION);
            let description = if w.description.is_empty() { "--" } else { w.description.as_str() };
            Text::new(description, Point::new(col, card.y + 74), cond)
                .draw(target)
                .ok();

            let detail = MonoTextStyle::new(&PROFONT_12_POINT, TEXT_DETAIL);
            let left = [
                format!("Humidity {}%", w.humidity_pct),
                format!("Pressure {} hPa", w.pressure_hpa),
                format!("Clouds   {}%", w.clouds_pct),
            ];
            let mut right = vec![
                format!("Rain {:.1} mm", w.rain_mm),
                format!("Wind {:.1} m/s", w.wind_speed_ms),
            ];
            if w.wind_gust_ms > 0.0 {
                right.push(format!("Gust {:.1} m/s", w.wind_gust_ms));
            }
            for (i, line) in left.iter().enumerate() {
                let y = card.y + 112 + i as i32 * 24;
                Text::new(line, Point::new(col, y), detail).draw(target).ok();
            }
            for (i, line) in right.iter().enumerate() {
                let y = card.y + 112 + i as i32 * 24;
                Text::new(line, Point::new(col + 168, y), detail).draw(target).ok();
            }
        }
        None => {
            let style = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_DETAIL);
            let center = card.center();
            Text::with_alignment("Weather unavailable", center, style, Alignment::Center)
                .draw(target)
                .ok();
        }
    }

    draw_card(target, BACK_BUTTON, BUTTON_FILL, BUTTON_BORDER, 2);
    let label = MonoTextStyle::new(&PROFONT_14_POINT, TEXT_PRIMARY);
    Text::with_alignment("< Back", BACK_BUTTON.center() + Point::new(0, 5), label, Alignment::Center)
        .draw(target)
        .ok();

    let hint = MonoTextStyle::new(&PROFONT_10_POINT, TEXT_BOTTOM);
    Text::with_alignment(
        "tap Back to return to the camera",
        Point::new(SCREEN_W_LANDSCAPE - 10, SCREEN_H_LANDSCAPE - 12),
        hint,
        Alignment::Right,
    )
    .draw(target)
    .ok();
}

pub fn draw_placeholder<D>(target: &mut D, kind: Placeholder)
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(BG_IDLE).ok();
    let (subtitle, detail) = match kind {
        Placeholder::NoImages => ("Waiting for the first capture", "The server has no images yet"),
        Placeholder::CaptureDisabled => ("Capture is disabled", "Enable capture on the server"),
    };
    centered(target, "No images", 130, MonoTextStyle::new(&PROFONT_24_POINT, TEXT_PRIMARY));
    centered(target, subtitle, 170, MonoTextStyle::new(&PROFONT_14_POINT, TEXT_CONDITION));
    centered(target, detail, 200, MonoTextStyle::new(&PROFONT_12_POINT, TEXT_DETAIL));
}

pub fn draw_error<D>(target: &mut D, label: &str)
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(BG_ERROR).ok();
    centered(target, "Error", 120, MonoTextStyle::new(&PROFONT_14_POINT, TEXT_WARN));
    centered(target, label, 165, MonoTextStyle::new(&PROFONT_24_POINT, TEXT_PRIMARY));
    centered(
        target,
        "Retrying on the next refresh",
        205,
        MonoTextStyle::new(&PROFONT_12_POINT, TEXT_DETAIL),
    );
}

pub fn draw_status<D>(target: &mut D, title: &str, line: &str)
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(BG_STATUS).ok();
    centered(target, "skyframe", 40, MonoTextStyle::new(&PROFONT_12_POINT, TEXT_BOTTOM));
    centered(target, title, 150, MonoTextStyle::new(&PROFONT_24_POINT, TEXT_PRIMARY));
    centered(target, line, 190, MonoTextStyle::new(&PROFONT_14_POINT, TEXT_DETAIL));
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::raw::RawU16;

    #[derive(Default)]
    struct RecordingPanel {
        flushes: usize,
        backlight: Vec<bool>,
    }

    impl Panel for RecordingPanel {
        fn flush(&mut self, _canvas: &Canvas) {
            self.flushes += 1;
        }

        fn set_backlight(&mut self, on: bool) {
            self.backlight.push(on);
        }
    }

    fn raw(c: Rgb565) -> u16 {
        RawU16::from(c).into_inner()
    }

    #[test]
    fn back_button_is_drawn_where_it_is_hit_tested() {
        let mut canvas = Canvas::new();
        canvas.set_orientation(Orientation::Landscape);
        draw_weather(&mut canvas, Some(&WeatherRecord::default()), false);
        let inside = BACK_BUTTON.center() + Point::new(-40, -12);
        assert_eq!(canvas.pixel(inside.x, inside.y), Some(raw(BUTTON_FILL)));
        let outside = (BACK_BUTTON.x + BACK_BUTTON.w + 4, BACK_BUTTON.y + 4);
        assert_eq!(canvas.pixel(outside.0, outside.1), Some(raw(BG_WEATHER)));
    }

    #[test]
    fn screens_restore_portrait_and_light_backlight_once() {
        let mut r = Renderer::new(RecordingPanel::default());
        r.show_status("Booting", "Starting WiFi");
        assert_eq!(r.canvas().orientation(), Orientation::Portrait);
        r.show_placeholder(Placeholder::NoImages);
        r.show_error("HTTP 500");
        assert_eq!(r.panel().flushes, 3);
        assert_eq!(r.panel().backlight, vec![true]);
        assert_eq!(r.screen(), &Screen::Error("HTTP 500".into()));
    }

    #[test]
    fn placeholder_and_error_use_distinct_backgrounds() {
        let mut r = Renderer::new(RecordingPanel::default());
        r.show_placeholder(Placeholder::CaptureDisabled);
        assert_eq!(r.canvas().raw()[0], raw(BG_IDLE));
        r.show_error("Decode error");
        assert_eq!(r.canvas().raw()[0], raw(BG_ERROR));
    }

    #[test]
    fn stale_caption_only_with_a_record() {
        let mut canvas = Canvas::new();
        canvas.set_orientation(Orientation::Landscape);
        draw_weather(&mut canvas, None, true);
        let warn = raw(TEXT_WARN);
        let header_has_warn = |c: &Canvas| {
            (0..HEADER_LINE_Y).any(|y| (380..480).any(|x| c.pixel(x, y) == Some(warn)))
        };
        assert!(!header_has_warn(&canvas));

        draw_weather(&mut canvas, Some(&WeatherRecord::default()), true);
        assert!(header_has_warn(&canvas));
    }
}

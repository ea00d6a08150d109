use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyleBuilder, Rectangle, RoundedRectangle};

/// Convert 8-bit RGB to Rgb565.
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

// ── Background colors ───────────────────────────────────────────────

pub const BG_WEATHER: Rgb565 = rgb(27, 31, 39);
pub const BG_STATUS: Rgb565 = rgb(20, 24, 32);
pub const BG_ERROR: Rgb565 = rgb(48, 18, 22);
pub const BG_IDLE: Rgb565 = rgb(14, 18, 30);

// ── Line / card colors ──────────────────────────────────────────────

pub const LINE_COLOR: Rgb565 = rgb(56, 63, 76);
pub const CARD_FILL: Rgb565 = rgb(20, 25, 35);
pub const CARD_BORDER: Rgb565 = rgb(63, 75, 95);
pub const BUTTON_FILL: Rgb565 = rgb(36, 52, 74);
pub const BUTTON_BORDER: Rgb565 = rgb(96, 130, 170);

// ── Text colors ─────────────────────────────────────────────────────

pub const TEXT_HEADER: Rgb565 = rgb(222, 225, 230);
pub const TEXT_PRIMARY: Rgb565 = rgb(232, 235, 240);
pub const TEXT_DETAIL: Rgb565 = rgb(184, 189, 198);
pub const TEXT_CONDITION: Rgb565 = rgb(166, 208, 255);
pub const TEXT_WARN: Rgb565 = rgb(255, 196, 120);
pub const TEXT_BOTTOM: Rgb565 = rgb(140, 148, 160);

// ── Icon colors ─────────────────────────────────────────────────────

pub const ICON_SUN: Rgb565 = rgb(255, 200, 60);
pub const ICON_MOON: Rgb565 = rgb(220, 224, 236);
pub const ICON_CLOUD: Rgb565 = rgb(196, 204, 216);
pub const ICON_CLOUD_DARK: Rgb565 = rgb(120, 130, 148);
pub const ICON_RAIN: Rgb565 = rgb(90, 160, 255);
pub const ICON_BOLT: Rgb565 = rgb(255, 220, 70);
pub const ICON_SNOW: Rgb565 = rgb(240, 244, 255);
pub const ICON_MIST: Rgb565 = rgb(150, 158, 170);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Native panel orientation, 320x480. Used for the camera image.
    Portrait,
    /// Rotated 90° clockwise, 480x320. Used for every other screen.
    Landscape,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }
}

// ── Layout constants ────────────────────────────────────────────────

pub const SCREEN_W_LANDSCAPE: i32 = 480;
pub const SCREEN_H_LANDSCAPE: i32 = 320;
pub const SCREEN_W_PORTRAIT: i32 = 320;
pub const SCREEN_H_PORTRAIT: i32 = 480;

pub const HEADER_LINE_Y: i32 = 34;
pub const CARD_MARGIN: i32 = 8;
pub const CARD_RADIUS: i32 = 12;

/// Axis-aligned integer rectangle in landscape screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    pub fn to_rectangle(self) -> Rectangle {
        Rectangle::new(Point::new(self.x, self.y), Size::new(self.w as u32, self.h as u32))
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// The weather screen's back button. The renderer draws exactly this
/// rectangle and the view state machine hit-tests against it.
pub const BACK_BUTTON: Rect = Rect::new(CARD_MARGIN, SCREEN_H_LANDSCAPE - 52, 112, 44);

pub fn screen_size(orientation: Orientation) -> (i32, i32) {
    if orientation.is_landscape() {
        (SCREEN_W_LANDSCAPE, SCREEN_H_LANDSCAPE)
    } else {
        (SCREEN_W_PORTRAIT, SCREEN_H_PORTRAIT)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Fill a horizontal line across the full screen width.
pub fn draw_hline<D>(target: &mut D, y: i32, color: Rgb565)
where
    D: DrawTarget<Color = Rgb565>,
{
    let width = target.bounding_box().size.width;
    let style = PrimitiveStyleBuilder::new().fill_color(color).build();
    Rectangle::new(Point::new(0, y), Size::new(width, 1))
        .into_styled(style)
        .draw(target)
        .ok();
}

/// Draw a filled rounded rectangle with a border (card style).
pub fn draw_card<D>(target: &mut D, area: Rect, fill: Rgb565, border: Rgb565, border_width: u32)
where
    D: DrawTarget<Color = Rgb565>,
{
    let radius = CARD_RADIUS as u32;
    let outer = PrimitiveStyleBuilder::new().fill_color(border).build();
    RoundedRectangle::with_equal_corners(area.to_rectangle(), Size::new(radius, radius))
        .into_styled(outer)
        .draw(target)
        .ok();

    let bw = border_width as i32;
    let inner = Rect::new(area.x + bw, area.y + bw, area.w - 2 * bw, area.h - 2 * bw);
    let inner_radius = radius.saturating_sub(border_width);
    let fill_style = PrimitiveStyleBuilder::new().fill_color(fill).build();
    RoundedRectangle::with_equal_corners(
        inner.to_rectangle(),
        Size::new(inner_radius, inner_radius),
    )
    .into_styled(fill_style)
    .draw(target)
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10, 20, 5, 5);
        assert!(r.contains(10, 20));
        assert!(r.contains(14, 24));
        assert!(!r.contains(15, 24));
        assert!(!r.contains(14, 25));
        assert!(!r.contains(9, 20));
    }

    #[test]
    fn back_button_fits_landscape_screen() {
        assert!(BACK_BUTTON.x >= 0 && BACK_BUTTON.y >= 0);
        assert!(BACK_BUTTON.x + BACK_BUTTON.w <= SCREEN_W_LANDSCAPE);
        assert!(BACK_BUTTON.y + BACK_BUTTON.h <= SCREEN_H_LANDSCAPE);
    }
}

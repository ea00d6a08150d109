//! Condition icons drawn from primitives, scaled to any box size.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{
    Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, RoundedRectangle, Triangle,
};

use crate::layout::*;
use crate::weather::{Condition, WeatherIcon};

/// Draw `icon` inside the `size`x`size` square whose top-left is `origin`.
/// `bg` is the color behind the icon; the crescent moon is cut with it.
pub fn draw_icon<D>(target: &mut D, icon: WeatherIcon, origin: Point, size: u32, bg: Rgb565)
where
    D: DrawTarget<Color = Rgb565>,
{
    let pen = Pen { target, origin, s: size as i32, bg };
    pen.draw(icon);
}

struct Pen<'a, D> {
    target: &'a mut D,
    origin: Point,
    s: i32,
    bg: Rgb565,
}

impl<D: DrawTarget<Color = Rgb565>> Pen<'_, D> {
    /// Point at `(fx, fy)` hundredths of the box.
    fn at(&self, fx: i32, fy: i32) -> Point {
        self.origin + Point::new(self.s * fx / 100, self.s * fy / 100)
    }

    fn len(&self, f: i32) -> u32 {
        (self.s * f / 100).max(1) as u32
    }

    fn draw(mut self, icon: WeatherIcon) {
        match (icon.condition, icon.night) {
            (Condition::Clear, false) => self.sun(50, 50, 44),
            (Condition::Clear, true) => self.moon(50, 50, 56),
            (Condition::Cloud, night) => {
                if night {
                    self.moon(34, 34, 36);
                } else {
                    self.sun(34, 34, 30);
                }
                self.cloud(ICON_CLOUD);
            }
            (Condition::Rain, _) => {
                self.cloud(ICON_CLOUD_DARK);
                self.rain();
            }
            (Condition::Storm, _) => {
                self.cloud(ICON_CLOUD_DARK);
                self.bolt();
            }
            (Condition::Snow, _) => {
                self.cloud(ICON_CLOUD);
                self.flakes();
            }
            (Condition::Mist, _) => self.mist(),
        }
    }

    fn fill(color: Rgb565) -> PrimitiveStyle<Rgb565> {
        PrimitiveStyleBuilder::new().fill_color(color).build()
    }

    fn disc(&mut self, cx: i32, cy: i32, diameter: i32, color: Rgb565) {
        let d = self.len(diameter);
        Circle::with_center(self.at(cx, cy), d)
            .into_styled(Self::fill(color))
            .draw(&mut *self.target)
            .ok();
    }

    fn stroke(&mut self, from: Point, to: Point, color: Rgb565, width: u32) {
        Line::new(from, to)
            .into_styled(PrimitiveStyle::with_stroke(color, width))
            .draw(&mut *self.target)
            .ok();
    }

    fn sun(&mut self, cx: i32, cy: i32, diameter: i32) {
        let center = self.at(cx, cy);
        let inner = self.s * diameter / 100 / 2 + self.s / 20;
        let outer = inner + self.s / 8;
        let width = self.len(5);
        for step in 0..8 {
            let angle = step as f32 * core::f32::consts::FRAC_PI_4;
            let (sin, cos) = angle.sin_cos();
            let p = |r: i32| center + Point::new((cos * r as f32) as i32, (sin * r as f32) as i32);
            self.stroke(p(inner), p(outer), ICON_SUN, width);
        }
        self.disc(cx, cy, diameter, ICON_SUN);
    }

    fn moon(&mut self, cx: i32, cy: i32, diameter: i32) {
        self.disc(cx, cy, diameter, ICON_MOON);
        let shift = diameter / 3;
        let bg = self.bg;
        self.disc(cx + shift, cy - shift / 2, diameter * 4 / 5, bg);
    }

    fn cloud(&mut self, color: Rgb565) {
        self.disc(38, 52, 34, color);
        self.disc(60, 46, 42, color);
        self.disc(26, 62, 24, color);
        let body = Rectangle::new(self.at(14, 56), Size::new(self.len(72), self.len(18)));
        let corner = Size::new(self.len(9), self.len(9));
        let base = RoundedRectangle::with_equal_corners(body, corner);
        base.into_styled(Self::fill(color)).draw(&mut *self.target).ok();
    }

    fn rain(&mut self) {
        let width = self.len(4);
        for x in [30, 50, 70] {
            let (from, to) = (self.at(x, 80), self.at(x - 6, 94));
            self.stroke(from, to, ICON_RAIN, width);
        }
    }

    fn bolt(&mut self) {
        let style = Self::fill(ICON_BOLT);
        Triangle::new(self.at(54, 66), self.at(36, 86), self.at(52, 84))
            .into_styled(style)
            .draw(&mut *self.target)
            .ok();
        Triangle::new(self.at(46, 80), self.at(62, 80), self.at(42, 100))
            .into_styled(style)
            .draw(&mut *self.target)
            .ok();
    }

    fn flakes(&mut self) {
        for (x, y) in [(30, 84), (50, 90), (70, 84)] {
            self.disc(x, y, 9, ICON_SNOW);
        }
    }

    fn mist(&mut self) {
        let width = self.len(6);
        for (i, y) in [30, 46, 62, 78].into_iter().enumerate() {
            let inset = if i % 2 == 0 { 10 } else { 20 };
            let (from, to) = (self.at(inset, y), self.at(100 - inset, y));
            self.stroke(from, to, ICON_MIST, width);
        }
    }
}

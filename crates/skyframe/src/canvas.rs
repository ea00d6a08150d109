use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    pixelcolor::{raw::RawU16, Rgb565},
    prelude::*,
    primitives::Rectangle,
    Pixel,
};

use crate::layout::{self, Orientation};

/// Physical panel dimensions (portrait, native).
pub const PANEL_WIDTH: u32 = 320;
pub const PANEL_HEIGHT: u32 = 480;

/// RGB565 canvas stored in the panel's native portrait order.
///
/// Drawing happens in logical coordinates for the current orientation. In
/// landscape, logical `(lx, ly)` lands on panel pixel `(319 - ly, lx)`, which
/// is a 90° clockwise rotation of the 480x320 logical screen onto the
/// portrait panel. Flushing therefore never needs to rotate.
pub struct Canvas {
    buf: Vec<u16>,
    orientation: Orientation,
    writes: u64,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            buf: vec![0u16; (PANEL_WIDTH * PANEL_HEIGHT) as usize],
            orientation: Orientation::Portrait,
            writes: 0,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Switch the logical coordinate system. Pixel memory is left as is.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Native panel pixels, row-major, `PANEL_WIDTH` per row.
    pub fn raw(&self) -> &[u16] {
        &self.buf
    }

    /// Total number of pixel writes since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn clear_color(&mut self, color: Rgb565) {
        let raw = RawU16::from(color).into_inner();
        self.buf.fill(raw);
        self.writes += self.buf.len() as u64;
    }

    /// Read one logical pixel, `None` when outside the screen.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u16> {
        self.index(x, y).map(|i| self.buf[i])
    }

    /// Copy a `w`x`h` block of raw RGB565 pixels to logical `(x, y)`,
    /// clipping whatever falls outside the screen.
    pub fn draw_block(&mut self, x: i32, y: i32, w: u32, h: u32, pixels: &[u16]) {
        let w = w as usize;
        let h = h as usize;
        if pixels.len() < w * h {
            return;
        }
        let (sw, sh) = layout::screen_size(self.orientation);
        let x0 = x.max(0);
        let x1 = (x + w as i32).min(sw);
        if x0 >= x1 {
            return;
        }
        for row in 0..h {
            let ly = y + row as i32;
            if ly < 0 || ly >= sh {
                continue;
            }
            let src = &pixels[row * w..(row + 1) * w];
            match self.orientation {
                Orientation::Portrait => {
                    let start = (ly as u32 * PANEL_WIDTH) as usize;
                    let from = (x0 - x) as usize;
                    let to = (x1 - x) as usize;
                    self.buf[start + x0 as usize..start + x1 as usize]
                        .copy_from_slice(&src[from..to]);
                }
                Orientation::Landscape => {
                    for lx in x0..x1 {
                        let idx = landscape_index(lx, ly);
                        self.buf[idx] = src[(lx - x) as usize];
                    }
                }
            }
            self.writes += (x1 - x0) as u64;
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (sw, sh) = layout::screen_size(self.orientation);
        if x < 0 || y < 0 || x >= sw || y >= sh {
            return None;
        }
        Some(match self.orientation {
            Orientation::Portrait => (y as u32 * PANEL_WIDTH + x as u32) as usize,
            Orientation::Landscape => landscape_index(x, y),
        })
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

fn landscape_index(lx: i32, ly: i32) -> usize {
    let px = PANEL_WIDTH as i32 - 1 - ly;
    let py = lx;
    (py as u32 * PANEL_WIDTH + px as u32) as usize
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        let (w, h) = layout::screen_size(self.orientation);
        Size::new(w as u32, h as u32)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some(idx) = self.index(point.x, point.y) {
                self.buf[idx] = RawU16::from(color).into_inner();
                self.writes += 1;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let raw = RawU16::from(color).into_inner();
        let area = area.intersection(&self.bounding_box());
        for y in area.rows() {
            for x in area.columns() {
                if let Some(idx) = self.index(x, y) {
                    self.buf[idx] = raw;
                }
            }
        }
        self.writes += u64::from(area.size.width) * u64::from(area.size.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_origin_maps_to_top_right_of_panel() {
        let mut canvas = Canvas::new();
        canvas.set_orientation(Orientation::Landscape);
        canvas.draw_block(0, 0, 1, 1, &[0xABCD]);
        assert_eq!(canvas.raw()[(PANEL_WIDTH - 1) as usize], 0xABCD);
        assert_eq!(canvas.pixel(0, 0), Some(0xABCD));
    }

    #[test]
    fn portrait_block_is_clipped_at_edges() {
        let mut canvas = Canvas::new();
        let block = [7u16; 16 * 16];
        canvas.draw_block(310, 470, 16, 16, &block);
        assert_eq!(canvas.writes(), 10 * 10);
        assert_eq!(canvas.pixel(319, 479), Some(7));
        assert_eq!(canvas.pixel(309, 479), Some(0));
    }

    #[test]
    fn short_pixel_slice_is_ignored() {
        let mut canvas = Canvas::new();
        canvas.draw_block(0, 0, 4, 4, &[1u16; 3]);
        assert_eq!(canvas.writes(), 0);
    }

    #[test]
    fn rotation_keeps_pixel_memory() {
        let mut canvas = Canvas::new();
        canvas.draw_block(5, 6, 1, 1, &[42]);
        canvas.set_orientation(Orientation::Landscape);
        canvas.set_orientation(Orientation::Portrait);
        assert_eq!(canvas.pixel(5, 6), Some(42));
    }
}

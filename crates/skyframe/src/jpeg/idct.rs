/// Natural (row-major) index of the k-th coefficient in zigzag order.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Separable float IDCT. `table[x * 8 + u] = C(u) / 2 * cos((2x + 1) u pi / 16)`.
pub struct Idct {
    table: [f32; 64],
}

impl Idct {
    pub fn new() -> Self {
        let mut table = [0f32; 64];
        for x in 0..8 {
            for u in 0..8 {
                let cu = if u == 0 { core::f32::consts::FRAC_1_SQRT_2 } else { 1.0 };
                let angle = ((2 * x + 1) * u) as f32 * core::f32::consts::PI / 16.0;
                table[x * 8 + u] = cu / 2.0 * angle.cos();
            }
        }
        Self { table }
    }

    /// Transform dequantized coefficients (natural order) into level-shifted
    /// samples, row-major with `stride` between rows of `out`.
    pub fn transform(&self, coeffs: &[i32; 64], out: &mut [u8], stride: usize) {
        if coeffs[1..].iter().all(|&c| c == 0) {
            let v = clamp_sample(coeffs[0] as f32 / 8.0);
            for y in 0..8 {
                out[y * stride..y * stride + 8].fill(v);
            }
            return;
        }

        let t = &self.table;
        let mut rows = [0f32; 64];
        for v in 0..8 {
            let src = &coeffs[v * 8..v * 8 + 8];
            if src.iter().all(|&c| c == 0) {
                continue;
            }
            for x in 0..8 {
                let mut acc = 0f32;
                for u in 0..8 {
                    acc += t[x * 8 + u] * src[u] as f32;
                }
                rows[v * 8 + x] = acc;
            }
        }
        for x in 0..8 {
            for y in 0..8 {
                let mut acc = 0f32;
                for v in 0..8 {
                    acc += t[y * 8 + v] * rows[v * 8 + x];
                }
                out[y * stride + x] = clamp_sample(acc);
            }
        }
    }
}

impl Default for Idct {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_sample(v: f32) -> u8 {
    (v + 128.0).round().clamp(0.0, 255.0) as u8
}

/// BT.601 full-range YCbCr to RGB565.
pub fn ycbcr_to_rgb565(y: u8, cb: u8, cr: u8) -> u16 {
    let y = (y as i32) << 16;
    let cb = cb as i32 - 128;
    let cr = cr as i32 - 128;
    // 16.16 fixed point: 1.402, 0.344136, 0.714136, 1.772
    let r = (y + 91881 * cr + 32768) >> 16;
    let g = (y - 22554 * cb - 46802 * cr + 32768) >> 16;
    let b = (y + 116130 * cb + 32768) >> 16;
    rgb565(r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8)
}

pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

//! Streaming baseline JPEG decoder.
//!
//! The decoder never materializes the full image. [`Blocks::next_block`]
//! yields one MCU of RGB565 pixels at a time, clipped to the frame, so the
//! caller can paint it straight into the canvas.

mod huffman;
mod idct;

use log::debug;

use crate::error::DecodeError;
use huffman::{extend, BitReader, HuffmanTable};
use idct::{rgb565, ycbcr_to_rgb565, Idct, ZIGZAG};

const MAX_COMPONENTS: usize = 3;
const MAX_SAMPLING: u8 = 2;
/// Largest DC difference category for 8-bit samples.
const MAX_DC_CATEGORY: u32 = 11;

/// One decoded rectangle of the image, row-major, `width * height` pixels.
#[derive(Debug, PartialEq, Eq)]
pub struct PixelBlock<'a> {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u16],
}

#[derive(Debug, Clone, Copy, Default)]
struct Component {
    id: u8,
    h: u8,
    v: u8,
    tq: usize,
    td: usize,
    ta: usize,
}

/// Parsed headers of a baseline JPEG, ready to stream its single scan.
pub struct JpegDecoder<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    components: [Component; MAX_COMPONENTS],
    ncomp: usize,
    qt: [[u16; 64]; 4],
    dc: [Option<HuffmanTable>; 4],
    ac: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    scan_start: usize,
}

struct Segments<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Segments<'a> {
    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn be_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(((self.byte()? as u16) << 8) | self.byte()? as u16)
    }

    fn marker(&mut self) -> Result<u8, DecodeError> {
        if self.byte()? != 0xFF {
            return Err(DecodeError::Malformed("marker"));
        }
        let mut m = self.byte()?;
        while m == 0xFF {
            m = self.byte()?;
        }
        Ok(m)
    }

    /// Body of the segment at the cursor, advancing past it.
    fn segment(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.be_u16()? as usize;
        if len < 2 {
            return Err(DecodeError::Malformed("segment length"));
        }
        let end = self.pos + len - 2;
        let body = self.data.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(body)
    }
}

impl<'a> JpegDecoder<'a> {
    /// Parse every header up to and including the start of scan.
    pub fn new(data: &'a [u8]) -> Result<Self, DecodeError> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(DecodeError::NotJpeg);
        }
        let mut dec = JpegDecoder {
            data,
            width: 0,
            height: 0,
            components: [Component::default(); MAX_COMPONENTS],
            ncomp: 0,
            qt: [[0; 64]; 4],
            dc: [None, None, None, None],
            ac: [None, None, None, None],
            restart_interval: 0,
            scan_start: 0,
        };
        let mut seg = Segments { data, pos: 2 };
        loop {
            match seg.marker()? {
                0xC0 | 0xC1 => dec.parse_sof(seg.segment()?)?,
                0xC2 | 0xC6 | 0xCA | 0xCE => return Err(DecodeError::Unsupported("progressive JPEG")),
                0xC3 | 0xC5 | 0xC7 | 0xC9 | 0xCB | 0xCD | 0xCF => {
                    return Err(DecodeError::Unsupported("coding process"))
                }
                0xC4 => dec.parse_dht(seg.segment()?)?,
                0xDB => dec.parse_dqt(seg.segment()?)?,
                0xDD => {
                    let body = seg.segment()?;
                    if body.len() < 2 {
                        return Err(DecodeError::Malformed("DRI"));
                    }
                    dec.restart_interval = u16::from_be_bytes([body[0], body[1]]);
                }
                0xDA => {
                    dec.parse_sos(seg.segment()?)?;
                    dec.scan_start = seg.pos;
                    break;
                }
                0xD9 => return Err(DecodeError::Truncated),
                0xD8 | 0xD0..=0xD7 | 0x01 => return Err(DecodeError::Malformed("marker")),
                // APPn, COM and anything else with a length: skip.
                _ => {
                    seg.segment()?;
                }
            }
        }
        debug!(
            "jpeg: {}x{} components={} restart={}",
            dec.width, dec.height, dec.ncomp, dec.restart_interval
        );
        Ok(dec)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn parse_sof(&mut self, body: &[u8]) -> Result<(), DecodeError> {
        if body.len() < 6 {
            return Err(DecodeError::Malformed("SOF"));
        }
        if body[0] != 8 {
            return Err(DecodeError::Unsupported("sample precision"));
        }
        self.height = u16::from_be_bytes([body[1], body[2]]) as u32;
        self.width = u16::from_be_bytes([body[3], body[4]]) as u32;
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::Unsupported("zero-sized frame"));
        }
        let n = body[5] as usize;
        if n != 1 && n != 3 {
            return Err(DecodeError::Unsupported("component count"));
        }
        if body.len() < 6 + n * 3 {
            return Err(DecodeError::Malformed("SOF"));
        }
        for i in 0..n {
            let c = &body[6 + i * 3..9 + i * 3];
            let (h, v) = (c[1] >> 4, c[1] & 0x0F);
            if !(1..=MAX_SAMPLING).contains(&h) || !(1..=MAX_SAMPLING).contains(&v) {
                return Err(DecodeError::Unsupported("sampling factor"));
            }
            if c[2] > 3 {
                return Err(DecodeError::Malformed("SOF"));
            }
            self.components[i] = Component {
                id: c[0],
                h,
                v,
                tq: c[2] as usize,
                td: 0,
                ta: 0,
            };
        }
        if n == 1 {
            // A single-component scan is never interleaved.
            self.components[0].h = 1;
            self.components[0].v = 1;
        }
        self.ncomp = n;
        Ok(())
    }

    fn parse_dqt(&mut self, mut body: &[u8]) -> Result<(), DecodeError> {
        while !body.is_empty() {
            let pq = body[0] >> 4;
            let tq = (body[0] & 0x0F) as usize;
            if tq > 3 || pq > 1 {
                return Err(DecodeError::Malformed("DQT"));
            }
            let size = if pq == 0 { 64 } else { 128 };
            let values = body.get(1..1 + size).ok_or(DecodeError::Malformed("DQT"))?;
            for k in 0..64 {
                self.qt[tq][k] = if pq == 0 {
                    values[k] as u16
                } else {
                    u16::from_be_bytes([values[2 * k], values[2 * k + 1]])
                };
            }
            body = &body[1 + size..];
        }
        Ok(())
    }

    fn parse_dht(&mut self, mut body: &[u8]) -> Result<(), DecodeError> {
        while !body.is_empty() {
            if body.len() < 17 {
                return Err(DecodeError::Malformed("DHT"));
            }
            let class = body[0] >> 4;
            let id = (body[0] & 0x0F) as usize;
            if class > 1 || id > 3 {
                return Err(DecodeError::Malformed("DHT"));
            }
            let mut counts = [0u8; 16];
            counts.copy_from_slice(&body[1..17]);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let values = body.get(17..17 + total).ok_or(DecodeError::Malformed("DHT"))?;
            let table = HuffmanTable::new(&counts, values)?;
            if class == 0 {
                self.dc[id] = Some(table);
            } else {
                self.ac[id] = Some(table);
            }
            body = &body[17 + total..];
        }
        Ok(())
    }

    fn parse_sos(&mut self, body: &[u8]) -> Result<(), DecodeError> {
        if self.ncomp == 0 {
            return Err(DecodeError::Malformed("SOS before SOF"));
        }
        let ns = *body.first().ok_or(DecodeError::Malformed("SOS"))? as usize;
        if ns != self.ncomp {
            return Err(DecodeError::Unsupported("multi-scan JPEG"));
        }
        if body.len() < 1 + ns * 2 + 3 {
            return Err(DecodeError::Malformed("SOS"));
        }
        for i in 0..ns {
            let id = body[1 + i * 2];
            let tables = body[2 + i * 2];
            let comp = self.components[..self.ncomp]
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(DecodeError::Malformed("SOS"))?;
            comp.td = (tables >> 4) as usize;
            comp.ta = (tables & 0x0F) as usize;
            if comp.td > 3 || comp.ta > 3 {
                return Err(DecodeError::Malformed("SOS"));
            }
            if self.dc[comp.td].is_none() || self.ac[comp.ta].is_none() {
                return Err(DecodeError::Malformed("DHT"));
            }
        }
        Ok(())
    }

    /// Start streaming the scan.
    pub fn into_blocks(self) -> Blocks<'a> {
        let comps = &self.components[..self.ncomp];
        let hmax = comps.iter().map(|c| c.h).max().unwrap_or(1) as u32;
        let vmax = comps.iter().map(|c| c.v).max().unwrap_or(1) as u32;
        let mcu_w = hmax * 8;
        let mcu_h = vmax * 8;
        let mcus_x = self.width.div_ceil(mcu_w);
        let mcus_y = self.height.div_ceil(mcu_h);
        let planes = comps
            .iter()
            .map(|c| vec![0u8; c.h as usize * 8 * c.v as usize * 8])
            .collect();
        Blocks {
            reader: BitReader::new(self.data, self.scan_start),
            idct: Idct::new(),
            mcu_w,
            mcu_h,
            mcus_x,
            total: mcus_x * mcus_y,
            index: 0,
            preds: [0; MAX_COMPONENTS],
            planes,
            out: vec![0u16; (mcu_w * mcu_h) as usize],
            done: false,
            header: self,
        }
    }
}

/// Lending iterator over the MCUs of the scan, in raster order.
pub struct Blocks<'a> {
    header: JpegDecoder<'a>,
    reader: BitReader<'a>,
    idct: Idct,
    mcu_w: u32,
    mcu_h: u32,
    mcus_x: u32,
    total: u32,
    index: u32,
    preds: [i32; MAX_COMPONENTS],
    planes: Vec<Vec<u8>>,
    out: Vec<u16>,
    done: bool,
}

impl<'a> Blocks<'a> {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Number of blocks the full image decodes into.
    pub fn block_count(&self) -> u32 {
        self.total
    }

    /// Decode the next MCU. After the first error the stream is finished.
    pub fn next_block(&mut self) -> Option<Result<PixelBlock<'_>, DecodeError>> {
        if self.done || self.index >= self.total {
            self.done = true;
            return None;
        }
        let ri = self.header.restart_interval as u32;
        if ri > 0 && self.index > 0 && self.index.is_multiple_of(ri) {
            if let Err(e) = self.reader.restart() {
                self.done = true;
                return Some(Err(e));
            }
            self.preds = [0; MAX_COMPONENTS];
        }
        if let Err(e) = self.decode_mcu() {
            self.done = true;
            return Some(Err(e));
        }

        let x = (self.index % self.mcus_x) * self.mcu_w;
        let y = (self.index / self.mcus_x) * self.mcu_h;
        let width = self.mcu_w.min(self.header.width - x);
        let height = self.mcu_h.min(self.header.height - y);
        self.index += 1;
        self.convert(width, height);
        Some(Ok(PixelBlock {
            x,
            y,
            width,
            height,
            pixels: &self.out[..(width * height) as usize],
        }))
    }

    fn decode_mcu(&mut self) -> Result<(), DecodeError> {
        let mut coeffs = [0i32; 64];
        for ci in 0..self.header.ncomp {
            let comp = self.header.components[ci];
            let dc = self.header.dc[comp.td].as_ref().ok_or(DecodeError::Malformed("DHT"))?;
            let ac = self.header.ac[comp.ta].as_ref().ok_or(DecodeError::Malformed("DHT"))?;
            let qt = &self.header.qt[comp.tq];
            let stride = comp.h as usize * 8;
            for by in 0..comp.v as usize {
                for bx in 0..comp.h as usize {
                    decode_block(&mut self.reader, dc, ac, qt, &mut self.preds[ci], &mut coeffs)?;
                    let offset = by * 8 * stride + bx * 8;
                    self.idct.transform(&coeffs, &mut self.planes[ci][offset..], stride);
                }
            }
        }
        if self.reader.overrun() {
            return Err(DecodeError::Truncated);
        }
        Ok(())
    }

    fn convert(&mut self, width: u32, height: u32) {
        let comps = &self.header.components[..self.header.ncomp];
        let (w, h) = (width as usize, height as usize);
        if comps.len() == 1 {
            let plane = &self.planes[0];
            for py in 0..h {
                for px in 0..w {
                    let v = plane[py * 8 + px];
                    self.out[py * w + px] = rgb565(v, v, v);
                }
            }
            return;
        }
        let hmax = self.mcu_w as usize / 8;
        let vmax = self.mcu_h as usize / 8;
        let sample = |ci: usize, px: usize, py: usize| {
            let c = &comps[ci];
            let (ch, cv) = (c.h as usize, c.v as usize);
            let sx = px * ch / hmax;
            let sy = py * cv / vmax;
            self.planes[ci][sy * ch * 8 + sx]
        };
        for py in 0..h {
            for px in 0..w {
                let y = sample(0, px, py);
                let cb = sample(1, px, py);
                let cr = sample(2, px, py);
                self.out[py * w + px] = ycbcr_to_rgb565(y, cb, cr);
            }
        }
    }
}

fn decode_block(
    reader: &mut BitReader<'_>,
    dc: &HuffmanTable,
    ac: &HuffmanTable,
    qt: &[u16; 64],
    pred: &mut i32,
    coeffs: &mut [i32; 64],
) -> Result<(), DecodeError> {
    coeffs.fill(0);
    let t = dc.decode(reader)? as u32;
    if t > MAX_DC_CATEGORY {
        return Err(DecodeError::BadHuffmanCode);
    }
    *pred = pred.saturating_add(extend(reader.receive(t), t));
    coeffs[0] = pred.saturating_mul(qt[0] as i32);

    let mut k = 1usize;
    while k < 64 {
        let rs = ac.decode(reader)?;
        let run = (rs >> 4) as usize;
        let size = (rs & 0x0F) as u32;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(DecodeError::Malformed("scan"));
        }
        coeffs[ZIGZAG[k]] = extend(reader.receive(size), size).saturating_mul(qt[k] as i32);
        k += 1;
    }
    Ok(())
}

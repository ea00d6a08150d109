#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use skyframe::canvas::Canvas;
use skyframe::connectivity::LinkDriver;
use skyframe::error::NetworkError;
use skyframe::http::HttpTransport;
use skyframe::memory::BufferPool;
use skyframe::render::Panel;
use skyframe::schedule::Clock;
use skyframe::touch::{TouchEvent, TouchSource};

// ── Time ────────────────────────────────────────────────────────────

/// Shared nanosecond counter; the delay advances it, the clock reads it.
#[derive(Clone, Default)]
pub struct Time(Rc<Cell<u64>>);

impl Time {
    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms * 1_000_000);
    }

    pub fn clock(&self) -> ManualClock {
        ManualClock(self.clone())
    }

    pub fn delay(&self) -> StepDelay {
        StepDelay(self.clone())
    }
}

pub struct ManualClock(Time);

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0 .0.get() / 1_000_000
    }
}

pub struct StepDelay(Time);

impl DelayNs for StepDelay {
    fn delay_ns(&mut self, ns: u32) {
        let t = &self.0 .0;
        t.set(t.get() + ns as u64);
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Response {
    pub status: Result<u16, NetworkError>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub content_length: Option<usize>,
    /// Peer hangs up after this many body bytes.
    pub cut_at: Option<usize>,
    /// Peer goes silent after this many body bytes without closing.
    pub stall_at: Option<usize>,
}

impl Response {
    pub fn status(status: u16) -> Self {
        Self {
            status: Ok(status),
            headers: Vec::new(),
            body: Vec::new(),
            content_length: Some(0),
            cut_at: None,
            stall_at: None,
        }
    }

    pub fn image(filename: &str, body: Vec<u8>) -> Self {
        let mut r = Self::status(200);
        r.content_length = Some(body.len());
        r.body = body;
        r.headers = vec![
            ("X-Image-Filename".into(), filename.into()),
            ("X-Image-Timestamp".into(), "2024-01-01 23:00:00".into()),
            ("X-Image-Exposure-Ms".into(), "1500".into()),
        ];
        r
    }

    pub fn json(body: &str) -> Self {
        let mut r = Self::status(200);
        r.body = body.as_bytes().to_vec();
        r.content_length = Some(r.body.len());
        r
    }

    pub fn unreachable() -> Self {
        let mut r = Self::status(0);
        r.status = Err(NetworkError::Connect("connection refused".into()));
        r
    }
}

/// Plays back one queued [`Response`] per `get`.
#[derive(Default)]
pub struct ScriptedHttp {
    pub queue: VecDeque<Response>,
    pub urls: Vec<String>,
    pub closes: usize,
    current: Option<Response>,
    pos: usize,
    open: bool,
}

impl ScriptedHttp {
    pub fn push(&mut self, r: Response) {
        self.queue.push_back(r);
    }

    fn limit(&self) -> usize {
        let r = match &self.current {
            Some(r) => r,
            None => return 0,
        };
        let mut end = r.body.len();
        if let Some(c) = r.cut_at {
            end = end.min(c);
        }
        if let Some(s) = r.stall_at {
            end = end.min(s);
        }
        end
    }
}

impl HttpTransport for ScriptedHttp {
    fn get(&mut self, url: &str, _timeout_ms: u64) -> Result<u16, NetworkError> {
        self.urls.push(url.to_string());
        let r = self
            .queue
            .pop_front()
            .unwrap_or_else(|| Response::unreachable());
        let status = r.status.clone();
        self.pos = 0;
        self.open = status.is_ok();
        self.current = Some(r);
        status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.current.as_ref()?.headers.iter().find_map(|(k, v)| {
            k.eq_ignore_ascii_case(name).then_some(v.as_str())
        })
    }

    fn content_length(&self) -> Option<usize> {
        self.current.as_ref()?.content_length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        if !self.open {
            return Ok(0);
        }
        let limit = self.limit();
        if self.pos >= limit {
            let r = self.current.as_ref().expect("read without response");
            if r.stall_at.is_none() {
                self.open = false;
            }
            return Ok(0);
        }
        // Dribble the body out in small chunks.
        let n = buf.len().min(limit - self.pos).min(700);
        let r = self.current.as_ref().expect("read without response");
        buf[..n].copy_from_slice(&r.body[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.closes += 1;
    }
}

// ── Memory ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct PoolStats {
    pub allocs: Rc<Cell<usize>>,
    pub frees: Rc<Cell<usize>>,
    pub live: Rc<Cell<usize>>,
    pub max_live: Rc<Cell<usize>>,
}

pub struct CountingPool {
    pub stats: PoolStats,
    pub capacity: usize,
}

impl CountingPool {
    pub fn new(capacity: usize) -> Self {
        Self { stats: PoolStats::default(), capacity }
    }
}

pub struct CountedBuf {
    data: Vec<u8>,
    stats: PoolStats,
}

impl Deref for CountedBuf {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for CountedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for CountedBuf {
    fn drop(&mut self) {
        self.stats.frees.set(self.stats.frees.get() + 1);
        self.stats.live.set(self.stats.live.get() - 1);
    }
}

impl BufferPool for CountingPool {
    type Buffer = CountedBuf;

    fn largest_free_block(&self) -> usize {
        self.capacity
    }

    fn allocate(&mut self, len: usize) -> Option<CountedBuf> {
        if len > self.capacity {
            return None;
        }
        let s = &self.stats;
        s.allocs.set(s.allocs.get() + 1);
        s.live.set(s.live.get() + 1);
        s.max_live.set(s.max_live.get().max(s.live.get()));
        Some(CountedBuf { data: vec![0; len], stats: s.clone() })
    }
}

// ── Display, link, touch ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPanel {
    pub flushes: usize,
    pub backlight_on: bool,
}

impl Panel for RecordingPanel {
    fn flush(&mut self, _canvas: &Canvas) {
        self.flushes += 1;
    }

    fn set_backlight(&mut self, on: bool) {
        self.backlight_on = on;
    }
}

#[derive(Clone, Default)]
pub struct FakeLink {
    pub up: Rc<Cell<bool>>,
    pub attempts: Rc<Cell<u32>>,
}

impl LinkDriver for FakeLink {
    fn is_connected(&mut self) -> bool {
        self.up.get()
    }

    fn start_connect(&mut self) -> Result<(), NetworkError> {
        self.attempts.set(self.attempts.get() + 1);
        Ok(())
    }
}

/// Replays queued samples, then reports no touch.
#[derive(Default)]
pub struct ScriptedTouch {
    pub samples: VecDeque<TouchEvent>,
}

impl ScriptedTouch {
    pub fn tap(&mut self, x: i16, y: i16) {
        self.samples.push_back(TouchEvent::at(x, y));
        self.samples.push_back(TouchEvent::NONE);
    }
}

impl TouchSource for ScriptedTouch {
    fn read(&mut self) -> TouchEvent {
        self.samples.pop_front().unwrap_or(TouchEvent::NONE)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn jpeg(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels: Vec<u8> = (0..w * h).flat_map(|_| rgb).collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 85)
        .encode(&pixels, w, h, ExtendedColorType::Rgb8)
        .expect("encode fixture");
    out
}

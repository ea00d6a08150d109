mod common;

use common::*;
use embedded_graphics::pixelcolor::raw::{RawData, RawU16};
use skyframe::layout::{BG_ERROR, BG_IDLE};
use skyframe::pipeline::{FetchResult, ImagePipeline};
use skyframe::render::{Placeholder, Renderer, Screen};
use skyframe::schedule::Clock;
use skyframe::Settings;

struct Rig {
    http: ScriptedHttp,
    pool: CountingPool,
    time: Time,
    renderer: Renderer<RecordingPanel>,
    pipeline: ImagePipeline,
    settings: Settings,
}

impl Rig {
    fn new() -> Self {
        Self {
            http: ScriptedHttp::default(),
            pool: CountingPool::new(256 * 1024),
            time: Time::default(),
            renderer: Renderer::new(RecordingPanel::default()),
            pipeline: ImagePipeline::new(),
            settings: Settings {
                server_url: "http://cam.local:5000".into(),
                ..Settings::default()
            },
        }
    }

    fn fetch(&mut self, response: Response) -> FetchResult {
        self.http.push(response);
        let clock = self.time.clock();
        let mut delay = self.time.delay();
        self.pipeline.fetch_and_render(
            &mut self.http,
            &mut self.pool,
            &clock,
            &mut delay,
            &mut self.renderer,
            &self.settings,
        )
    }

    fn allocs(&self) -> usize {
        self.pool.stats.allocs.get()
    }

    fn frees(&self) -> usize {
        self.pool.stats.frees.get()
    }
}

#[test]
fn request_carries_size_quality_and_rotation() {
    let mut rig = Rig::new();
    rig.settings.jpeg_quality = 70;
    rig.settings.rotation_deg = 180;
    rig.fetch(Response::status(404));
    assert_eq!(
        rig.http.urls,
        vec!["http://cam.local:5000/api/latest_image_preview?width=320&height=480&quality=70&rotate=180"]
    );
}

#[test]
fn displayed_image_fills_canvas_and_frees_its_buffer() {
    let mut rig = Rig::new();
    let result = rig.fetch(Response::image("img_a.jpg", jpeg(320, 480, [250, 250, 250])));
    assert_eq!(result, FetchResult::Displayed);
    assert_eq!(rig.allocs(), 1);
    assert_eq!(rig.frees(), 1);
    assert_eq!(rig.pool.stats.live.get(), 0);
    assert!(rig.http.closes >= 1);
    assert_eq!(rig.renderer.screen(), &Screen::Image);
    assert!(rig.renderer.panel().backlight_on);

    let px = rig.renderer.canvas().pixel(160, 240).unwrap();
    assert!(px >> 11 >= 29, "expected near-white, got {:#06x}", px);
    assert_eq!(rig.pipeline.identity().unwrap().exposure_ms, 1500);
}

#[test]
fn same_filename_is_unchanged_without_decode_or_writes() {
    let mut rig = Rig::new();
    let image = jpeg(64, 64, [10, 200, 10]);
    assert_eq!(rig.fetch(Response::image("img_a.jpg", image.clone())), FetchResult::Displayed);
    let writes = rig.renderer.canvas().writes();
    let flushes = rig.renderer.panel().flushes;

    assert_eq!(rig.fetch(Response::image("img_a.jpg", image)), FetchResult::Unchanged);
    assert_eq!(rig.renderer.canvas().writes(), writes);
    assert_eq!(rig.renderer.panel().flushes, flushes);
    assert_eq!(rig.allocs(), 1);
    assert_eq!(rig.frees(), 1);
}

#[test]
fn new_filename_redraws_and_repeat_does_not() {
    let mut rig = Rig::new();
    let image = jpeg(32, 32, [200, 30, 30]);
    assert_eq!(
        rig.fetch(Response::image("img_20240101_2300.jpg", image.clone())),
        FetchResult::Displayed
    );
    assert_eq!(
        rig.fetch(Response::image("img_20240101_2305.jpg", image.clone())),
        FetchResult::Displayed
    );
    assert_eq!(
        rig.fetch(Response::image("img_20240101_2305.jpg", image)),
        FetchResult::Unchanged
    );
    assert_eq!(rig.pipeline.identity().unwrap().filename, "img_20240101_2305.jpg");
    assert_eq!(rig.allocs(), 2);
    assert_eq!(rig.frees(), 2);
}

#[test]
fn same_filename_redraws_after_something_else_was_shown() {
    let mut rig = Rig::new();
    let image = jpeg(32, 32, [0, 0, 200]);
    rig.fetch(Response::image("img_a.jpg", image.clone()));
    rig.pipeline.invalidate();
    assert_eq!(rig.fetch(Response::image("img_a.jpg", image)), FetchResult::Displayed);
}

#[test]
fn idle_statuses_show_the_no_images_placeholder() {
    let mut rig = Rig::new();
    assert_eq!(rig.fetch(Response::status(404)), FetchResult::NoImagesAvailable);
    assert_eq!(rig.renderer.screen(), &Screen::Placeholder(Placeholder::NoImages));
    assert_eq!(rig.renderer.canvas().raw()[0], RawU16::from(BG_IDLE).into_inner());

    assert_eq!(rig.fetch(Response::status(503)), FetchResult::CaptureDisabled);
    assert_eq!(rig.renderer.screen(), &Screen::Placeholder(Placeholder::CaptureDisabled));
    assert_eq!(rig.allocs(), 0);
}

#[test]
fn other_statuses_show_labeled_error() {
    let mut rig = Rig::new();
    assert_eq!(rig.fetch(Response::status(500)), FetchResult::HttpError(500));
    assert_eq!(rig.renderer.screen(), &Screen::Error("HTTP 500".into()));
    assert_eq!(rig.renderer.canvas().raw()[0], RawU16::from(BG_ERROR).into_inner());
}

#[test]
fn mid_transfer_disconnect_frees_buffer_and_keeps_screen() {
    let mut rig = Rig::new();
    let mut r = Response::image("img_a.jpg", jpeg(64, 64, [1, 2, 3]));
    r.cut_at = Some(100);
    assert_eq!(rig.fetch(r), FetchResult::NetworkFailure);
    assert_eq!(rig.allocs(), 1);
    assert_eq!(rig.frees(), 1);
    assert_eq!(rig.renderer.screen(), &Screen::Blank);
}

#[test]
fn network_failure_replaces_a_weather_screen() {
    let mut rig = Rig::new();
    rig.renderer.show_weather(None, true);
    let mut r = Response::image("img_a.jpg", jpeg(64, 64, [1, 2, 3]));
    r.cut_at = Some(100);
    assert_eq!(rig.fetch(r), FetchResult::NetworkFailure);
    assert_eq!(rig.renderer.screen(), &Screen::Error("Network error".into()));
    assert_eq!((rig.allocs(), rig.frees()), (1, 1));
}

#[test]
fn stalled_transfer_times_out() {
    let mut rig = Rig::new();
    rig.settings.image_timeout_ms = 2_000;
    let mut r = Response::image("img_a.jpg", jpeg(64, 64, [1, 2, 3]));
    r.stall_at = Some(200);
    assert_eq!(rig.fetch(r), FetchResult::NetworkFailure);
    assert!(rig.time.clock().now_ms() >= 2_000);
    assert_eq!(rig.frees(), rig.allocs());
}

#[test]
fn garbage_body_is_a_decode_error_screen() {
    let mut rig = Rig::new();
    let result = rig.fetch(Response::image("img_a.jpg", b"<html>oops</html>".to_vec()));
    assert_eq!(result, FetchResult::DecodeFailure);
    assert_eq!(rig.renderer.screen(), &Screen::Error("Decode error".into()));
    assert_eq!((rig.allocs(), rig.frees()), (1, 1));
}

#[test]
fn truncated_jpeg_paints_partially_and_frees_buffer() {
    let mut rig = Rig::new();
    let mut body = jpeg(320, 480, [90, 90, 200]);
    body.truncate(body.len() / 2);
    let result = rig.fetch(Response::image("img_a.jpg", body));
    assert_eq!(result, FetchResult::DecodeFailure);
    assert_eq!(rig.renderer.screen(), &Screen::Image);
    assert!(rig.renderer.canvas().writes() > 0);
    assert!(!rig.pipeline.image_shown());
    assert_eq!((rig.allocs(), rig.frees()), (1, 1));
}

#[test]
fn missing_content_length_is_a_network_failure() {
    let mut rig = Rig::new();
    let mut r = Response::image("img_a.jpg", jpeg(16, 16, [0, 0, 0]));
    r.content_length = None;
    assert_eq!(rig.fetch(r), FetchResult::NetworkFailure);
    assert_eq!(rig.allocs(), 0);
}

#[test]
fn oversized_body_is_out_of_memory_without_allocating() {
    let mut rig = Rig::new();
    let mut r = Response::image("img_a.jpg", jpeg(16, 16, [0, 0, 0]));
    r.content_length = Some(rig.settings.max_image_bytes + 1);
    assert_eq!(rig.fetch(r), FetchResult::OutOfMemory);
    assert_eq!(rig.renderer.screen(), &Screen::Error("Out of memory".into()));
    assert_eq!(rig.allocs(), 0);
}

#[test]
fn pool_refusal_is_out_of_memory() {
    let mut rig = Rig::new();
    rig.pool.capacity = 100;
    assert_eq!(
        rig.fetch(Response::image("img_a.jpg", jpeg(64, 64, [5, 5, 5]))),
        FetchResult::OutOfMemory
    );
}

#[test]
fn never_more_than_one_buffer_live() {
    let mut rig = Rig::new();
    for i in 0..5 {
        rig.fetch(Response::image(&format!("img_{}.jpg", i), jpeg(48, 48, [i * 40, 0, 0])));
    }
    assert_eq!(rig.pool.stats.max_live.get(), 1);
    assert_eq!(rig.allocs(), 5);
    assert_eq!(rig.frees(), 5);
}

#[test]
fn small_frames_are_centered() {
    let mut rig = Rig::new();
    rig.fetch(Response::image("img_a.jpg", jpeg(160, 240, [255, 255, 255])));
    let canvas = rig.renderer.canvas();
    let bg = RawU16::from(BG_IDLE).into_inner();
    assert_eq!(canvas.pixel(10, 10), Some(bg));
    assert_ne!(canvas.pixel(160, 240), Some(bg));
}

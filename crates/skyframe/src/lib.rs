//! Core of the skyframe display client.
//!
//! Everything that decides what the screen shows lives here, written
//! against small hardware seams ([`connectivity::LinkDriver`],
//! [`http::HttpTransport`], [`memory::BufferPool`], [`touch::TouchSource`],
//! [`render::Panel`], [`schedule::Clock`]). The firmware crate supplies the
//! ESP-IDF implementations; tests supply scripted ones.

pub mod app;
pub mod canvas;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod icons;
pub mod jpeg;
pub mod layout;
pub mod memory;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod touch;
pub mod view;
pub mod weather;

pub use app::{App, TickOutcome};
pub use config::Settings;
pub use pipeline::{FetchResult, ImageIdentity};
pub use view::ViewMode;

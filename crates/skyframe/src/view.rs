use log::{debug, info};

use crate::layout::BACK_BUTTON;
use crate::touch::TouchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    ImageView,
    WeatherView,
}

/// Work the control loop owes after a touch was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    /// Fetch the weather, then draw the weather screen.
    ShowWeather,
    /// Re-fetch and redraw the camera image right away.
    ShowImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Ready,
    /// A press was seen; nothing else is accepted until the finger lifts.
    AwaitingRelease,
}

/// Turns raw per-iteration touch samples into at most one accepted press
/// per physical gesture, spaced by at least the debounce window.
#[derive(Debug)]
pub struct TouchGate {
    debounce_ms: u64,
    last_accept_ms: Option<u64>,
    state: GateState,
}

impl TouchGate {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_accept_ms: None,
            state: GateState::Ready,
        }
    }

    pub fn awaiting_release(&self) -> bool {
        self.state == GateState::AwaitingRelease
    }

    /// Feed one sample. Returns the point of a newly accepted press.
    pub fn accept(&mut self, event: TouchEvent, now_ms: u64) -> Option<(i32, i32)> {
        match self.state {
            GateState::AwaitingRelease => {
                if !event.present {
                    debug!("touch: released");
                    self.state = GateState::Ready;
                }
                None
            }
            GateState::Ready if !event.present => None,
            GateState::Ready => {
                // Even a bounced press must lift before another counts.
                self.state = GateState::AwaitingRelease;
                if let Some(last) = self.last_accept_ms {
                    if now_ms.saturating_sub(last) < self.debounce_ms {
                        debug!("touch: ({}, {}) inside debounce window", event.x, event.y);
                        return None;
                    }
                }
                self.last_accept_ms = Some(now_ms);
                Some((event.x as i32, event.y as i32))
            }
        }
    }
}

/// Owns [`ViewMode`] and decides what each accepted touch means.
#[derive(Debug)]
pub struct ViewMachine {
    mode: ViewMode,
    gate: TouchGate,
}

impl ViewMachine {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            mode: ViewMode::ImageView,
            gate: TouchGate::new(debounce_ms),
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn awaiting_release(&self) -> bool {
        self.gate.awaiting_release()
    }

    /// The periodic image refresh runs only in image view, and not while a
    /// press is still held.
    pub fn refresh_enabled(&self) -> bool {
        self.mode == ViewMode::ImageView && !self.gate.awaiting_release()
    }

    pub fn on_touch(&mut self, event: TouchEvent, now_ms: u64) -> Command {
        let Some((x, y)) = self.gate.accept(event, now_ms) else {
            return Command::None;
        };
        match self.mode {
            ViewMode::ImageView => {
                info!("view: touch at ({}, {}), switching to weather", x, y);
                self.mode = ViewMode::WeatherView;
                Command::ShowWeather
            }
            ViewMode::WeatherView if BACK_BUTTON.contains(x, y) => {
                info!("view: back pressed, switching to image");
                self.mode = ViewMode::ImageView;
                Command::ShowImage
            }
            ViewMode::WeatherView => {
                debug!("view: touch at ({}, {}) outside back button ignored", x, y);
                Command::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn back() -> TouchEvent {
        let c = BACK_BUTTON.center();
        TouchEvent::at(c.x as i16, c.y as i16)
    }

    #[test]
    fn held_press_is_one_transition() {
        let mut vm = ViewMachine::new(300);
        assert_eq!(vm.on_touch(TouchEvent::at(200, 100), 0), Command::ShowWeather);
        for t in (10..2_000).step_by(10) {
            assert_eq!(vm.on_touch(TouchEvent::at(200, 100), t), Command::None);
            assert!(vm.awaiting_release());
            assert!(!vm.refresh_enabled());
        }
        assert_eq!(vm.on_touch(TouchEvent::NONE, 2_000), Command::None);
        assert!(!vm.awaiting_release());
        assert_eq!(vm.mode(), ViewMode::WeatherView);
    }

    #[test]
    fn taps_inside_debounce_window_are_dropped() {
        let mut vm = ViewMachine::new(300);
        assert_eq!(vm.on_touch(TouchEvent::at(10, 10), 1_000), Command::ShowWeather);
        vm.on_touch(TouchEvent::NONE, 1_050);
        assert_eq!(vm.on_touch(back(), 1_100), Command::None);
        assert_eq!(vm.mode(), ViewMode::WeatherView);
        vm.on_touch(TouchEvent::NONE, 1_150);
        assert_eq!(vm.on_touch(back(), 1_400), Command::ShowImage);
        assert_eq!(vm.mode(), ViewMode::ImageView);
    }

    #[test]
    fn bounced_press_must_lift_before_next() {
        let mut gate = TouchGate::new(300);
        assert!(gate.accept(TouchEvent::at(1, 1), 0).is_some());
        gate.accept(TouchEvent::NONE, 20);
        // Bounce inside the window, then held past it.
        assert!(gate.accept(TouchEvent::at(1, 1), 40).is_none());
        assert!(gate.accept(TouchEvent::at(1, 1), 400).is_none());
        gate.accept(TouchEvent::NONE, 420);
        assert_eq!(gate.accept(TouchEvent::at(5, 6), 440), Some((5, 6)));
    }

    #[test]
    fn weather_view_ignores_touches_outside_back_button() {
        let mut vm = ViewMachine::new(0);
        vm.on_touch(TouchEvent::at(240, 160), 0);
        vm.on_touch(TouchEvent::NONE, 1);
        assert_eq!(vm.on_touch(TouchEvent::at(400, 300), 2), Command::None);
        vm.on_touch(TouchEvent::NONE, 3);
        let edge = TouchEvent::at((BACK_BUTTON.x + BACK_BUTTON.w) as i16, BACK_BUTTON.y as i16);
        assert_eq!(vm.on_touch(edge, 4), Command::None);
        assert_eq!(vm.mode(), ViewMode::WeatherView);
        assert!(!vm.refresh_enabled());
    }
}

use log::{info, warn};

use crate::error::NetworkError;

pub const FAILURE_WARN_EVERY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The radio underneath the manager. Both calls must return promptly: the
/// control loop polls the link once per iteration.
pub trait LinkDriver {
    /// Associated with the access point and holding an address.
    fn is_connected(&mut self) -> bool;
    /// Kick off an association attempt without waiting for it to finish.
    fn start_connect(&mut self) -> Result<(), NetworkError>;
}

/// Owns [`ConnectionState`]; nothing else mutates it.
pub struct Connectivity<L> {
    link: L,
    state: ConnectionState,
    retry_ms: u64,
    last_attempt_ms: Option<u64>,
    consecutive_failures: u32,
}

impl<L: LinkDriver> Connectivity<L> {
    pub fn new(link: L, retry_ms: u64) -> Self {
        Self {
            link,
            state: ConnectionState::Disconnected,
            retry_ms,
            last_attempt_ms: None,
            consecutive_failures: 0,
        }
    }

    pub fn status(&self) -> ConnectionState {
        self.state
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Sample the link. Call once per loop iteration.
    pub fn poll(&mut self) -> ConnectionState {
        let up = self.link.is_connected();
        let next = match (self.state, up) {
            (_, true) => ConnectionState::Connected,
            (ConnectionState::Connected, false) => {
                warn!("WiFi link lost");
                // Retry straight away instead of waiting out the backoff.
                self.last_attempt_ms = None;
                ConnectionState::Disconnected
            }
            (state, false) => state,
        };
        if next == ConnectionState::Connected && self.state != ConnectionState::Connected {
            info!(
                "WiFi connected after {} failed attempt(s)",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }
        self.state = next;
        self.state
    }

    /// Start or resume an association attempt unless already connected.
    /// Attempts are spaced by the fixed backoff and never give up.
    pub fn ensure_connected(&mut self, now_ms: u64) {
        if self.state == ConnectionState::Connected {
            return;
        }
        if let Some(last) = self.last_attempt_ms {
            if now_ms.saturating_sub(last) < self.retry_ms {
                return;
            }
            if self.state == ConnectionState::Connecting {
                self.note_failure(&NetworkError::Timeout);
            }
        }

        self.last_attempt_ms = Some(now_ms);
        match self.link.start_connect() {
            Ok(()) => {
                info!("WiFi connect attempt started");
                self.state = ConnectionState::Connecting;
            }
            Err(e) => {
                self.note_failure(&e);
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    fn note_failure(&mut self, e: &NetworkError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures == 1
            || self.consecutive_failures.is_multiple_of(FAILURE_WARN_EVERY)
        {
            warn!(
                "WiFi connect failed ({} consecutive): {}",
                self.consecutive_failures, e
            );
        } else {
            info!("WiFi connect failed ({} consecutive)", self.consecutive_failures);
        }
    }
}

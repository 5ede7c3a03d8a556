//! Fixed-window call throttle for the generative text service.
//!
//! Time is read and slept through a [`Clock`] so tests can run the throttle
//! against virtual time.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Source of time for throttling and backoff.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct FakeClockState {
    origin: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` returns immediately, advances time, and records
/// the requested duration.
///
/// Clones share state, so a test can keep a handle while the throttle owns
/// another.
#[derive(Debug, Clone)]
pub struct FakeClock {
    state: Arc<Mutex<FakeClockState>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeClockState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move virtual time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.elapsed += duration;
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sleeps
            .clone()
    }

    /// Virtual time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).elapsed
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.origin + state.elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}

/// Allows at most `max_calls` calls per `window`.
///
/// The window opens at the first call. Once the cap is reached, the next
/// call sleeps out the rest of the window and opens a fresh one. A window
/// that has already expired is reset without waiting.
#[derive(Debug)]
pub struct Throttle<C: Clock> {
    clock: C,
    max_calls: u32,
    window: Duration,
    window_start: Option<Instant>,
    calls: u32,
}

impl<C: Clock> Throttle<C> {
    pub fn new(clock: C, max_calls: u32, window: Duration) -> Self {
        Self {
            clock,
            max_calls: max_calls.max(1),
            window,
            window_start: None,
            calls: 0,
        }
    }

    /// Reserve one call, sleeping first if the window is exhausted.
    ///
    /// Returns the duration slept, if any.
    pub async fn acquire(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);

        let mut waited = None;
        if elapsed >= self.window {
            debug!("Throttle window expired; resetting");
            self.reset(now);
        } else if self.calls >= self.max_calls {
            let wait = self.window - elapsed;
            info!(
                wait_secs = wait.as_secs_f64(),
                calls = self.calls,
                "Call cap reached; waiting for next window"
            );
            self.clock.sleep(wait).await;
            self.reset(self.clock.now());
            waited = Some(wait);
        }

        self.calls += 1;
        waited
    }

    /// Calls counted in the current window.
    pub fn calls_in_window(&self) -> u32 {
        self.calls
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn reset(&mut self, now: Instant) {
        self.window_start = Some(now);
        self.calls = 0;
    }
}

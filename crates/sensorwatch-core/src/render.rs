//! Periodic render loop.
//!
//! Each cycle copies the window under its lock, releases the lock, and only
//! then hands the copy to a [`ChartSink`]. The loop never waits for new data:
//! it renders whatever the window holds, including an unchanged window.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::window::{SampleWindow, WindowSnapshot};

/// The rendering collaborator.
pub trait ChartSink {
    /// Called instead of [`ChartSink::render`] while the window is empty.
    fn waiting(&mut self);

    /// Display the snapshot, replacing whatever was shown before.
    fn render(&mut self, snapshot: &WindowSnapshot) -> io::Result<()>;
}

/// What one render cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Window was empty; the sink was told to keep waiting.
    Waiting,
    /// A chart with `points` samples was displayed.
    Rendered { points: usize },
    /// The sink reported an error. Later cycles still run.
    Failed,
}

/// Run a single render cycle.
pub fn render_step<S: ChartSink + ?Sized>(window: &SampleWindow, sink: &mut S) -> RenderOutcome {
    let snapshot = window.snapshot();

    if snapshot.is_empty() {
        sink.waiting();
        return RenderOutcome::Waiting;
    }

    match sink.render(&snapshot) {
        Ok(()) => RenderOutcome::Rendered {
            points: snapshot.len(),
        },
        Err(e) => {
            log::error!("render failed: {e}");
            RenderOutcome::Failed
        }
    }
}

/// Foreground loop that renders on a fixed interval until told to stop.
#[derive(Debug, Clone, Copy)]
pub struct RenderLoop {
    interval: Duration,
}

/// How often the loop checks the stop flag while sleeping.
const STOP_POLL: Duration = Duration::from_millis(50);

impl RenderLoop {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Render, sleep, repeat while `running` is set. Returns the number of
    /// cycles run.
    pub fn run<S: ChartSink + ?Sized>(
        &self,
        window: &SampleWindow,
        sink: &mut S,
        running: &AtomicBool,
    ) -> u64 {
        let mut cycles = 0u64;
        while running.load(Ordering::SeqCst) {
            render_step(window, sink);
            cycles += 1;

            // No deadline means the interval overflows the clock; wait for stop.
            let deadline = Instant::now().checked_add(self.interval);
            while running.load(Ordering::SeqCst) {
                let remaining = match deadline {
                    Some(d) => d.saturating_duration_since(Instant::now()),
                    None => STOP_POLL,
                };
                if remaining.is_zero() {
                    break;
                }
                thread::sleep(STOP_POLL.min(remaining));
            }
        }
        cycles
    }
}

//! TUI application state and event loop.
//!
//! The event loop redraws every 50ms, but the chart contents only change on
//! a render tick: every refresh interval the window is copied into the
//! [`ChartView`], which then stays fixed until the next tick.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use sensorwatch_core::{
    ChartSink, IngestStats, MonitorConfig, RenderOutcome, SampleWindow, StatsSnapshot,
    WindowSnapshot, render_step,
};

use crate::logging::LogBuffer;

const MIN_REFRESH: Duration = Duration::from_millis(500);
const MAX_REFRESH: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// ChartView
// ---------------------------------------------------------------------------

/// The chart currently on screen. Each render replaces the previous one.
#[derive(Debug, Default)]
pub struct ChartView {
    current: Option<WindowSnapshot>,
    rendered_at: Option<DateTime<Local>>,
}

impl ChartView {
    pub fn current(&self) -> Option<&WindowSnapshot> {
        self.current.as_ref()
    }

    pub fn rendered_at(&self) -> Option<DateTime<Local>> {
        self.rendered_at
    }
}

impl ChartSink for ChartView {
    fn waiting(&mut self) {
        self.current = None;
    }

    fn render(&mut self, snapshot: &WindowSnapshot) -> io::Result<()> {
        self.current = Some(snapshot.clone());
        self.rendered_at = Some(Local::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    window: Arc<SampleWindow>,
    stats: Arc<IngestStats>,
    logs: LogBuffer,
    broker: String,
    topic: String,

    view: ChartView,
    last_outcome: Option<RenderOutcome>,
    cycles: u64,

    refresh_rate: Duration,
    paused: bool,
    running: bool,
}

impl App {
    pub fn new(
        window: Arc<SampleWindow>,
        stats: Arc<IngestStats>,
        logs: LogBuffer,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            window,
            stats,
            logs,
            broker: format!("{}:{}", config.broker_host, config.broker_port),
            topic: config.topic.clone(),
            view: ChartView::default(),
            last_outcome: None,
            cycles: 0,
            refresh_rate: config.read_interval(),
            paused: false,
            running: true,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Restore the terminal before the panic message is printed.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        self.tick();
        let mut last_tick = Instant::now();

        while self.running {
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code, key.modifiers);
            }

            if last_tick.elapsed() >= self.refresh_rate {
                if !self.paused {
                    self.tick();
                }
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    /// One render cycle: copy the window into the view.
    pub fn tick(&mut self) {
        let outcome = render_step(&self.window, &mut self.view);
        self.last_outcome = Some(outcome);
        self.cycles += 1;
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false
            }
            KeyCode::Char('p') => self.paused = !self.paused,
            KeyCode::Char('r') => self.tick(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.refresh_rate = (self.refresh_rate / 2).max(MIN_REFRESH.min(self.refresh_rate));
            }
            KeyCode::Char('-') => {
                // Never shorten an interval configured above the key range.
                self.refresh_rate = self
                    .refresh_rate
                    .saturating_mul(2)
                    .min(MAX_REFRESH.max(self.refresh_rate));
            }
            _ => {}
        }
    }

    // ---- accessors for ui ----

    pub fn view(&self) -> &ChartView {
        &self.view
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn window_fill(&self) -> (usize, usize) {
        (self.window.len(), self.window.capacity())
    }

    pub fn log_lines(&self, n: usize) -> Vec<String> {
        self.logs.tail(n)
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn refresh_secs(&self) -> f64 {
        self.refresh_rate.as_secs_f64()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn last_outcome(&self) -> Option<RenderOutcome> {
        self.last_outcome
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub(crate) fn press(&mut self, key: KeyCode) {
        self.handle_key(key, KeyModifiers::NONE);
    }
}

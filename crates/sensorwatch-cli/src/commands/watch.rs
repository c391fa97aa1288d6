use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    queue,
    terminal::{Clear, ClearType},
};
use sensorwatch_core::{ChartSink, MonitorConfig, RenderLoop, WindowSnapshot};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 32;

pub fn run(config: &MonitorConfig) {
    crate::logging::init_stderr();
    super::print_banner(config);

    let pipeline = match super::start_pipeline(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    println!("   Connected. Press Ctrl+C to stop.\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        pipeline.shutdown();
        std::process::exit(1);
    }

    let stdout = io::stdout();
    let mut sink = if stdout.is_terminal() {
        ConsoleSink::in_place(stdout)
    } else {
        ConsoleSink::new(stdout)
    };
    let cycles = RenderLoop::new(config.read_interval()).run(pipeline.window(), &mut sink, &running);

    println!("\nStopping MQTT client...");
    let stats = pipeline.stats().snapshot();
    pipeline.shutdown();
    println!(
        "Done. {cycles} render cycles, {} readings accepted, {} rejected, {} dropped.",
        stats.accepted,
        stats.malformed + stats.incomplete,
        stats.dropped
    );
}

/// Writes a summary line per render cycle. On a terminal the line is
/// redrawn in place so only the latest chart is visible; otherwise each
/// cycle appends a line.
pub struct ConsoleSink<W: Write> {
    out: W,
    in_place: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, in_place: false }
    }

    pub fn in_place(out: W) -> Self {
        Self { out, in_place: true }
    }

    fn show(&mut self, line: &str) -> io::Result<()> {
        if self.in_place {
            self.out.write_all(b"\r")?;
            queue!(self.out, Clear(ClearType::CurrentLine))?;
            self.out.write_all(line.as_bytes())?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ChartSink for ConsoleSink<W> {
    fn waiting(&mut self) {
        if let Err(e) = self.show("Waiting for first sensor data…") {
            log::warn!("stdout write failed: {e}");
        }
    }

    fn render(&mut self, snapshot: &WindowSnapshot) -> io::Result<()> {
        let Some(latest) = snapshot.latest() else {
            return Ok(());
        };
        let (t_min, t_max) = snapshot.temperature_range().unwrap_or_default();
        let (h_min, h_max) = snapshot.humidity_range().unwrap_or_default();
        let line = format!(
            "[{}] {:>3} pts  temp {:6.2} °C ({:.1}..{:.1}) {}  hum {:6.2} % ({:.1}..{:.1}) {}",
            latest.timestamp().format("%H:%M:%S"),
            snapshot.len(),
            latest.temperature(),
            t_min,
            t_max,
            sparkline(&snapshot.temperatures, SPARK_WIDTH),
            latest.humidity(),
            h_min,
            h_max,
            sparkline(&snapshot.humidities, SPARK_WIDTH),
        );
        self.show(&line)
    }
}

/// Block-character sparkline of the newest `width` values.
fn sparkline(values: &[f64], width: usize) -> String {
    let start = values.len().saturating_sub(width);
    let values = &values[start..];
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    values
        .iter()
        .map(|&v| {
            if span <= f64::EPSILON {
                SPARK[SPARK.len() / 2]
            } else {
                let idx = ((v - lo) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────────┐
//! │  🌡 sensorwatch   broker.hivemq.com:1883   42/100     │
//! ├──────────────────────────────────────────────┬───────┤
//! │ °C  ⣀⡠⠤⠒⠉ temperature                         │  %RH  │
//! │     ⠒⠒⠤⢄⣀ humidity                            │  62.0 │
//! │  12:00:00        12:04:10         12:08:20    │  48.0 │
//! ├──────────────────────────────────────────────┴───────┤
//! │  ingest counters + recent log lines                   │
//! ├──────────────────────────────────────────────────────┤
//! │  q: quit   p: pause   +/-: refresh   r: render now    │
//! └──────────────────────────────────────────────────────┘

use super::app::App;
use super::scale::{self, AxisRange};
use ratatui::{prelude::*, widgets::*};
use sensorwatch_core::{RenderOutcome, WindowSnapshot};

const TEMP_COLOR: Color = Color::Red;
const HUM_COLOR: Color = Color::Blue;
const HUM_COLUMN: u16 = 8;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // chart
            Constraint::Length(7), // diagnostics
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    match app.view().current() {
        Some(snapshot) => draw_chart(f, rows[1], snapshot),
        None => draw_waiting(f, rows[1]),
    }
    draw_diagnostics(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let (len, cap) = app.window_fill();
    let status = match (app.is_paused(), app.last_outcome()) {
        (true, _) => "  PAUSED",
        (false, Some(RenderOutcome::Failed)) => "  RENDER FAILED",
        _ => "",
    };
    let rendered = app
        .view()
        .rendered_at()
        .map(|ts| ts.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "—".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" 🌡 sensorwatch ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(app.broker(), Style::default().bold().fg(Color::Yellow)),
            Span::raw("  "),
            Span::raw(app.topic()),
            Span::styled(
                format!(
                    "  {len}/{cap} pts  every {:.1}s  last render {rendered}  #{}",
                    app.refresh_secs(),
                    app.cycles()
                ),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(status, Style::default().bold().fg(Color::Magenta)),
            Span::raw(" "),
        ]));

    f.render_widget(block, area);
}

fn draw_waiting(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Temperature & Humidity (MQTT live) ");
    let p = Paragraph::new("Waiting for first sensor data…")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

fn draw_chart(f: &mut Frame, area: Rect, snap: &WindowSnapshot) {
    let Some(latest) = snap.latest() else {
        draw_waiting(f, area);
        return;
    };

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(HUM_COLUMN)])
        .split(area);

    let temp_range = scale::padded_range(snap.temperature_range().unwrap_or_default(), 0.1, 1.0);
    let hum_range = scale::padded_range(snap.humidity_range().unwrap_or_default(), 0.1, 2.0);

    let xs = scale::elapsed_secs(&snap.timestamps);
    let x_max = xs.last().copied().unwrap_or(0.0).max(1.0);

    let temp: Vec<(f64, f64)> = xs.iter().copied().zip(snap.temperatures.iter().copied()).collect();
    let hum: Vec<(f64, f64)> = xs
        .iter()
        .zip(&snap.humidities)
        .map(|(&x, &h)| (x, scale::rescale(h, hum_range, temp_range)))
        .collect();

    let datasets = vec![
        Dataset::default()
            .name(format!("Temperature {:.1} °C", latest.temperature()))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(TEMP_COLOR))
            .data(&temp),
        Dataset::default()
            .name(format!("Humidity {:.1} %", latest.humidity()))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(HUM_COLOR))
            .data(&hum),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(TEMP_COLOR).bold())
            .data(&temp),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(HUM_COLOR).bold())
            .data(&hum),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Temperature & Humidity (MQTT live) "),
        )
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
        .x_axis(
            Axis::default()
                .title("Time")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(
                    scale::time_labels(&snap.timestamps)
                        .into_iter()
                        .map(Line::from)
                        .collect::<Vec<_>>(),
                ),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("°C", Style::default().fg(TEMP_COLOR)))
                .style(Style::default().fg(TEMP_COLOR))
                .bounds(temp_range.bounds())
                .labels(
                    temp_range
                        .ticks(3)
                        .into_iter()
                        .map(|v| Line::from(format!("{v:.1}")))
                        .collect::<Vec<_>>(),
                ),
        );

    f.render_widget(chart, cols[0]);
    draw_humidity_axis(f, cols[1], hum_range);
}

/// Secondary y axis: humidity labels aligned with the chart's plot rows.
fn draw_humidity_axis(f: &mut Frame, area: Rect, range: AxisRange) {
    let height = area.height as usize;
    let mut lines = vec![Line::from(""); height];
    let style = Style::default().fg(HUM_COLOR);

    if let Some(first) = lines.first_mut() {
        *first = Line::from(Span::styled("%RH", style.bold()));
    }
    // Row 0 is the chart's top border; the last three rows belong to the
    // x axis and bottom border.
    let top = 1;
    let bottom = height.saturating_sub(4);
    if bottom > top {
        let mid = (top + bottom) / 2;
        for (row, value) in [(top, range.max), (mid, (range.min + range.max) / 2.0), (bottom, range.min)] {
            lines[row] = Line::from(Span::styled(format!("{value:.1}"), style));
        }
    }

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Right), area);
}

fn draw_diagnostics(f: &mut Frame, area: Rect, app: &App) {
    let s = app.stats();
    let mut lines = vec![Line::from(vec![
        Span::styled(" received ", Style::default().fg(Color::DarkGray)),
        Span::raw(s.received.to_string()),
        Span::styled("  accepted ", Style::default().fg(Color::DarkGray)),
        Span::styled(s.accepted.to_string(), Style::default().fg(Color::Green)),
        Span::styled("  malformed ", Style::default().fg(Color::DarkGray)),
        Span::styled(s.malformed.to_string(), Style::default().fg(Color::Yellow)),
        Span::styled("  incomplete ", Style::default().fg(Color::DarkGray)),
        Span::styled(s.incomplete.to_string(), Style::default().fg(Color::Yellow)),
        Span::styled("  dropped ", Style::default().fg(Color::DarkGray)),
        Span::styled(s.dropped.to_string(), Style::default().fg(Color::Red)),
    ])];

    let room = area.height.saturating_sub(3) as usize;
    lines.extend(
        app.log_lines(room)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::DarkGray)))),
    );

    let block = Block::default().borders(Borders::ALL).title(" Ingest ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(" q/Esc: quit   p: pause   +/-: refresh rate   r: render now")
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

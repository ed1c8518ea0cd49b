//! Live meter screen.
//!
//! Draws the current session snapshot each redraw: level readout and bar,
//! waveform, spectrum bars and the loudness history with the alert line.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Chart, Dataset, Gauge, GraphType, Paragraph, Widget},
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::theme;
use crate::config::ColorMode;
use crate::meter::{progress_width, Threshold, DB_MAX};
use crate::session::{SessionState, Snapshot};

/// Visual gain applied to waveform samples.
const WAVEFORM_AMPLIFICATION: f64 = 2.5;
/// Upper bound on spectrum bars regardless of terminal width.
const MAX_FREQUENCY_BARS: usize = 128;
/// Colour bands the gradient waveform is split into.
const WAVEFORM_SEGMENTS: usize = 5;

/// Operator input during metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterCommand {
    /// No key, or a key without a binding
    Continue,
    /// Start or stop acquisition (Space / Enter)
    ToggleRecording,
    /// Raise the alert threshold by 1 dB (Up / +)
    ThresholdUp,
    /// Lower the alert threshold by 1 dB (Down / -)
    ThresholdDown,
    /// Re-enumerate and select the next input device (Tab)
    NextDevice,
    /// Switch between flat and gradient colours (c)
    ToggleColorMode,
    /// Leave the meter (q / Esc / Ctrl+C)
    Quit,
}

/// Everything the screen needs for one redraw.
pub struct MeterView<'a> {
    pub snapshot: Snapshot<'a>,
    pub threshold: Threshold,
    pub color_mode: ColorMode,
    pub device_label: &'a str,
    /// Width of the history chart in seconds
    pub history_window_secs: f64,
    /// Transient message shown in the footer
    pub notice: Option<&'a str>,
}

/// Terminal owner for the meter screen.
pub struct MeterTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl MeterTui {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If raw mode or the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn draw(&mut self, view: &MeterView<'_>) -> anyhow::Result<()> {
        self.terminal.draw(|frame| render(frame, view))?;
        Ok(())
    }

    /// Waits up to `timeout` for a key and maps it to a command.
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<MeterCommand> {
        if !event::poll(timeout)? {
            return Ok(MeterCommand::Continue);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(MeterCommand::Continue);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(MeterCommand::Continue);
        }

        let command = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => MeterCommand::Quit,
            KeyCode::Char('q') | KeyCode::Esc => MeterCommand::Quit,
            KeyCode::Char(' ') | KeyCode::Enter => MeterCommand::ToggleRecording,
            KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('k') => MeterCommand::ThresholdUp,
            KeyCode::Down | KeyCode::Char('-') | KeyCode::Char('j') => MeterCommand::ThresholdDown,
            KeyCode::Tab => MeterCommand::NextDevice,
            KeyCode::Char('c') => MeterCommand::ToggleColorMode,
            _ => MeterCommand::Continue,
        };
        if command != MeterCommand::Continue {
            tracing::debug!("Key {:?} -> {:?}", key.code, command);
        }
        Ok(command)
    }

    /// Restores the terminal. Safe to call more than once.
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for MeterTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Lays out and draws one frame.
pub fn render(frame: &mut Frame, view: &MeterView<'_>) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(theme::BACKGROUND)), area);

    let [level_area, wave_area, spectrum_area, history_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(2),
        Constraint::Length(6),
        Constraint::Fill(3),
        Constraint::Length(2),
    ])
    .areas(area);

    render_level(frame, level_area, view);
    render_waveform(frame, wave_area, view);
    frame.render_widget(
        SpectrumBars {
            bins: view.snapshot.frequency,
            mode: view.color_mode,
        },
        spectrum_area,
    );
    render_history(frame, history_area, view);
    render_footer(frame, footer_area, view);
}

fn render_level(frame: &mut Frame, area: Rect, view: &MeterView<'_>) {
    let decibels = view.snapshot.decibels;
    let alert = view.snapshot.is_recording && view.threshold.is_exceeded_by(decibels);
    let bar_color = if alert { theme::ALERT } else { theme::ACCENT };

    let [readout_area, gauge_area] =
        Layout::horizontal([Constraint::Length(14), Constraint::Fill(1)]).areas(area);

    let readout_style = if alert {
        Style::default().fg(Color::White).bg(theme::ALERT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme::FOREGROUND).add_modifier(Modifier::BOLD)
    };
    let readout = Paragraph::new(Line::from(Span::styled(format!("{decibels:>6.1} dB"), readout_style)))
        .block(Block::bordered().border_style(Style::default().fg(theme::DIM)));
    frame.render_widget(readout, readout_area);

    let gauge = Gauge::default()
        .block(Block::bordered().border_style(Style::default().fg(theme::DIM)))
        .gauge_style(Style::default().fg(bar_color).bg(theme::BACKGROUND))
        .ratio(f64::from(progress_width(decibels)) / 100.0)
        .label(format!("{:.0}%", progress_width(decibels)));
    frame.render_widget(gauge, gauge_area);
}

fn render_waveform(frame: &mut Frame, area: Rect, view: &MeterView<'_>) {
    let block = Block::bordered()
        .title(" waveform ")
        .border_style(Style::default().fg(theme::DIM));

    let samples = view.snapshot.waveform;
    if !view.snapshot.is_recording || samples.is_empty() {
        let flat = [(0.0, 0.0), (1.0, 0.0)];
        let chart = Chart::new(vec![Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::IDLE_LINE))
            .data(&flat)])
        .block(block)
        .x_axis(Axis::default().bounds([0.0, 1.0]))
        .y_axis(Axis::default().bounds([-1.0, 1.0]));
        frame.render_widget(chart, area);
        return;
    }

    let last = (samples.len() - 1).max(1) as f64;
    let points: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let y = (f64::from(s) * WAVEFORM_AMPLIFICATION).clamp(-1.0, 1.0);
            (i as f64 / last, y)
        })
        .collect();
    let mirrored: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x, -y)).collect();

    let segments = match view.color_mode {
        ColorMode::Default => 1,
        ColorMode::Gradient => WAVEFORM_SEGMENTS,
    };
    let segment_len = points.len().div_ceil(segments);

    let mut datasets = Vec::with_capacity(segments * 2);
    for (index, (upper, lower)) in points
        .chunks(segment_len)
        .zip(mirrored.chunks(segment_len))
        .enumerate()
    {
        let t = (index as f32 + 0.5) / segments as f32;
        let style = Style::default().fg(theme::waveform_color(view.color_mode, t));
        for data in [upper, lower] {
            datasets.push(
                Dataset::default()
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(style)
                    .data(data),
            );
        }
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(Axis::default().bounds([0.0, 1.0]))
        .y_axis(Axis::default().bounds([-1.0, 1.0]));
    frame.render_widget(chart, area);
}

fn render_history(frame: &mut Frame, area: Rect, view: &MeterView<'_>) {
    let window = view.history_window_secs.max(1.0);
    let history = view.snapshot.history;
    let newest = history.last().map_or(0, |p| p.timestamp);

    let points: Vec<(f64, f64)> = history
        .iter()
        .map(|p| {
            let age = newest.saturating_sub(p.timestamp) as f64 / 1000.0;
            (-age, f64::from(p.value))
        })
        .filter(|&(x, _)| x >= -window)
        .collect();
    let threshold = f64::from(view.threshold.value());
    let threshold_line = [(-window, threshold), (0.0, threshold)];

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::ALERT))
            .data(&threshold_line),
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::FOREGROUND))
            .data(&points),
    ];

    let label_style = Style::default().fg(theme::DIM);
    let chart = Chart::new(datasets)
        .block(
            Block::bordered()
                .title(" sound level history ")
                .border_style(Style::default().fg(theme::DIM)),
        )
        .x_axis(
            Axis::default()
                .bounds([-window, 0.0])
                .style(label_style)
                .labels([format!("-{window:.0}s"), "now".to_string()]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, f64::from(DB_MAX)])
                .style(label_style)
                .labels(["0", "60", "120"]),
        );
    frame.render_widget(chart, area);
}

fn render_footer(frame: &mut Frame, area: Rect, view: &MeterView<'_>) {
    let snapshot = &view.snapshot;
    let indicator = match snapshot.state {
        SessionState::Active => Span::styled("● ", Style::default().fg(Color::Red)),
        SessionState::Idle => Span::styled("■ ", Style::default().fg(theme::DIM)),
        SessionState::Error => Span::styled("✖ ", Style::default().fg(theme::ALERT)),
    };

    let status = Line::from(vec![
        indicator,
        Span::raw(format!("{} ", snapshot.state)),
        Span::styled(view.device_label.to_string(), Style::default().fg(theme::ACCENT)),
        Span::raw(format!(
            " / alert > {:.0} dB / {} colours",
            view.threshold.value(),
            view.color_mode
        )),
    ]);

    let detail = match (snapshot.error, view.notice) {
        (Some(error), _) => Line::from(Span::styled(error.to_string(), Style::default().fg(theme::ALERT))),
        (None, Some(notice)) => Line::from(Span::raw(notice.to_string())),
        (None, None) => Line::from(Span::styled(
            "space start/stop  ↑↓ threshold  tab device  c colours  q quit",
            Style::default().fg(theme::DIM),
        )),
    };

    let footer = Paragraph::new(vec![status, detail])
        .style(Style::default().fg(theme::ACCENT).bg(theme::BACKGROUND));
    frame.render_widget(footer, area);
}

/// Vertical bars for the byte spectrum, one column per bar.
struct SpectrumBars<'a> {
    bins: &'a [u8],
    mode: ColorMode,
}

impl Widget for SpectrumBars<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        const EIGHTHS: [&str; 9] = [" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

        if area.width == 0 || area.height == 0 || self.bins.is_empty() {
            return;
        }

        let bar_count = self.bins.len().min(MAX_FREQUENCY_BARS).min(usize::from(area.width));
        let column_width = (usize::from(area.width) / bar_count).max(1);

        for bar in 0..bar_count {
            let index = bar * self.bins.len() / bar_count;
            let value = f32::from(self.bins[index]) / 255.0;
            let mut eighths = (value * f32::from(area.height) * 8.0).round() as usize;
            let style = Style::default().fg(theme::bar_color(self.mode, bar, bar_count));

            for row in (0..area.height).rev() {
                let symbol = EIGHTHS[eighths.min(8)];
                eighths = eighths.saturating_sub(8);
                for dx in 0..column_width {
                    let x = area.x + (bar * column_width + dx) as u16;
                    if x < area.right() {
                        buf.set_string(x, area.y + row, symbol, style);
                    }
                }
            }
        }
    }
}

//! Full-screen error display for failures that stop micmeter before metering.

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

use super::theme;

/// Red screen with a centered message, dismissed by any key.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl ErrorScreen {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    /// Shows `title` and `message` until a key is pressed.
    ///
    /// # Errors
    /// - If rendering or event polling fails
    pub fn show_error(&mut self, title: &str, message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| render_error(frame, title, message))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }
        Ok(())
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

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows an error screen, logging instead if the terminal is unusable.
pub fn report_fatal(title: &str, message: &str) {
    let shown = ErrorScreen::new().and_then(|mut screen| {
        screen.show_error(title, message)?;
        screen.cleanup()
    });
    if let Err(e) = shown {
        tracing::warn!("Could not display error screen: {}", e);
        eprintln!("{title}: {message}");
    }
}

fn render_error(frame: &mut Frame, title: &str, message: &str) {
    let area = frame.area();
    let style = Style::default().fg(Color::White).bg(theme::ALERT);
    frame.render_widget(Block::default().style(style), area);

    let width = area.width * 8 / 10;
    let text_area = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + area.height / 3,
        width,
        height: area.height - area.height / 3,
    };

    let text = vec![
        Line::from(Span::styled(title.to_string(), style.add_modifier(Modifier::BOLD))),
        Line::raw(""),
        Line::raw(message.to_string()),
        Line::raw(""),
        Line::raw("Press any key to close"),
    ];
    let paragraph = Paragraph::new(text)
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, text_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn renders_title_and_message() {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|frame| render_error(frame, "Configuration Error", "bad threshold"))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Configuration Error"));
        assert!(text.contains("bad threshold"));
    }
}

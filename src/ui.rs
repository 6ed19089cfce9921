use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    metrics,
    session::{CharState, CompletionRecord},
    App, Screen,
};

const HORIZONTAL_MARGIN: u16 = 5;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Typing => render_typing(self, area, buf),
            Screen::Results => render_results(self, area, buf),
        }
    }
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let orange_bold_style = Style::default().patch(bold_style).fg(Color::Rgb(255, 165, 0));
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);

    let session = &app.session;
    let reference: String = session.reference().iter().collect();

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let mut prompt_occupied_lines =
        ((reference.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;
    if reference.width() <= max_chars_per_line as usize {
        prompt_occupied_lines = 1;
    }

    let banner_lines = 2;
    let stats_lines = if app.simple { 0 } else { 2 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(
                    ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
                ),
                Constraint::Length(banner_lines),
                Constraint::Length(prompt_occupied_lines),
                Constraint::Length(stats_lines),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    if session.is_locked() {
        let banner = Paragraph::new(Span::styled(
            "LOCKED - too many errors, wait for the cooldown",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center);
        banner.render(chunks[1], buf);
    }

    let typed = session.typed();
    let spans = session
        .char_states()
        .iter()
        .enumerate()
        .map(|(idx, state)| {
            let expected = session.reference()[idx].to_string();
            match state {
                CharState::Correct => Span::styled(expected, green_bold_style),
                CharState::Corrected => Span::styled(expected, orange_bold_style),
                CharState::Incorrect => Span::styled(
                    match typed[idx] {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    red_bold_style,
                ),
                CharState::Current => Span::styled(expected, underlined_dim_bold_style),
                CharState::Pending => Span::styled(expected, dim_bold_style),
            }
        })
        .collect::<Vec<Span>>();

    let widget = Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            // when the prompt is small enough to fit on one line
            // centering the text gives a nice zen feeling
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });

    widget.render(chunks[2], buf);

    if !app.simple {
        let snap = session.snapshot_at(std::time::SystemTime::now());
        let stats = Paragraph::new(Span::styled(
            format!(
                "{} wpm   {}% acc   {} err   {}%",
                snap.wpm, snap.accuracy, snap.total_errors, snap.progress_percent
            ),
            dim_bold_style,
        ))
        .alignment(Alignment::Center);
        stats.render(chunks[3], buf);
    }
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(2)
        .constraints(
            [
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let record = app
        .session
        .completion_record()
        .unwrap_or(CompletionRecord {
            wpm: 0,
            accuracy: 0,
            total_errors: 0,
            time_in_seconds: 0,
            characters_typed: 0,
        });

    let grade = metrics::grade(record.wpm, record.accuracy);
    let headline = Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   grade {}",
            record.wpm, record.accuracy, grade
        ),
        bold_style,
    ))
    .alignment(Alignment::Center);
    headline.render(chunks[1], buf);

    let detail = Paragraph::new(Span::styled(
        format!(
            "net {} wpm   {} errors   {} chars   {}",
            metrics::net_wpm(record.wpm, record.accuracy),
            record.total_errors,
            record.characters_typed,
            metrics::format_time(record.time_in_seconds)
        ),
        Style::default().fg(Color::Cyan).patch(italic_style),
    ))
    .alignment(Alignment::Center);
    detail.render(chunks[2], buf);

    let legend = Paragraph::new(Span::styled("(r)etry / (esc)ape", italic_style))
        .alignment(Alignment::Center);
    legend.render(chunks[4], buf);
}

//! Checklist for the day: header, progress gauge, key results, prompt line.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph, Wrap};

use crate::app::AppState;
use crate::theme::Theme;

pub fn draw_checklist(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let Some(goal) = &state.goal else {
        return;
    };

    let prompt_height = if state.prompt.is_active() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(prompt_height),
        ])
        .split(area);

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            goal.date.clone(),
            Style::default().fg(theme.muted),
        )),
        Line::from(Span::styled(
            goal.objective.clone(),
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        )),
    ]);
    frame.render_widget(header, chunks[0]);

    let progress = goal.progress();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(theme.accent).bg(theme.background))
        .ratio(f64::from(progress) / 100.0)
        .label(format!("{progress}% done"));
    frame.render_widget(gauge, chunks[1]);

    let mut lines = Vec::new();
    for (idx, kr) in goal.key_results.iter().enumerate() {
        let marker = if idx == state.selected { "> " } else { "  " };
        let checkbox = if kr.completed { "[x]" } else { "[ ]" };
        let mut text = format!(
            "{marker}{checkbox} KR{}: {} ({}%",
            idx + 1,
            kr.content,
            kr.weight
        );
        if let Some(time) = &kr.completion_time {
            text.push_str(&format!(", done {time}"));
        }
        text.push(')');

        let mut style = if kr.completed {
            Style::default().fg(theme.done)
        } else {
            Style::default().fg(theme.foreground)
        };
        if idx == state.selected {
            style = style.add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(Span::styled(text, style)));
    }
    if goal.key_results.is_empty() {
        lines.push(Line::from(Span::styled(
            "  no key results yet, press a to add one",
            Style::default().fg(theme.muted),
        )));
    }

    let list = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!(" key results ({}) ", goal.key_results.len()))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.muted)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(list, chunks[2]);

    if state.prompt.is_active() {
        let input = Paragraph::new(format!("{}▏", state.prompt.buffer())).block(
            Block::default()
                .title(state.prompt.title())
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.accent)),
        );
        frame.render_widget(input, chunks[3]);
    }
}

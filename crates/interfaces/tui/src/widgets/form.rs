//! Planning form: objective plus key result rows.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use crate::app::AppState;
use crate::theme::Theme;

pub fn draw_form(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let form = &state.form;
    let mut lines = Vec::new();
    lines.push(row("Objective", &form.objective, form.focus == 0, theme));
    lines.push(Line::from(""));
    for (idx, content) in form.krs.iter().enumerate() {
        let label = format!("KR {}", idx + 1);
        lines.push(row(&label, content, form.focus == idx + 1, theme));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(
            "[{}] rewrite key results on save",
            if form.use_rewriter { "x" } else { " " }
        ),
        Style::default().fg(theme.muted),
    )));

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" plan today ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn row(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'static> {
    let marker = if focused { "> " } else { "  " };
    let cursor = if focused { "▏" } else { "" };
    let style = if focused {
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.foreground)
    };
    Line::from(Span::styled(format!("{marker}{label}: {value}{cursor}"), style))
}

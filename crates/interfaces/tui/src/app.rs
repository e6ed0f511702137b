//! Application state and key handling for the two checklist screens.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;

use dayokr_config::AppConfig;
use dayokr_runtime::{NoticeLevel, ViewCommand, ViewEvent, ViewSession};
use dayokr_store::{Goal, KeyResult, KrPatch};

use crate::events::AppEvent;
use crate::theme::Theme;
use crate::widgets::{checklist, form};

const SPINNER: [&str; 4] = ["⠋", "⠙", "⠸", "⠴"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Planning a new day: objective plus key result rows.
    Form,
    /// Working through today's checklist.
    Checklist,
}

#[derive(Debug, Clone)]
pub struct FormState {
    pub objective: String,
    pub krs: Vec<String>,
    /// 0 = objective, 1..=krs.len() = key result rows.
    pub focus: usize,
    pub use_rewriter: bool,
}

impl FormState {
    fn new(use_rewriter: bool) -> Self {
        Self {
            objective: String::new(),
            krs: vec![String::new()],
            focus: 0,
            use_rewriter,
        }
    }

    fn field_count(&self) -> usize {
        1 + self.krs.len()
    }

    fn active_buffer(&mut self) -> &mut String {
        if self.focus == 0 {
            &mut self.objective
        } else {
            &mut self.krs[self.focus - 1]
        }
    }

    fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.field_count();
    }

    fn focus_prev(&mut self) {
        self.focus = if self.focus == 0 {
            self.field_count() - 1
        } else {
            self.focus - 1
        };
    }

    fn add_row(&mut self) {
        self.krs.push(String::new());
        self.focus = self.krs.len();
    }

    // The form always keeps one row; validation catches empty content.
    fn remove_focused_row(&mut self) {
        if self.focus == 0 || self.krs.len() <= 1 {
            return;
        }
        self.krs.remove(self.focus - 1);
        self.focus = self.focus.min(self.field_count() - 1);
    }
}

/// Bottom-line input on the checklist screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    None,
    AddKr { buffer: String },
    EditContent { index: usize, buffer: String },
    EditWeight { index: usize, buffer: String },
    ArchiveTotal { buffer: String },
    ArchiveRange { total: String, buffer: String },
}

impl Prompt {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::None => "",
            Prompt::AddKr { .. } => " new key result ",
            Prompt::EditContent { .. } => " edit content ",
            Prompt::EditWeight { .. } => " weight (0-100) ",
            Prompt::ArchiveTotal { .. } => " total time (e.g. 6h) ",
            Prompt::ArchiveRange { .. } => " time range (e.g. 09:00-18:00) ",
        }
    }

    pub fn buffer(&self) -> &str {
        match self {
            Prompt::None => "",
            Prompt::AddKr { buffer }
            | Prompt::EditContent { buffer, .. }
            | Prompt::EditWeight { buffer, .. }
            | Prompt::ArchiveTotal { buffer }
            | Prompt::ArchiveRange { buffer, .. } => buffer,
        }
    }

    fn buffer_mut(&mut self) -> Option<&mut String> {
        match self {
            Prompt::None => None,
            Prompt::AddKr { buffer }
            | Prompt::EditContent { buffer, .. }
            | Prompt::EditWeight { buffer, .. }
            | Prompt::ArchiveTotal { buffer }
            | Prompt::ArchiveRange { buffer, .. } => Some(buffer),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Prompt::None)
    }
}

pub struct AppState {
    pub screen: Screen,
    pub goal: Option<Goal>,
    pub form: FormState,
    pub prompt: Prompt,
    pub selected: usize,
    pub status: String,
    pub status_is_warning: bool,
    pub rewriting: bool,
    pub spinner_frame: usize,
}

pub struct App {
    /// Receive side of the controller protocol.  A public field so the
    /// event loop can select on it without borrowing the whole app.
    pub session: ViewSession,
    pub state: AppState,
    pub theme: Theme,
    tick: Duration,
    should_quit: bool,
}

impl App {
    pub fn new(session: ViewSession, config: &AppConfig) -> Self {
        Self {
            session,
            state: AppState {
                screen: Screen::Form,
                goal: None,
                form: FormState::new(config.rewrite_by_default()),
                prompt: Prompt::None,
                selected: 0,
                status: "loading today's goal".to_string(),
                status_is_warning: false,
                rewriting: false,
                spinner_frame: 0,
            },
            theme: Theme::from_config(&config.ui.theme),
            tick: Duration::from_millis(config.ui.tick_ms.max(16)),
            should_quit: false,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.state.status = status.into();
        self.state.status_is_warning = false;
    }

    fn warn_status(&mut self, status: impl Into<String>) {
        self.state.status = status.into();
        self.state.status_is_warning = true;
    }

    /// Advance the state machine.  A returned command must be forwarded to
    /// the controller by the caller.
    pub fn update(&mut self, event: AppEvent) -> Option<ViewCommand> {
        match event {
            AppEvent::Tick => {
                if self.state.rewriting {
                    self.state.spinner_frame = (self.state.spinner_frame + 1) % SPINNER.len();
                }
                None
            }
            AppEvent::Resize(_, _) => None,
            AppEvent::Controller(event) => {
                self.apply_push(event);
                None
            }
            AppEvent::Key(key) => self.handle_key(key),
        }
    }

    fn apply_push(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::State { goal } => match goal {
                Some(goal) => {
                    self.state.selected = self
                        .state
                        .selected
                        .min(goal.key_results.len().saturating_sub(1));
                    self.state.goal = Some(goal);
                    self.state.screen = Screen::Checklist;
                }
                None => {
                    self.state.goal = None;
                    self.state.screen = Screen::Form;
                    self.set_status("no goal for today yet, plan one");
                }
            },
            ViewEvent::Saved => self.set_status("goal saved"),
            ViewEvent::Notice { level, message } => match level {
                NoticeLevel::Info => self.set_status(message),
                NoticeLevel::Warning => self.warn_status(message),
            },
            ViewEvent::Error { message } => self.warn_status(message),
            ViewEvent::RewriteStarted => {
                self.state.rewriting = true;
                self.set_status("rewriting key results");
            }
            ViewEvent::RewriteFinished => self.state.rewriting = false,
            ViewEvent::Closed => self.should_quit = true,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<ViewCommand> {
        match self.state.screen {
            Screen::Form => self.handle_form_key(key),
            Screen::Checklist if self.state.prompt.is_active() => self.handle_prompt_key(key),
            Screen::Checklist => self.handle_checklist_key(key),
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Option<ViewCommand> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(ViewCommand::Cancel),
            KeyCode::Char('s') if ctrl => self.submit_form(),
            KeyCode::Char('n') if ctrl => {
                self.state.form.add_row();
                None
            }
            KeyCode::Char('d') if ctrl => {
                self.state.form.remove_focused_row();
                None
            }
            KeyCode::Char('r') if ctrl => {
                self.state.form.use_rewriter = !self.state.form.use_rewriter;
                None
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Enter => {
                self.state.form.focus_next();
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.state.form.focus_prev();
                None
            }
            KeyCode::Backspace => {
                self.state.form.active_buffer().pop();
                None
            }
            KeyCode::Char(ch) if !ctrl => {
                self.state.form.active_buffer().push(ch);
                None
            }
            _ => None,
        }
    }

    fn submit_form(&mut self) -> Option<ViewCommand> {
        let form = &self.state.form;
        // Weights start at zero; the store rebalances them on create.
        let key_results = form
            .krs
            .iter()
            .map(|content| KeyResult::new(content.trim(), 0))
            .collect();
        Some(ViewCommand::Save {
            objective: form.objective.trim().to_string(),
            key_results,
            use_rewriter: form.use_rewriter,
        })
    }

    fn handle_checklist_key(&mut self, key: KeyEvent) -> Option<ViewCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return None;
        }
        let len = self
            .state
            .goal
            .as_ref()
            .map_or(0, |goal| goal.key_results.len());
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(ViewCommand::Cancel),
            KeyCode::Up | KeyCode::Char('k') => {
                self.state.selected = self.state.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.state.selected + 1 < len {
                    self.state.selected += 1;
                }
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('a') => {
                self.state.prompt = Prompt::AddKr {
                    buffer: String::new(),
                };
                None
            }
            KeyCode::Char('e') => {
                let buffer = self.selected_kr()?.content.clone();
                self.state.prompt = Prompt::EditContent {
                    index: self.state.selected,
                    buffer,
                };
                None
            }
            KeyCode::Char('w') => {
                let buffer = self.selected_kr()?.weight.to_string();
                self.state.prompt = Prompt::EditWeight {
                    index: self.state.selected,
                    buffer,
                };
                None
            }
            KeyCode::Char('d') => (len > 0).then_some(ViewCommand::DeleteKr {
                index: self.state.selected,
            }),
            KeyCode::Char('K') => self.reorder(-1),
            KeyCode::Char('J') => self.reorder(1),
            KeyCode::Char('r') => Some(ViewCommand::Refresh),
            KeyCode::Char('f') => {
                self.state.prompt = Prompt::ArchiveTotal {
                    buffer: String::new(),
                };
                None
            }
            _ => None,
        }
    }

    fn selected_kr(&self) -> Option<&KeyResult> {
        self.state.goal.as_ref()?.key_results.get(self.state.selected)
    }

    fn toggle_selected(&mut self) -> Option<ViewCommand> {
        let index = self.state.selected;
        let kr = self.selected_kr()?;
        // No stamp here: the store stamps on complete and clears on undo.
        Some(ViewCommand::UpdateKr {
            index,
            patch: KrPatch {
                content: kr.content.clone(),
                weight: kr.weight,
                completed: !kr.completed,
                completion_time: None,
            },
        })
    }

    fn reorder(&mut self, delta: isize) -> Option<ViewCommand> {
        let len = self
            .state
            .goal
            .as_ref()
            .map_or(0, |goal| goal.key_results.len());
        if len < 2 {
            return None;
        }
        let from = self.state.selected;
        let to = from.checked_add_signed(delta)?;
        if to >= len {
            return None;
        }
        // Selection follows the moved entry.
        self.state.selected = to;
        Some(ViewCommand::ReorderKr { from, to })
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Option<ViewCommand> {
        match key.code {
            KeyCode::Esc => {
                self.state.prompt = Prompt::None;
                None
            }
            KeyCode::Enter => self.commit_prompt(),
            KeyCode::Backspace => {
                if let Some(buffer) = self.state.prompt.buffer_mut() {
                    buffer.pop();
                }
                None
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(buffer) = self.state.prompt.buffer_mut() {
                    buffer.push(ch);
                }
                None
            }
            _ => None,
        }
    }

    fn commit_prompt(&mut self) -> Option<ViewCommand> {
        let prompt = std::mem::replace(&mut self.state.prompt, Prompt::None);
        match prompt {
            Prompt::None => None,
            Prompt::AddKr { buffer } => {
                let content = buffer.trim().to_string();
                if content.is_empty() {
                    return None;
                }
                Some(ViewCommand::AddKr { content })
            }
            Prompt::EditContent { index, buffer } => {
                let content = buffer.trim().to_string();
                if content.is_empty() {
                    return None;
                }
                let kr = self.state.goal.as_ref()?.key_results.get(index)?;
                Some(ViewCommand::UpdateKr {
                    index,
                    patch: KrPatch {
                        content,
                        weight: kr.weight,
                        completed: kr.completed,
                        completion_time: kr.completion_time.clone(),
                    },
                })
            }
            Prompt::EditWeight { index, buffer } => {
                let weight = match buffer.trim().parse::<u8>() {
                    Ok(weight) if weight <= 100 => weight,
                    _ => {
                        self.warn_status("weight must be a whole number from 0 to 100");
                        self.state.prompt = Prompt::EditWeight { index, buffer };
                        return None;
                    }
                };
                let kr = self.state.goal.as_ref()?.key_results.get(index)?;
                Some(ViewCommand::UpdateKr {
                    index,
                    patch: KrPatch {
                        content: kr.content.clone(),
                        weight,
                        completed: kr.completed,
                        completion_time: kr.completion_time.clone(),
                    },
                })
            }
            Prompt::ArchiveTotal { buffer } => {
                self.state.prompt = Prompt::ArchiveRange {
                    total: buffer.trim().to_string(),
                    buffer: String::new(),
                };
                None
            }
            Prompt::ArchiveRange { total, buffer } => Some(ViewCommand::SaveLog {
                total_time: total,
                time_range: buffer.trim().to_string(),
            }),
        }
    }

    pub fn draw(&self, frame: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        match self.state.screen {
            Screen::Form => form::draw_form(frame, chunks[0], &self.state, &self.theme),
            Screen::Checklist => {
                checklist::draw_checklist(frame, chunks[0], &self.state, &self.theme);
            }
        }

        let status = if self.state.rewriting {
            format!("{} {}", SPINNER[self.state.spinner_frame], self.state.status)
        } else {
            self.state.status.clone()
        };
        let status_style = if self.state.status_is_warning {
            Style::default().fg(self.theme.warn)
        } else {
            Style::default().fg(self.theme.foreground)
        };
        frame.render_widget(Paragraph::new(status).style(status_style), chunks[1]);

        let hints = match self.state.screen {
            Screen::Form => {
                "Tab=next field  Ctrl+N=add KR  Ctrl+D=remove KR  Ctrl+R=rewrite toggle  Ctrl+S=save  Esc=quit"
            }
            Screen::Checklist if self.state.prompt.is_active() => "Enter=confirm  Esc=dismiss",
            Screen::Checklist => {
                "Space=toggle  a=add  e=edit  w=weight  d=delete  J/K=move  r=refresh  f=finish day  q=quit"
            }
        };
        frame.render_widget(
            Paragraph::new(Line::from(hints)).style(Style::default().fg(self.theme.muted)),
            chunks[2],
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dayokr_runtime::{Controller, ControllerHandle};
    use tempfile::TempDir;

    fn test_app(dir: &TempDir) -> (App, ControllerHandle) {
        let mut config = AppConfig::default();
        config.workspace.path = dir.path().display().to_string();
        let (controller, handle) = Controller::from_config(&config);
        tokio::spawn(controller.run());
        let app = App::new(handle.attach_view(), &config);
        (app, handle)
    }

    fn sample_goal() -> Goal {
        Goal {
            date: "2025-06-01".to_string(),
            objective: "ship the report".to_string(),
            key_results: vec![
                KeyResult::new("write draft", 33),
                KeyResult::new("review", 33),
                KeyResult::new("publish", 34),
            ],
        }
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl_key(ch: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    #[tokio::test]
    async fn state_push_with_goal_shows_checklist() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);

        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        assert_eq!(app.state.screen, Screen::Checklist);
        assert!(app.state.goal.is_some());
    }

    #[tokio::test]
    async fn state_push_without_goal_shows_form() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);

        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));
        app.update(AppEvent::Controller(ViewEvent::State { goal: None }));

        assert_eq!(app.state.screen, Screen::Form);
        assert!(app.state.goal.is_none());
    }

    #[tokio::test]
    async fn space_toggles_the_selected_kr() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        app.update(key(KeyCode::Down));
        let command = app.update(key(KeyCode::Char(' ')));

        match command {
            Some(ViewCommand::UpdateKr { index, patch }) => {
                assert_eq!(index, 1);
                assert_eq!(patch.content, "review");
                assert!(patch.completed);
                assert!(patch.completion_time.is_none());
            }
            other => panic!("expected update command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn form_typing_and_save() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);

        for ch in "plan".chars() {
            app.update(key(KeyCode::Char(ch)));
        }
        app.update(key(KeyCode::Tab));
        for ch in "draft".chars() {
            app.update(key(KeyCode::Char(ch)));
        }
        app.update(ctrl_key('n'));
        for ch in "review".chars() {
            app.update(key(KeyCode::Char(ch)));
        }

        let command = app.update(ctrl_key('s'));
        match command {
            Some(ViewCommand::Save {
                objective,
                key_results,
                use_rewriter,
            }) => {
                assert_eq!(objective, "plan");
                let contents: Vec<&str> =
                    key_results.iter().map(|kr| kr.content.as_str()).collect();
                assert_eq!(contents, vec!["draft", "review"]);
                assert!(key_results.iter().all(|kr| kr.weight == 0));
                assert!(!use_rewriter);
            }
            other => panic!("expected save command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rewrite_toggle_flips_the_flag() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);

        assert!(!app.state.form.use_rewriter);
        app.update(ctrl_key('r'));
        assert!(app.state.form.use_rewriter);
    }

    #[tokio::test]
    async fn add_prompt_produces_add_kr() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        app.update(key(KeyCode::Char('a')));
        assert!(app.state.prompt.is_active());
        for ch in "ship it".chars() {
            app.update(key(KeyCode::Char(ch)));
        }
        let command = app.update(key(KeyCode::Enter));

        assert_eq!(
            command,
            Some(ViewCommand::AddKr {
                content: "ship it".to_string()
            })
        );
        assert!(!app.state.prompt.is_active());
    }

    #[tokio::test]
    async fn blank_add_prompt_is_dismissed() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        app.update(key(KeyCode::Char('a')));
        let command = app.update(key(KeyCode::Enter));

        assert!(command.is_none());
        assert!(!app.state.prompt.is_active());
    }

    #[tokio::test]
    async fn weight_prompt_rejects_bad_numbers() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        app.update(key(KeyCode::Char('w')));
        app.update(key(KeyCode::Backspace));
        app.update(key(KeyCode::Backspace));
        for ch in "999".chars() {
            app.update(key(KeyCode::Char(ch)));
        }
        let command = app.update(key(KeyCode::Enter));

        assert!(command.is_none());
        assert!(app.state.prompt.is_active());
        assert!(app.state.status_is_warning);
    }

    #[tokio::test]
    async fn reorder_clamps_at_the_edges() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));

        assert!(app.update(key(KeyCode::Char('K'))).is_none());
        assert_eq!(
            app.update(key(KeyCode::Char('J'))),
            Some(ViewCommand::ReorderKr { from: 0, to: 1 })
        );
        assert_eq!(app.state.selected, 1);
    }

    #[tokio::test]
    async fn closed_event_sets_quit() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);

        app.update(AppEvent::Controller(ViewEvent::Closed));
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn selection_is_clamped_when_krs_shrink() {
        let dir = TempDir::new().unwrap();
        let (mut app, _handle) = test_app(&dir);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(sample_goal()),
        }));
        app.update(key(KeyCode::Down));
        app.update(key(KeyCode::Down));
        assert_eq!(app.state.selected, 2);

        let mut shrunk = sample_goal();
        shrunk.key_results.truncate(1);
        app.update(AppEvent::Controller(ViewEvent::State {
            goal: Some(shrunk),
        }));

        assert_eq!(app.state.selected, 0);
    }
}

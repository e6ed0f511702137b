//! Terminal lifecycle and the main event loop.

use std::future::Future;
use std::io;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;
use tracing::debug;

use dayokr_runtime::ViewCommand;

use crate::app::App;
use crate::events::AppEvent;

/// Read crossterm events on a dedicated OS thread so the async loop never
/// blocks in synchronous `event::poll()`.
fn spawn_crossterm_reader() -> mpsc::UnboundedReceiver<CrosstermEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while let Ok(ev) = event::read() {
            if tx.send(ev).is_err() {
                break;
            }
        }
    });
    rx
}

/// Drive the app until it quits, forwarding every command it emits through
/// `on_command`.
pub async fn run_app_with<F, Fut>(app: &mut App, mut on_command: F) -> Result<()>
where
    F: FnMut(ViewCommand) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut tick_interval = tokio::time::interval(app.tick_interval());
    // The first tick fires immediately; skip it.
    tick_interval.tick().await;
    let mut term_rx = spawn_crossterm_reader();

    let result = async {
        loop {
            terminal.draw(|frame| app.draw(frame))?;

            tokio::select! {
                pushed = app.session.recv() => {
                    let Some(pushed) = pushed else {
                        // Controller gone, nothing more will arrive.
                        break;
                    };
                    app.update(AppEvent::Controller(pushed));
                    if app.should_quit() {
                        break;
                    }
                }
                _ = tick_interval.tick() => {
                    app.update(AppEvent::Tick);
                }
                term_event = term_rx.recv() => {
                    match term_event {
                        Some(CrosstermEvent::Key(key)) => {
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if key.code == KeyCode::Char('c')
                                && key.modifiers.contains(KeyModifiers::CONTROL)
                            {
                                break;
                            }
                            if let Some(command) = app.update(AppEvent::Key(key)) {
                                let closing = matches!(command, ViewCommand::Cancel);
                                on_command(command).await?;
                                if closing {
                                    break;
                                }
                            }
                        }
                        Some(CrosstermEvent::Resize(width, height)) => {
                            app.update(AppEvent::Resize(width, height));
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    debug!("restoring terminal state");
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

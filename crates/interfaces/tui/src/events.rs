use crossterm::event::KeyEvent;

use dayokr_runtime::ViewEvent;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Controller(ViewEvent),
    Tick,
    Resize(u16, u16),
}

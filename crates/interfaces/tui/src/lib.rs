//! Terminal front end for the daily goal checklist.

pub mod app;
pub mod events;
pub mod theme;
pub mod tui;
pub mod widgets;

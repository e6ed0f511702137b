mod commands;
mod controller;
mod events;

pub use commands::ViewCommand;
pub use controller::{Controller, ControllerHandle, ViewSession, rewriter_settings};
pub use events::{NoticeLevel, ViewEvent};

pub mod checklist;
pub mod form;

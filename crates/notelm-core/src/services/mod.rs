//! Async service handles shared between clients.

mod notes;

pub use notes::NoteService;

//! notelm-core - Core library for NoteLM
//!
//! This crate contains the note models, durable local storage, the document
//! store, remote channel implementations, and the sync engine used by all
//! NoteLM interfaces.

pub mod clock;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId, NotePatch};
pub use services::NoteService;

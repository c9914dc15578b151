pub mod add;
pub mod attach;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod search;
pub mod select;
pub mod settings;
pub mod show;
pub mod source;
pub mod sync;
pub mod tag;

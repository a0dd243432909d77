pub mod common;
pub mod completions;
pub mod config;
pub mod export;
pub mod list;
pub mod search;
pub mod status;
pub mod sync;

//! Command surface shared by clients.

mod mirror;

pub use mirror::{ExportSelection, MirrorService};

//! Request handlers for the BooServer protocol verbs.

pub mod api;
pub mod range;
pub mod streaming;

pub use api::{capability, categories, chapter, check, current_get, current_put, list, nop};
pub use streaming::{audio, item, photo, video};

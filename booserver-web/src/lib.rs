//! BooServer Web - HTTP front-end
//!
//! Serves the indexed media library over the BooServer protocol: capability
//! and freshness checks, filtered listings, and byte-range streaming of the
//! media files themselves.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{router, run_server, AppState};

//! Request handler module
//!
//! Routes requests to the default document or the static file flow.

pub mod loader;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;

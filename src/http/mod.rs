//! HTTP protocol layer module
//!
//! Content-type lookup, cache validation, and response builders,
//! decoupled from request routing.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_405_response, build_error_response, build_html_response, build_negotiated_response,
};

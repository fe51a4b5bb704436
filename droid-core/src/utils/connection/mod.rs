//! Module Exports
//!
//! # Modules
//! - `server`: control panel routes and form handling.
//! - `stream`: the MJPEG video feed.

/// Module for the HTTP control server, including routes and form validation.
pub mod server;
pub mod stream;

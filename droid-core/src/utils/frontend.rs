//! Control panel assets served by the HTTP server.

pub const HTML: &str = include_str!("frontend/index.html");
pub const CSS: &str = include_str!("frontend/style.css");
pub const JAVA: &str = include_str!("frontend/script.js");

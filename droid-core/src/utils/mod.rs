//! Utility re-exports and helper macros for the droid.
//!
//! - `connection`: HTTP control panel and MJPEG video feed
//! - `controllers`: drive, head, and audio owners plus their actuators
//! - `math`: stick shaping, differential mixing, and tracking steps
//! - `vision`: camera frames, detections, and the autopilot
//! - `lifecycle`: run flag, operator switches, and shutdown
//! - `config`: runtime configuration
//! - `frontend`: HTML/CSS/JS assets for the web UI
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod connection;
pub mod controllers;
pub(crate) mod frontend;
pub mod lifecycle;
pub mod math;
pub mod vision;

pub use config::DroidConfig;
pub use connection::server::run as http;
pub use embassy_time::*;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// Creates a `static_cell::StaticCell` for type `$t`, initializes it with
/// `$val`, and returns a `&'static mut` to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}

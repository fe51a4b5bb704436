//! Control stack for a differential-drive droid with a pan head, camera, and
//! speaker, on no-std embedded platforms.
//!
//! For a runnable host build, see `droid-app/sim-droid`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod utils;

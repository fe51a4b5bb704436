//! Math utilities for the droid.
//!
//! This module provides stick shaping, differential mixing, and the vision
//! heuristics used by the autopilot.

pub mod mixing;
pub mod tracking;

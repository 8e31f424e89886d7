//! Progress display constants

/// Width of the progress bar display
pub const PROGRESS_BAR_WIDTH: usize = 30;

/// Throttle transfer updates to this many milliseconds
pub const UPDATE_THROTTLE_MS: u128 = 100;

// vim: ts=4

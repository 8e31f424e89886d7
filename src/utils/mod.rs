//! Utility modules for common functionality

pub mod signal;

pub use signal::setup_signal_handlers;

// vim: ts=4

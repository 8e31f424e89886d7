//! Progress display callback for the CLI
//!
//! Transfer lines from the upload engine are redrawn in place as a bar on
//! stderr; every other line is printed as is.

pub mod constants;

use std::io::Write;
use std::sync::Mutex;
use std::time::Instant;

use crate::callbacks::SyncCallbacks;

/// Progress display constants
pub use constants::*;

/// Shared state for progress tracking
#[derive(Debug)]
pub struct ProgressState {
	pub last_update: Mutex<Instant>,
	/// A transfer bar is on screen and needs a newline before other output
	pub bar_open: Mutex<bool>,
}

impl ProgressState {
	pub fn new() -> Self {
		Self { last_update: Mutex::new(Instant::now()), bar_open: Mutex::new(false) }
	}
}

impl Default for ProgressState {
	fn default() -> Self {
		Self::new()
	}
}

/// A parsed `Uploading <name>: <sent> / <total> KB` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLine<'a> {
	pub name: &'a str,
	pub sent_kb: u64,
	pub total_kb: u64,
}

impl<'a> TransferLine<'a> {
	pub fn parse(line: &'a str) -> Option<Self> {
		let rest = line.strip_prefix("Uploading ")?.strip_suffix(" KB")?;
		let (name, counts) = rest.rsplit_once(": ")?;
		let (sent, total) = counts.split_once(" / ")?;
		Some(TransferLine {
			name,
			sent_kb: sent.trim().parse().ok()?,
			total_kb: total.trim().parse().ok()?,
		})
	}

	pub fn bar(&self) -> String {
		let ratio = if self.total_kb > 0 {
			(self.sent_kb as f64 / self.total_kb as f64).clamp(0.0, 1.0)
		} else {
			1.0
		};
		let filled = (ratio * PROGRESS_BAR_WIDTH as f64) as usize;
		format!("[{}{}]", "=".repeat(filled), " ".repeat(PROGRESS_BAR_WIDTH - filled))
	}
}

/// CLI progress callback writing to stderr
pub struct CliProgressCallback {
	state: ProgressState,
}

impl CliProgressCallback {
	pub fn new() -> Self {
		Self { state: ProgressState::new() }
	}

	fn close_bar(&self) {
		let mut open = self.state.bar_open.lock().unwrap_or_else(|e| e.into_inner());
		if *open {
			let _ = writeln!(std::io::stderr());
			*open = false;
		}
	}
}

impl Default for CliProgressCallback {
	fn default() -> Self {
		Self::new()
	}
}

impl SyncCallbacks for CliProgressCallback {
	fn on_progress(&self, text: &str) {
		if let Some(transfer) = TransferLine::parse(text) {
			// Throttle updates to every 100ms to avoid spamming
			let mut last = self.state.last_update.lock().unwrap_or_else(|e| e.into_inner());
			if last.elapsed().as_millis() < UPDATE_THROTTLE_MS {
				return;
			}
			*last = Instant::now();
			drop(last);

			let _ = write!(
				std::io::stderr(),
				"\r  {} {} {}/{} KB",
				transfer.name,
				transfer.bar(),
				transfer.sent_kb,
				transfer.total_kb
			);
			let _ = std::io::stderr().flush();
			*self.state.bar_open.lock().unwrap_or_else(|e| e.into_inner()) = true;
			return;
		}
		self.close_bar();
		eprintln!("{}", text);
	}

	fn on_error(&self, text: &str) {
		self.close_bar();
		eprintln!("Error: {}", text);
	}

	fn on_disconnected(&self) {
		self.close_bar();
	}
}


// vim: ts=4

//! Shared data types for sync runs

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One sync run: what to mirror where, and since when
#[derive(Debug, Clone)]
pub struct SyncTask {
	pub local_root: PathBuf,
	pub remote_root: String,
	/// Epoch seconds; 0 means every eligible file counts as newer
	pub last_sync_timestamp: f64,
	pub cleanup_deleted: bool,
	cancel: CancellationToken,
}

impl SyncTask {
	pub fn new(
		local_root: impl Into<PathBuf>,
		remote_root: impl Into<String>,
		last_sync_timestamp: f64,
		cancel: CancellationToken,
	) -> Self {
		SyncTask {
			local_root: local_root.into(),
			remote_root: remote_root.into(),
			last_sync_timestamp,
			cleanup_deleted: false,
			cancel,
		}
	}

	pub fn with_cleanup(mut self, cleanup_deleted: bool) -> Self {
		self.cleanup_deleted = cleanup_deleted;
		self
	}

	/// First sync ever: same-named remote files are re-uploaded
	pub fn is_first_sync(&self) -> bool {
		self.last_sync_timestamp <= 0.0
	}

	/// Once true, stays true
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

/// One file transfer in flight
#[derive(Debug, Clone)]
pub struct UploadOperation {
	pub local_path: PathBuf,
	pub remote_path: String,
	pub size: u64,
	pub bytes_sent: u64,
}

impl UploadOperation {
	pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>, size: u64) -> Self {
		UploadOperation {
			local_path: local_path.into(),
			remote_path: remote_path.into(),
			size,
			bytes_sent: 0,
		}
	}

	pub fn advance(&mut self, bytes: usize) {
		self.bytes_sent += bytes as u64;
	}

	/// Start over for a new attempt
	pub fn reset(&mut self) {
		self.bytes_sent = 0;
	}

	pub fn is_complete(&self) -> bool {
		self.bytes_sent == self.size
	}
}

/// Terminal status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
	Completed,
	Failed,
	Cancelled,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncStatus::Completed => write!(f, "completed"),
			SyncStatus::Failed => write!(f, "failed"),
			SyncStatus::Cancelled => write!(f, "cancelled"),
		}
	}
}

/// A file that could not be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
	pub remote_path: String,
	pub error: String,
}

/// Counters collected while walking the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounters {
	pub uploaded: usize,
	pub skipped: usize,
	pub dirs_created: usize,
	pub removed: usize,
	pub retries: usize,
	pub failed: Vec<FailedUpload>,
}

/// Outcome of one sync run, including partial results
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
	pub run_id: Uuid,
	pub status: SyncStatus,
	#[serde(flatten)]
	pub counters: SyncCounters,
	pub error: Option<String>,
}

impl SyncReport {
	pub fn is_complete(&self) -> bool {
		self.status == SyncStatus::Completed
	}

	pub fn uploaded(&self) -> usize {
		self.counters.uploaded
	}

	/// One-line summary for logs and progress observers
	pub fn summary(&self) -> String {
		let mut line = format!(
			"Sync {}: {} uploaded, {} skipped, {} folder(s) created",
			self.status, self.counters.uploaded, self.counters.skipped, self.counters.dirs_created
		);
		if self.counters.removed > 0 {
			line.push_str(&format!(", {} removed", self.counters.removed));
		}
		if !self.counters.failed.is_empty() {
			line.push_str(&format!(", {} failed", self.counters.failed.len()));
		}
		if let Some(ref error) = self.error {
			line.push_str(&format!(" ({})", error));
		}
		line
	}
}


// vim: ts=4

//! Per-run and per-directory state of the tree walk

use std::fmt;

use crate::protocol::RemoteListing;
use crate::validation::path::match_case_insensitive;

/// Where a sync run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
	Init,
	RootListed,
	TargetResolved,
	Recursing,
	Done,
	Failed,
	Cancelled,
}

impl fmt::Display for ReconcilePhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Names known to exist in one remote directory
///
/// Owned by a single recursion frame; directories created during that frame
/// are added so sibling logic never tries to create them twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot {
	files: Vec<String>,
	dirs: Vec<String>,
}

impl DirSnapshot {
	pub fn from_listing(listing: &RemoteListing) -> Self {
		DirSnapshot {
			files: listing.file_names().map(str::to_string).collect(),
			dirs: listing.dir_names().map(str::to_string).collect(),
		}
	}

	/// Snapshot of a directory that does not exist yet
	pub fn empty() -> Self {
		Self::default()
	}

	/// On-device name of a file matching `name` ignoring case
	pub fn find_file(&self, name: &str) -> Option<&str> {
		match_case_insensitive(name, &self.files)
	}

	/// On-device name of a directory matching `name` ignoring case
	pub fn find_dir(&self, name: &str) -> Option<&str> {
		match_case_insensitive(name, &self.dirs)
	}

	pub fn add_dir(&mut self, name: &str) {
		if self.find_dir(name).is_none() {
			self.dirs.push(name.to_string());
		}
	}

	pub fn files(&self) -> &[String] {
		&self.files
	}

	pub fn dirs(&self) -> &[String] {
		&self.dirs
	}
}


// vim: ts=4

//! Tree reconciler
//!
//! Walks the local ROM tree and the remote tree in lock-step. The firmware
//! drops the connection when asked to list a path that does not exist, so
//! a remote directory is only ever listed after its parent's listing showed
//! it, or right after this run created it. `/` is the one path listed
//! unconditionally.

pub mod state;
pub mod upload;

pub use self::state::{DirSnapshot, ReconcilePhase};
pub use self::upload::{should_upload, upload_file, UploadOutcome};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::callbacks::SyncCallbacks;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::logging::*;
use crate::session::DeviceLink;
use crate::types::{FailedUpload, SyncCounters, SyncTask};
use crate::validation::path::{components, is_safe, join, match_case_insensitive, normalize};

/// A local file or directory taking part in the walk
#[derive(Debug, Clone)]
struct LocalEntry {
	path: PathBuf,
	name: String,
}

/// Drives one sync run over a [`DeviceLink`]
pub struct Reconciler<'a> {
	link: &'a mut DeviceLink,
	config: &'a SyncConfig,
	callbacks: &'a dyn SyncCallbacks,
	task: &'a SyncTask,
	phase: ReconcilePhase,
	counters: SyncCounters,
}

impl<'a> Reconciler<'a> {
	pub fn new(
		link: &'a mut DeviceLink,
		config: &'a SyncConfig,
		callbacks: &'a dyn SyncCallbacks,
		task: &'a SyncTask,
	) -> Self {
		Reconciler {
			link,
			config,
			callbacks,
			task,
			phase: ReconcilePhase::Init,
			counters: SyncCounters::default(),
		}
	}

	pub fn phase(&self) -> ReconcilePhase {
		self.phase
	}

	pub fn counters(&self) -> &SyncCounters {
		&self.counters
	}

	pub fn into_counters(self) -> SyncCounters {
		self.counters
	}

	/// Run the whole walk; returns the number of files uploaded
	///
	/// Counters keep whatever was done before a failure or cancellation.
	pub async fn run(&mut self) -> Result<usize, SyncError> {
		let result = self.walk().await;
		self.phase = match result {
			Ok(_) => ReconcilePhase::Done,
			Err(SyncError::Aborted) => ReconcilePhase::Cancelled,
			Err(_) => ReconcilePhase::Failed,
		};
		result
	}

	async fn walk(&mut self) -> Result<usize, SyncError> {
		let remote_root = normalize(&self.task.remote_root);
		if !is_safe(&remote_root) {
			return Err(SyncError::SafetyViolation { path: remote_root });
		}
		let local_root = self.task.local_root.clone();
		if !local_root.is_dir() {
			return Err(SyncError::InvalidConfig {
				message: format!("{} is not a directory", local_root.display()),
			});
		}

		self.checkpoint()?;
		let root = DirSnapshot::from_listing(&self.link.list("/").await?);
		self.phase = ReconcilePhase::RootListed;

		let (target, exists) = self.resolve_target(&remote_root, root).await?;
		self.phase = ReconcilePhase::TargetResolved;
		info!("Syncing {} -> {}", local_root.display(), target);

		self.phase = ReconcilePhase::Recursing;
		self.reconcile_dir(local_root, target, exists).await
	}

	// Cancellation is observed only here, at file and directory boundaries
	fn checkpoint(&mut self) -> Result<(), SyncError> {
		if self.task.is_cancelled() {
			self.phase = ReconcilePhase::Cancelled;
			return Err(SyncError::Aborted);
		}
		Ok(())
	}

	/// Resolve the configured folder one component at a time
	///
	/// Returns the on-device path and whether it exists on the device (it
	/// does not only in dry-run mode).
	async fn resolve_target(
		&mut self,
		remote_root: &str,
		root: DirSnapshot,
	) -> Result<(String, bool), SyncError> {
		let parts: Vec<String> = components(remote_root).into_iter().map(str::to_string).collect();
		let mut current = "/".to_string();
		let mut snapshot = root;
		let mut exists = true;

		for (i, part) in parts.iter().enumerate() {
			if i > 0 {
				snapshot = if exists {
					DirSnapshot::from_listing(&self.link.list(&current).await?)
				} else {
					DirSnapshot::empty()
				};
			}
			let found = snapshot.find_dir(part).map(str::to_string);
			current = match found {
				Some(name) => {
					debug!("Remote folder component {} found as {}", part, name);
					join(&current, &name)
				}
				None => {
					let path = join(&current, part);
					if snapshot.find_file(part).is_some() {
						return Err(SyncError::NotADirectory { path });
					}
					exists = self.create_dir(&path).await?;
					path
				}
			};
		}
		Ok((current, exists))
	}

	// Returns whether the directory now exists on the device
	async fn create_dir(&mut self, path: &str) -> Result<bool, SyncError> {
		if !is_safe(path) {
			return Err(SyncError::SafetyViolation { path: path.to_string() });
		}
		self.counters.dirs_created += 1;
		if self.config.dry_run {
			info!("Would create {}", path);
			return Ok(false);
		}
		self.link.make_dir(path).await?;
		info!("Created {}", path);
		self.callbacks.on_progress(&format!("Created folder {}", path));
		Ok(true)
	}

	/// Reconcile one directory pair, returning the files uploaded in the subtree
	///
	/// `remote_exists` is false only for dry-run directories that were never
	/// created; those are evaluated against an empty snapshot.
	fn reconcile_dir<'b>(
		&'b mut self,
		local_dir: PathBuf,
		remote_dir: String,
		remote_exists: bool,
	) -> Pin<Box<dyn Future<Output = Result<usize, SyncError>> + Send + 'b>> {
		Box::pin(async move {
			let mut snapshot = if remote_exists {
				DirSnapshot::from_listing(&self.link.list(&remote_dir).await?)
			} else {
				DirSnapshot::empty()
			};
			let (files, dirs) = scan_local(&local_dir, self.config).await?;
			debug!(
				"{}: {} ROM(s), {} folder(s) locally; {} file(s) on device",
				remote_dir,
				files.len(),
				dirs.len(),
				snapshot.files().len()
			);

			let mut uploaded = 0;
			for file in &files {
				self.checkpoint()?;
				if self.process_file(file, &remote_dir, &snapshot).await? {
					uploaded += 1;
				}
			}

			if self.task.cleanup_deleted && remote_exists {
				self.remove_deleted(&files, &remote_dir, &snapshot).await?;
			}

			for dir in &dirs {
				self.checkpoint()?;
				let existing = snapshot.find_dir(&dir.name).map(str::to_string);
				let (child, child_exists) = match existing {
					Some(name) => (join(&remote_dir, &name), true),
					None => {
						let path = join(&remote_dir, &dir.name);
						// MakeDir would fail silently and the List that follows drops the socket
						if snapshot.find_file(&dir.name).is_some() {
							return Err(SyncError::NotADirectory { path });
						}
						let created = self.create_dir(&path).await?;
						snapshot.add_dir(&dir.name);
						(path, created)
					}
				};
				uploaded += self.reconcile_dir(dir.path.clone(), child, child_exists).await?;
			}

			Ok(uploaded)
		})
	}

	/// Decide on and perform the upload of one local file
	///
	/// A file that fails every attempt is recorded and the walk goes on.
	async fn process_file(
		&mut self,
		file: &LocalEntry,
		remote_dir: &str,
		snapshot: &DirSnapshot,
	) -> Result<bool, SyncError> {
		let existing = snapshot.find_file(&file.name);
		let remote_path = join(remote_dir, existing.unwrap_or(&file.name));

		let reason = if self.task.is_first_sync() {
			"first sync"
		} else if existing.is_none() {
			"new"
		} else if should_upload(&file.path, self.task.last_sync_timestamp) {
			"modified"
		} else {
			debug!("Skipping {} (unchanged since last sync)", remote_path);
			self.counters.skipped += 1;
			return Ok(false);
		};

		if self.config.dry_run {
			info!("Would upload {} ({})", remote_path, reason);
			self.counters.uploaded += 1;
			return Ok(true);
		}

		self.callbacks.on_progress(&format!("Uploading {} ({})", remote_path, reason));
		match upload_file(
			&mut *self.link,
			self.callbacks,
			&file.path,
			&remote_path,
			self.config.upload_attempts,
		)
		.await
		{
			Ok(outcome) => {
				info!("Uploaded {} ({} bytes)", remote_path, outcome.bytes);
				self.counters.uploaded += 1;
				self.counters.retries += outcome.retries;
				Ok(true)
			}
			Err(e) => {
				error!("{}", e);
				self.callbacks.on_error(&e.to_string());
				self.counters.retries += self.config.upload_attempts.saturating_sub(1) as usize;
				self.counters.failed.push(FailedUpload { remote_path, error: e.to_string() });
				Ok(false)
			}
		}
	}

	/// Remove remote ROMs with no local counterpart; only snapshot names are touched
	async fn remove_deleted(
		&mut self,
		local_files: &[LocalEntry],
		remote_dir: &str,
		snapshot: &DirSnapshot,
	) -> Result<(), SyncError> {
		let local_names: Vec<&str> = local_files.iter().map(|f| f.name.as_str()).collect();
		for remote_name in snapshot.files() {
			if !self.config.is_rom(Path::new(remote_name)) {
				continue;
			}
			if match_case_insensitive(remote_name, &local_names).is_some() {
				continue;
			}
			self.checkpoint()?;
			let path = join(remote_dir, remote_name);
			if self.config.dry_run {
				info!("Would remove {}", path);
			} else {
				self.link.remove(&path).await?;
				info!("Removed {}", path);
				self.callbacks.on_progress(&format!("Removed {}", path));
			}
			self.counters.removed += 1;
		}
		Ok(())
	}
}

/// ROM files and subdirectories of a local directory, sorted by name
async fn scan_local(
	dir: &Path,
	config: &SyncConfig,
) -> Result<(Vec<LocalEntry>, Vec<LocalEntry>), SyncError> {
	let mut files = Vec::new();
	let mut dirs = Vec::new();

	let mut entries = tokio::fs::read_dir(dir).await?;
	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();
		let name = match entry.file_name().into_string() {
			Ok(name) => name,
			Err(raw) => {
				warn!("Skipping non UTF-8 name {:?}", raw);
				continue;
			}
		};
		let metadata = match tokio::fs::metadata(&path).await {
			Ok(metadata) => metadata,
			Err(e) => {
				warn!("Skipping {}: {}", path.display(), e);
				continue;
			}
		};
		if metadata.is_dir() {
			dirs.push(LocalEntry { path, name });
		} else if metadata.is_file() && config.is_rom(&path) {
			files.push(LocalEntry { path, name });
		} else {
			debug!("Ignoring {} (not a ROM)", path.display());
		}
	}

	files.sort_by(|a, b| a.name.cmp(&b.name));
	dirs.sort_by(|a, b| a.name.cmp(&b.name));
	Ok((files, dirs))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[tokio::test]
	async fn test_scan_local_filters_extensions() {
		let dir = tempfile::TempDir::new().unwrap();
		fs::write(dir.path().join("readme.txt"), b"hi").unwrap();
		fs::write(dir.path().join("hack.smc"), b"rom").unwrap();
		fs::write(dir.path().join("OTHER.SFC"), b"rom").unwrap();
		fs::create_dir(dir.path().join("Kaizo")).unwrap();

		let (files, dirs) = scan_local(dir.path(), &SyncConfig::default()).await.unwrap();
		let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["OTHER.SFC", "hack.smc"]);
		assert_eq!(dirs.len(), 1);
		assert_eq!(dirs[0].name, "Kaizo");
	}
}

// vim: ts=4

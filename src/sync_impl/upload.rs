//! Upload engine: chunked transfer with settle delays and retry

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::callbacks::SyncCallbacks;
use crate::error::SyncError;
use crate::logging::*;
use crate::session::DeviceLink;
use crate::types::UploadOperation;
use crate::validation::path::{file_name, parent};

/// Size of each raw binary frame
pub const CHUNK_SIZE: usize = 1024;

/// Progress is reported roughly every this many bytes
pub const PROGRESS_INTERVAL: u64 = 500 * 1024;

const MB: u64 = 1024 * 1024;

/// What a successful upload cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
	pub bytes: u64,
	pub retries: usize,
}

/// Wait after the last frame before the firmware has the file on the card
pub fn transfer_settle(size: u64) -> Duration {
	let ms = if size <= MB {
		300
	} else if size <= 4 * MB {
		500
	} else if size <= 8 * MB {
		1000
	} else {
		1500
	};
	Duration::from_millis(ms)
}

/// Modification time in epoch seconds
pub fn modified_secs(path: &Path) -> Option<f64> {
	let modified = std::fs::metadata(path).ok()?.modified().ok()?;
	Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64())
}

/// Whether the file changed after `threshold`; unreadable files always upload
pub fn should_upload(local_path: &Path, threshold: f64) -> bool {
	match modified_secs(local_path) {
		Some(mtime) => mtime > threshold,
		None => true,
	}
}

/// Upload one file, retrying with a full reconnect between attempts
///
/// Verification only re-lists the parent directory and never fails the
/// upload.
pub async fn upload_file(
	link: &mut DeviceLink,
	callbacks: &dyn SyncCallbacks,
	local_path: &Path,
	remote_path: &str,
	attempts: u32,
) -> Result<UploadOutcome, SyncError> {
	let attempts = attempts.max(1);
	let mut op = UploadOperation::new(local_path, remote_path, 0);
	let mut retries = 0;

	loop {
		let attempt = retries as u32 + 1;
		match transfer(link, callbacks, &mut op).await {
			Ok(()) => break,
			Err(e) if attempt >= attempts => {
				// The daemon may still expect data for the abandoned PutFile
				link.disconnect().await;
				return Err(SyncError::UploadFailed {
					path: remote_path.to_string(),
					attempts,
					message: e.to_string(),
				});
			}
			Err(e) => {
				warn!("Upload of {} failed (attempt {}/{}): {}", remote_path, attempt, attempts, e);
				link.disconnect().await;
				let backoff = link.timings().retry_backoff();
				tokio::time::sleep(backoff).await;
				op.reset();
				retries += 1;
			}
		}
	}

	verify(link, remote_path).await;
	Ok(UploadOutcome { bytes: op.size, retries })
}

async fn transfer(
	link: &mut DeviceLink,
	callbacks: &dyn SyncCallbacks,
	op: &mut UploadOperation,
) -> Result<(), SyncError> {
	link.ensure_connected().await?;

	let mut file = File::open(&op.local_path).await?;
	op.size = file.metadata().await?.len();
	link.put_file(&op.remote_path, op.size).await?;
	tokio::time::sleep(link.timings().put_settle()).await;

	let name = file_name(&op.remote_path).to_string();
	let mut buf = [0u8; CHUNK_SIZE];
	let mut next_report = PROGRESS_INTERVAL;
	while op.bytes_sent < op.size {
		let want = CHUNK_SIZE.min((op.size - op.bytes_sent) as usize);
		let n = read_chunk(&mut file, &mut buf[..want]).await?;
		if n == 0 {
			break;
		}
		link.send_binary(&buf[..n]).await?;
		op.advance(n);
		if op.bytes_sent >= next_report {
			callbacks.on_progress(&format!(
				"Uploading {}: {} / {} KB",
				name,
				op.bytes_sent / 1024,
				op.size / 1024
			));
			next_report += PROGRESS_INTERVAL;
		}
	}
	if !op.is_complete() {
		return Err(SyncError::Other {
			message: format!(
				"{} shrank during upload: sent {} of {} bytes",
				op.local_path.display(),
				op.bytes_sent,
				op.size
			),
		});
	}

	let settle = transfer_settle(op.size);
	debug!("Sent {} bytes to {}, settling {:?}", op.size, op.remote_path, settle);
	tokio::time::sleep(settle).await;
	Ok(())
}

// Fill `buf` completely unless the file ends first
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
	let mut filled = 0;
	while filled < buf.len() {
		let n = file.read(&mut buf[filled..]).await?;
		if n == 0 {
			break;
		}
		filled += n;
	}
	Ok(filled)
}

async fn verify(link: &mut DeviceLink, remote_path: &str) {
	let dir = parent(remote_path);
	match link.list(&dir).await {
		Ok(listing) => {
			let name = file_name(remote_path);
			if listing.file_names().any(|n| n.eq_ignore_ascii_case(name)) {
				debug!("Verified {}", remote_path);
			} else {
				warn!("{} not visible in {} after upload", name, dir);
			}
		}
		Err(e) => warn!("Could not verify {}: {}", remote_path, e),
	}
}


// vim: ts=4

//! Sync manager facade
//!
//! [`SyncManager`] owns the configuration, the device link and the observer
//! for one sync operation. Hosts create one manager per operation; the link
//! is closed at the end of every run so nothing carries over between runs.
//!
//! ```rust,ignore
//! use romsync::{CallbackBuilder, SyncConfig, SyncManager};
//!
//! let callbacks = CallbackBuilder::new().on_progress(|line| eprintln!("{}", line)).build();
//! let mut manager = SyncManager::new(SyncConfig::default(), callbacks);
//! let report = manager.sync("/home/me/roms", 0.0, false).await;
//! println!("{}", report.summary());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::callbacks::SyncCallbacks;
use crate::config::SyncConfig;
use crate::error::{ConnectionError, SyncError};
use crate::logging::*;
use crate::protocol::{Transport, WsTransport};
use crate::session::DeviceLink;
use crate::sync_impl::Reconciler;
use crate::types::{SyncCounters, SyncReport, SyncStatus, SyncTask};
use crate::validation::path::{is_safe, normalize};

/// Lifecycle of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
	Idle,
	Connecting,
	Attaching,
	Syncing,
	Completed,
	Failed,
	Cancelled,
}

impl fmt::Display for ManagerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

pub struct SyncManager {
	config: SyncConfig,
	link: DeviceLink,
	callbacks: Box<dyn SyncCallbacks>,
	cancel: CancellationToken,
	state: ManagerState,
}

impl SyncManager {
	/// Manager talking to the daemon over WebSocket
	pub fn new(config: SyncConfig, callbacks: Box<dyn SyncCallbacks>) -> Self {
		let transport = Box::new(WsTransport::with_timings(&config.timings));
		Self::with_transport(config, transport, callbacks)
	}

	/// Manager over any transport (used by tests and embedding hosts)
	pub fn with_transport(
		config: SyncConfig,
		transport: Box<dyn Transport>,
		callbacks: Box<dyn SyncCallbacks>,
	) -> Self {
		let link = DeviceLink::new(transport, &config);
		SyncManager {
			config,
			link,
			callbacks,
			cancel: CancellationToken::new(),
			state: ManagerState::Idle,
		}
	}

	/// Change the endpoint, device and target folder for the next connection
	pub fn configure(&mut self, host: &str, port: u16, device: &str, remote_folder: &str) {
		self.config.host = host.to_string();
		self.config.port = port;
		self.config.device = device.to_string();
		self.config.remote_folder = remote_folder.to_string();
		self.link.configure(&self.config);
	}

	pub fn config(&self) -> &SyncConfig {
		&self.config
	}

	pub fn state(&self) -> ManagerState {
		self.state
	}

	/// Device the link is attached to, if any
	pub fn device(&self) -> Option<&str> {
		self.link.device()
	}

	/// Request cancellation; the walk stops at its next file or folder boundary
	///
	/// Cancellation is permanent for this manager.
	pub fn cancel(&self) {
		info!("Cancellation requested");
		self.cancel.cancel();
	}

	/// Token a host can hand to another task (signal handler, UI) to cancel the run
	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Connect to the daemon and attach a device, returning its identifier
	pub async fn connect_and_attach(&mut self) -> Result<String, SyncError> {
		self.config.validate()?;
		let endpoint = self.link.endpoint();

		self.state = ManagerState::Connecting;
		info!("Connecting to {}", endpoint);
		if let Err(e) = self.link.connect().await {
			self.state = ManagerState::Failed;
			return Err(SyncError::ConnectionFailed { location: endpoint, source: Box::new(e) });
		}

		self.state = ManagerState::Attaching;
		let devices = self.link.list_devices().await;
		debug!("Devices: {:?}", devices);
		let device = match self.link.choose_device(&devices) {
			Some(device) => device,
			None if !self.config.device.is_empty() => {
				warn!("Daemon listed no devices, trying configured {}", self.config.device);
				self.config.device.clone()
			}
			None => {
				self.state = ManagerState::Failed;
				self.link.disconnect().await;
				return Err(SyncError::ConnectionFailed {
					location: endpoint,
					source: Box::new(ConnectionError::NoDevice),
				});
			}
		};

		if let Err(e) = self.link.attach(&device).await {
			self.state = ManagerState::Failed;
			self.link.disconnect().await;
			return Err(SyncError::ConnectionFailed { location: endpoint, source: Box::new(e) });
		}

		self.callbacks.on_connected();
		self.callbacks.on_progress(&format!("Connected to {}", device));
		Ok(device)
	}

	/// Devices the daemon currently sees, connecting first if needed
	pub async fn list_devices(&mut self) -> Result<Vec<String>, SyncError> {
		if !self.link.is_connected() {
			let endpoint = self.link.endpoint();
			self.link.connect().await.map_err(|e| SyncError::ConnectionFailed {
				location: endpoint,
				source: Box::new(e),
			})?;
		}
		Ok(self.link.list_devices().await)
	}

	/// Mirror `local_dir` onto the configured remote folder
	///
	/// Never fails outright: every outcome, including partial progress, is
	/// described by the returned report. The connection is closed afterwards
	/// and the manager is back to [`ManagerState::Idle`].
	pub async fn sync(
		&mut self,
		local_dir: impl AsRef<Path>,
		last_sync: f64,
		cleanup_deleted: bool,
	) -> SyncReport {
		let run_id = Uuid::new_v4();
		let span = info_span!("sync", run = %run_id);
		self.run(run_id, local_dir.as_ref().to_path_buf(), last_sync, cleanup_deleted)
			.instrument(span)
			.await
	}

	async fn run(
		&mut self,
		run_id: Uuid,
		local_dir: PathBuf,
		last_sync: f64,
		cleanup_deleted: bool,
	) -> SyncReport {
		let task =
			SyncTask::new(local_dir, self.config.remote_folder.clone(), last_sync, self.cancel.clone())
				.with_cleanup(cleanup_deleted);
		if self.config.dry_run {
			info!("Dry run: nothing will be written to the device");
		}

		let mut counters = SyncCounters::default();
		let result = self.execute(&task, &mut counters).await;

		let (status, error) = match result {
			Ok(()) if counters.failed.is_empty() => (SyncStatus::Completed, None),
			Ok(()) => (
				SyncStatus::Failed,
				Some(format!("{} file(s) could not be uploaded", counters.failed.len())),
			),
			Err(SyncError::Aborted) => (SyncStatus::Cancelled, None),
			Err(e) => (SyncStatus::Failed, Some(e.to_string())),
		};
		self.state = match status {
			SyncStatus::Completed => ManagerState::Completed,
			SyncStatus::Failed => ManagerState::Failed,
			SyncStatus::Cancelled => ManagerState::Cancelled,
		};
		debug!("Run ended in state {}", self.state);

		let was_connected = self.link.is_connected();
		self.link.disconnect().await;
		if was_connected {
			self.callbacks.on_disconnected();
		}
		// The outcome lives on in the report; the manager is ready for another run
		self.state = ManagerState::Idle;

		let report = SyncReport { run_id, status, counters, error };
		match status {
			SyncStatus::Failed => {
				error!("{}", report.summary());
				self.callbacks.on_error(&report.summary());
			}
			_ => info!("{}", report.summary()),
		}
		self.callbacks.on_progress(&report.summary());
		report
	}

	async fn execute(&mut self, task: &SyncTask, counters: &mut SyncCounters) -> Result<(), SyncError> {
		if task.is_cancelled() {
			return Err(SyncError::Aborted);
		}
		self.config.validate()?;
		let remote_root = normalize(&task.remote_root);
		if !is_safe(&remote_root) {
			return Err(SyncError::SafetyViolation { path: remote_root });
		}

		if !self.link.is_connected() {
			self.connect_and_attach().await?;
		}

		self.state = ManagerState::Syncing;
		let mut reconciler = Reconciler::new(&mut self.link, &self.config, &*self.callbacks, task);
		let result = reconciler.run().await;
		debug!("Reconciler finished in phase {}", reconciler.phase());
		*counters = reconciler.into_counters();
		result.map(|uploaded| debug!("{} file(s) uploaded", uploaded))
	}

	/// Cancel any run in progress and close the connection
	pub async fn disconnect(&mut self) {
		self.cancel.cancel();
		if self.link.is_connected() {
			self.link.disconnect().await;
			self.callbacks.on_disconnected();
		}
		self.state = ManagerState::Idle;
	}
}

// vim: ts=4

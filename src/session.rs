//! Device session management
//!
//! A [`DeviceLink`] owns the transport for one sync run and knows which
//! device it is attached to, so it can transparently reconnect and reattach
//! when the daemon drops the socket.

use crate::config::{SyncConfig, Timings};
use crate::error::{ConnectionError, SyncError};
use crate::logging::*;
use crate::protocol::{Command, Opcode, RemoteListing, Reply, Transport};
use crate::validation::path::is_safe;

/// Connection plus attached device for one sync run
pub struct DeviceLink {
	transport: Box<dyn Transport>,
	host: String,
	port: u16,
	app_name: String,
	preferred_device: String,
	attached: Option<String>,
	timings: Timings,
	max_reconnects: u32,
}

impl DeviceLink {
	pub fn new(transport: Box<dyn Transport>, config: &SyncConfig) -> Self {
		DeviceLink {
			transport,
			host: config.host.clone(),
			port: config.port,
			app_name: config.app_name.clone(),
			preferred_device: config.device.clone(),
			attached: None,
			timings: config.timings.clone(),
			max_reconnects: config.max_reconnects,
		}
	}

	/// Take over endpoint and device settings for the next connection
	pub fn configure(&mut self, config: &SyncConfig) {
		self.host = config.host.clone();
		self.port = config.port;
		self.app_name = config.app_name.clone();
		self.preferred_device = config.device.clone();
		self.timings = config.timings.clone();
		self.max_reconnects = config.max_reconnects;
	}

	pub fn is_connected(&self) -> bool {
		self.transport.is_connected()
	}

	/// Device currently attached, if any
	pub fn device(&self) -> Option<&str> {
		self.attached.as_deref()
	}

	pub fn timings(&self) -> &Timings {
		&self.timings
	}

	pub fn endpoint(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Open the socket and identify; no retry
	pub async fn connect(&mut self) -> Result<(), ConnectionError> {
		self.attached = None;
		self.transport.connect(&self.host, self.port, &self.app_name).await
	}

	/// Devices the daemon currently sees; empty on timeout or error
	pub async fn list_devices(&mut self) -> Vec<String> {
		let timeout = self.timings.command_timeout();
		match self.transport.send(&Command::device_list(), Some(timeout)).await {
			Reply::Results(devices) => devices,
			Reply::Timeout => {
				warn!("DeviceList got no reply");
				Vec::new()
			}
			Reply::Closed => {
				warn!("Connection closed while listing devices");
				Vec::new()
			}
		}
	}

	/// Attach to `device_id`
	///
	/// Only a transport failure while sending `Attach` fails the call. The
	/// follow-up `Info` query is informational: some firmware never answers
	/// it yet handles every file operation correctly.
	pub async fn attach(&mut self, device_id: &str) -> Result<(), ConnectionError> {
		if let Reply::Closed = self.transport.send(&Command::attach(device_id), None).await {
			return Err(ConnectionError::Disconnected);
		}
		debug!("Attach sent, waiting {:?} for the device", self.timings.attach_settle());
		tokio::time::sleep(self.timings.attach_settle()).await;

		match self.info().await {
			Reply::Results(info) => debug!("Device info: {:?}", info),
			Reply::Timeout => warn!("{} did not answer Info, assuming attached", device_id),
			Reply::Closed => warn!("Connection closed during Info query of {}", device_id),
		}

		info!("Attached to {}", device_id);
		self.attached = Some(device_id.to_string());
		Ok(())
	}

	/// `Info` query with the configured timeout
	pub async fn info(&mut self) -> Reply {
		let timeout = self.timings.info_timeout();
		self.transport.send(&Command::info(), Some(timeout)).await
	}

	/// Pick the configured device if the daemon lists it, otherwise the first one
	pub fn choose_device(&self, devices: &[String]) -> Option<String> {
		if !self.preferred_device.is_empty() && devices.contains(&self.preferred_device) {
			return Some(self.preferred_device.clone());
		}
		devices.first().cloned()
	}

	/// Fresh connection, fresh device list, reattach
	pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
		self.transport.disconnect().await;
		self.connect().await?;
		let devices = self.list_devices().await;
		let device = self.choose_device(&devices).ok_or(ConnectionError::NoDevice)?;
		self.attach(&device).await
	}

	/// Reconnect and reattach if the socket went away
	pub async fn ensure_connected(&mut self) -> Result<(), ConnectionError> {
		if self.transport.is_connected() {
			return Ok(());
		}
		info!("Connection lost, reconnecting to {}", self.endpoint());
		self.reconnect().await
	}

	/// List a directory whose existence the caller has just confirmed
	///
	/// A dropped socket is recovered up to `max_reconnects` times; a missing
	/// reply is a failure the caller must handle.
	pub async fn list(&mut self, path: &str) -> Result<RemoteListing, SyncError> {
		let mut reconnects = 0;
		loop {
			let timeout = self.timings.list_timeout();
			match self.transport.send(&Command::list(path), Some(timeout)).await {
				Reply::Results(results) => return Ok(RemoteListing::from_results(&results)),
				Reply::Timeout => {
					return Err(SyncError::CommandTimeout {
						opcode: Opcode::List,
						path: path.to_string(),
					})
				}
				Reply::Closed => {
					if reconnects >= self.max_reconnects {
						return Err(SyncError::Connection(ConnectionError::Disconnected));
					}
					reconnects += 1;
					warn!(
						"Connection dropped listing {}, reconnecting ({}/{})",
						path, reconnects, self.max_reconnects
					);
					self.reconnect().await?;
				}
			}
		}
	}

	/// Create a directory; protected locations are refused without sending
	pub async fn make_dir(&mut self, path: &str) -> Result<(), SyncError> {
		if !is_safe(path) {
			return Err(SyncError::SafetyViolation { path: path.to_string() });
		}
		self.send_with_recovery(&Command::make_dir(path)).await
	}

	/// Remove a file; protected locations are refused without sending
	pub async fn remove(&mut self, path: &str) -> Result<(), SyncError> {
		if !is_safe(path) {
			return Err(SyncError::SafetyViolation { path: path.to_string() });
		}
		self.send_with_recovery(&Command::remove(path)).await
	}

	/// Announce a file transfer; the upload engine owns retries
	pub async fn put_file(&mut self, path: &str, size: u64) -> Result<(), SyncError> {
		if !is_safe(path) {
			return Err(SyncError::SafetyViolation { path: path.to_string() });
		}
		match self.transport.send(&Command::put_file(path, size), None).await {
			Reply::Closed => Err(SyncError::Connection(ConnectionError::Disconnected)),
			_ => Ok(()),
		}
	}

	pub async fn send_binary(&mut self, data: &[u8]) -> Result<(), SyncError> {
		self.transport.send_binary(data).await.map_err(SyncError::from)
	}

	/// Close the socket and forget the attached device
	pub async fn disconnect(&mut self) {
		self.transport.disconnect().await;
		self.attached = None;
	}

	// Fire-and-forget commands that never reached the socket are safe to resend
	async fn send_with_recovery(&mut self, command: &Command) -> Result<(), SyncError> {
		let mut reconnects = 0;
		loop {
			match self.transport.send(command, None).await {
				Reply::Closed => {
					if reconnects >= self.max_reconnects {
						return Err(SyncError::Connection(ConnectionError::Disconnected));
					}
					reconnects += 1;
					warn!(
						"Connection dropped sending {}, reconnecting ({}/{})",
						command.opcode(),
						reconnects,
						self.max_reconnects
					);
					self.reconnect().await?;
				}
				_ => return Ok(()),
			}
		}
	}
}

// vim: ts=4

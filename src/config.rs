//! Configuration for romsync
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (SyncConfig::default())
//! 2. Config store (~/.romsync/config.toml)
//! 3. Environment variables (ROMSYNC_* prefix)
//! 4. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::logging::*;

// Config store keys
pub const KEY_HOST: &str = "host";
pub const KEY_PORT: &str = "port";
pub const KEY_DEVICE: &str = "device";
pub const KEY_REMOTE_FOLDER: &str = "remote_folder";
pub const KEY_LAST_SYNC: &str = "last_sync";

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Settings for one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
	// ========================================================================
	// DAEMON CONNECTION
	// ========================================================================
	/// Host running the WebSocket daemon
	pub host: String,

	/// Daemon port
	pub port: u16,

	/// Identity sent with the `Name` command
	pub app_name: String,

	/// Device identifier to attach (empty = first device the daemon reports)
	pub device: String,

	// ========================================================================
	// SYNC BEHAVIOR
	// ========================================================================
	/// Folder on the SD card that mirrors the local ROM tree
	pub remote_folder: String,

	/// Epoch seconds of the last completed sync (0 = never synced)
	pub last_sync: f64,

	/// File extensions (without dot, any case) that take part in sync
	pub extensions: Vec<String>,

	/// Walk and log decisions without writing anything to the device
	pub dry_run: bool,

	// ========================================================================
	// RECOVERY
	// ========================================================================
	/// Reconnect-and-reattach attempts after the socket drops mid-walk
	pub max_reconnects: u32,

	/// Total attempts per file upload
	pub upload_attempts: u32,

	/// Settle delays and timeouts
	pub timings: Timings,
}

impl Default for SyncConfig {
	fn default() -> Self {
		SyncConfig {
			host: "localhost".to_string(),
			port: 23074,
			app_name: "romsync".to_string(),
			device: String::new(),
			remote_folder: "/ROMs".to_string(),
			last_sync: 0.0,
			extensions: vec!["smc".to_string(), "sfc".to_string()],
			dry_run: false,
			max_reconnects: 2,
			upload_attempts: 2,
			timings: Timings::default(),
		}
	}
}

impl SyncConfig {
	/// Read the persisted keys from a store, keeping defaults for the rest
	pub fn from_store(store: &dyn ConfigStore) -> Self {
		let mut config = SyncConfig::default();
		config.host = store.get(KEY_HOST, &config.host);
		config.device = store.get(KEY_DEVICE, &config.device);
		config.remote_folder = store.get(KEY_REMOTE_FOLDER, &config.remote_folder);

		let port = store.get(KEY_PORT, &config.port.to_string());
		match port.trim().parse() {
			Ok(port) => config.port = port,
			Err(_) => warn!("Ignoring invalid stored port {:?}", port),
		}
		let last_sync = store.get(KEY_LAST_SYNC, "0");
		match last_sync.trim().parse() {
			Ok(ts) => config.last_sync = ts,
			Err(_) => warn!("Ignoring invalid stored last sync time {:?}", last_sync),
		}
		config
	}

	/// Write the persisted keys back to a store
	pub fn write_to_store(&self, store: &mut dyn ConfigStore) {
		store.set(KEY_HOST, &self.host);
		store.set(KEY_PORT, &self.port.to_string());
		store.set(KEY_DEVICE, &self.device);
		store.set(KEY_REMOTE_FOLDER, &self.remote_folder);
		store.set(KEY_LAST_SYNC, &self.last_sync.to_string());
	}

	/// Apply `ROMSYNC_*` environment overrides
	pub fn apply_env(&mut self) {
		self.apply_overrides(|key| std::env::var(key).ok());
	}

	fn apply_overrides<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = lookup("ROMSYNC_HOST") {
			self.host = host;
		}
		if let Some(port) = lookup("ROMSYNC_PORT") {
			match port.parse() {
				Ok(port) => self.port = port,
				Err(_) => warn!("Ignoring invalid ROMSYNC_PORT {:?}", port),
			}
		}
		if let Some(device) = lookup("ROMSYNC_DEVICE") {
			self.device = device;
		}
		if let Some(folder) = lookup("ROMSYNC_REMOTE_FOLDER") {
			self.remote_folder = folder;
		}
	}

	pub fn validate(&self) -> Result<(), SyncError> {
		if self.port == 0 {
			return Err(SyncError::InvalidConfig { message: "port must not be 0".to_string() });
		}
		if self.remote_folder.trim().is_empty() {
			return Err(SyncError::InvalidConfig {
				message: "remote folder must not be empty".to_string(),
			});
		}
		if self.extensions.is_empty() {
			return Err(SyncError::InvalidConfig {
				message: "at least one ROM extension is required".to_string(),
			});
		}
		if self.upload_attempts == 0 {
			return Err(SyncError::InvalidConfig {
				message: "upload attempts must be at least 1".to_string(),
			});
		}
		Ok(())
	}

	/// Whether `path` carries one of the configured ROM extensions (any case)
	pub fn is_rom(&self, path: &Path) -> bool {
		match path.extension().and_then(|e| e.to_str()) {
			Some(ext) => self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)),
			None => false,
		}
	}
}

// ============================================================================
// TIMINGS
// ============================================================================

/// Firmware settle delays and command timeouts, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timings {
	/// Socket open timeout
	pub connect_ms: u64,

	/// Pause after `Name` before any further traffic
	pub name_settle_ms: u64,

	/// Pause after `Attach` before the device accepts commands
	pub attach_settle_ms: u64,

	/// Timeout of the post-attach `Info` query
	pub info_timeout_ms: u64,

	/// Timeout of `List`
	pub list_timeout_ms: u64,

	/// Timeout of every other reply-expecting command
	pub command_timeout_ms: u64,

	/// Pause between `PutFile` and the first data frame
	pub put_settle_ms: u64,

	/// Pause between a failed upload attempt and the retry
	pub retry_backoff_ms: u64,

	/// Pause after sending the close frame
	pub close_grace_ms: u64,

	/// How long a reply that timed out may still arrive before the next command
	pub late_reply_grace_ms: u64,
}

impl Default for Timings {
	fn default() -> Self {
		Timings {
			connect_ms: 5_000,
			name_settle_ms: 500,
			attach_settle_ms: 5_000,
			info_timeout_ms: 10_000,
			list_timeout_ms: 15_000,
			command_timeout_ms: 10_000,
			put_settle_ms: 100,
			retry_backoff_ms: 3_000,
			close_grace_ms: 250,
			late_reply_grace_ms: 1_000,
		}
	}
}

impl Timings {
	pub fn connect(&self) -> Duration {
		Duration::from_millis(self.connect_ms)
	}

	pub fn name_settle(&self) -> Duration {
		Duration::from_millis(self.name_settle_ms)
	}

	pub fn attach_settle(&self) -> Duration {
		Duration::from_millis(self.attach_settle_ms)
	}

	pub fn info_timeout(&self) -> Duration {
		Duration::from_millis(self.info_timeout_ms)
	}

	pub fn list_timeout(&self) -> Duration {
		Duration::from_millis(self.list_timeout_ms)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_millis(self.command_timeout_ms)
	}

	pub fn put_settle(&self) -> Duration {
		Duration::from_millis(self.put_settle_ms)
	}

	pub fn retry_backoff(&self) -> Duration {
		Duration::from_millis(self.retry_backoff_ms)
	}

	pub fn close_grace(&self) -> Duration {
		Duration::from_millis(self.close_grace_ms)
	}

	pub fn late_reply_grace(&self) -> Duration {
		Duration::from_millis(self.late_reply_grace_ms)
	}
}

// ============================================================================
// CONFIG STORE
// ============================================================================

/// Key/value persistence the host application provides
pub trait ConfigStore {
	/// Stored value for `key`, or `default` when absent
	fn get(&self, key: &str, default: &str) -> String;

	fn set(&mut self, key: &str, value: &str);
}

/// In-memory store, for embedding hosts that persist elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
	values: BTreeMap<String, String>,
}

impl MemoryConfigStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl ConfigStore for MemoryConfigStore {
	fn get(&self, key: &str, default: &str) -> String {
		self.values.get(key).cloned().unwrap_or_else(|| default.to_string())
	}

	fn set(&mut self, key: &str, value: &str) {
		self.values.insert(key.to_string(), value.to_string());
	}
}

/// Flat TOML file store
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
	path: PathBuf,
	table: toml::Table,
}

impl TomlConfigStore {
	/// `~/.romsync/config.toml`
	pub fn default_path() -> PathBuf {
		std::env::var("HOME")
			.ok()
			.map(|h| PathBuf::from(h).join(".romsync"))
			.unwrap_or_else(|| PathBuf::from(".romsync"))
			.join("config.toml")
	}

	/// Load the store, starting empty when the file does not exist yet
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
		let path = path.into();
		let table = match fs::read_to_string(&path) {
			Ok(contents) => contents.parse::<toml::Table>().map_err(|e| {
				SyncError::InvalidConfig { message: format!("{}: {}", path.display(), e) }
			})?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("No config file at {}, using defaults", path.display());
				toml::Table::new()
			}
			Err(e) => return Err(e.into()),
		};
		Ok(TomlConfigStore { path, table })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn save(&self) -> Result<(), SyncError> {
		if let Some(dir) = self.path.parent() {
			if !dir.as_os_str().is_empty() {
				fs::create_dir_all(dir)?;
			}
		}
		let contents = toml::to_string(&self.table).map_err(|e| SyncError::Other {
			message: format!("Cannot encode config: {}", e),
		})?;
		fs::write(&self.path, contents)?;
		Ok(())
	}

	pub fn entries(&self) -> impl Iterator<Item = (&str, String)> {
		self.table.iter().map(|(k, v)| (k.as_str(), value_to_string(v)))
	}
}

fn value_to_string(value: &toml::Value) -> String {
	match value {
		toml::Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

impl ConfigStore for TomlConfigStore {
	fn get(&self, key: &str, default: &str) -> String {
		self.table.get(key).map(value_to_string).unwrap_or_else(|| default.to_string())
	}

	fn set(&mut self, key: &str, value: &str) {
		self.table.insert(key.to_string(), toml::Value::String(value.to_string()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_default() {
		let config = SyncConfig::default();
		assert_eq!(config.port, 23074);
		assert_eq!(config.last_sync, 0.0);
		assert_eq!(config.upload_attempts, 2);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_timings_match_firmware_delays() {
		let t = Timings::default();
		assert_eq!(t.connect(), Duration::from_secs(5));
		assert_eq!(t.name_settle(), Duration::from_millis(500));
		assert_eq!(t.attach_settle(), Duration::from_secs(5));
		assert_eq!(t.list_timeout(), Duration::from_secs(15));
		assert_eq!(t.retry_backoff(), Duration::from_secs(3));
	}

	#[test]
	fn test_is_rom_case_insensitive() {
		let config = SyncConfig::default();
		assert!(config.is_rom(Path::new("hack.smc")));
		assert!(config.is_rom(Path::new("HACK.SFC")));
		assert!(!config.is_rom(Path::new("readme.txt")));
		assert!(!config.is_rom(Path::new("smc")));
	}

	#[test]
	fn test_store_round_trip_keys() {
		let mut store = MemoryConfigStore::new();
		let mut config = SyncConfig::default();
		config.host = "10.0.0.2".to_string();
		config.port = 8080;
		config.last_sync = 1700000000.5;
		config.write_to_store(&mut store);

		let loaded = SyncConfig::from_store(&store);
		assert_eq!(loaded.host, "10.0.0.2");
		assert_eq!(loaded.port, 8080);
		assert_eq!(loaded.last_sync, 1700000000.5);
	}

	#[test]
	fn test_invalid_stored_values_keep_defaults() {
		let mut store = MemoryConfigStore::new();
		store.set(KEY_PORT, "not-a-port");
		store.set(KEY_LAST_SYNC, "yesterday");
		let loaded = SyncConfig::from_store(&store);
		assert_eq!(loaded.port, 23074);
		assert_eq!(loaded.last_sync, 0.0);
	}

	#[test]
	fn test_overrides() {
		let mut config = SyncConfig::default();
		config.apply_overrides(|key| match key {
			"ROMSYNC_HOST" => Some("snes.local".to_string()),
			"ROMSYNC_PORT" => Some("8080".to_string()),
			_ => None,
		});
		assert_eq!(config.host, "snes.local");
		assert_eq!(config.port, 8080);
		assert_eq!(config.remote_folder, "/ROMs");
	}

	#[test]
	fn test_validate_rejects_bad_values() {
		let mut config = SyncConfig::default();
		config.upload_attempts = 0;
		assert!(matches!(config.validate(), Err(SyncError::InvalidConfig { .. })));

		let mut config = SyncConfig::default();
		config.remote_folder = "  ".to_string();
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_toml_store_persists() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("nested").join("config.toml");

		let mut store = TomlConfigStore::open(&path).unwrap();
		assert_eq!(store.get(KEY_HOST, "localhost"), "localhost");
		store.set(KEY_HOST, "192.168.1.20");
		store.save().unwrap();

		let reopened = TomlConfigStore::open(&path).unwrap();
		assert_eq!(reopened.get(KEY_HOST, "localhost"), "192.168.1.20");
	}
}

// vim: ts=4

//! Scripted in-memory daemon for integration tests
//!
//! `MockTransport` behaves like the firmware behind the daemon: fire-and-forget
//! commands get no reply, and listing a directory that does not exist drops
//! the connection. Every call is recorded so tests can check ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use romsync::config::SyncConfig;
use romsync::error::ConnectionError;
use romsync::protocol::{Command, Opcode, ProtocolError, ProtocolResult, Reply, Transport};
use romsync::validation::path::{file_name, normalize, parent};

pub const DEVICE: &str = "SD2SNES COM3";

/// One command or frame as the daemon saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Connect,
	Disconnect,
	Name(String),
	DeviceList,
	Attach(String),
	Info,
	/// Directory names the listing returned
	List { path: String, dirs: Vec<String> },
	MakeDir(String),
	PutFile { path: String, size: u64 },
	Binary(usize),
	Remove(String),
}

#[derive(Debug, Default)]
pub struct MockState {
	pub connected: bool,
	pub devices: Vec<String>,
	pub answer_info: bool,
	pub refuse_connect: bool,
	pub dirs: BTreeSet<String>,
	pub files: BTreeMap<String, Vec<u8>>,
	pub calls: Vec<Call>,
	/// Lists of paths that did not exist, i.e. what makes real firmware drop us
	pub violations: Vec<String>,
	/// Paths whose listing never gets an answer
	pub silent_lists: BTreeSet<String>,
	/// Remaining failing attempts per remote path
	pub failing_uploads: BTreeMap<String, u32>,
	/// Cancelled when a `PutFile` arrives
	pub cancel_on_put: Option<CancellationToken>,
	pending: Option<(String, u64, Vec<u8>)>,
}

/// Cloneable handle; the test keeps one clone, the manager owns another
#[derive(Debug, Clone)]
pub struct MockTransport {
	state: Arc<Mutex<MockState>>,
}

impl MockTransport {
	pub fn new() -> Self {
		let mut state = MockState::default();
		state.devices = vec![DEVICE.to_string()];
		state.answer_info = true;
		state.dirs.insert("/".to_string());
		MockTransport { state: Arc::new(Mutex::new(state)) }
	}

	pub fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap()
	}

	/// Add a remote directory together with its ancestors
	pub fn with_dir(self, path: &str) -> Self {
		{
			let mut state = self.state();
			let mut current = normalize(path);
			while current != "/" {
				state.dirs.insert(current.clone());
				current = parent(&current);
			}
		}
		self
	}

	pub fn with_file(self, path: &str, data: &[u8]) -> Self {
		let this = self.with_dir(&parent(path));
		this.state().files.insert(normalize(path), data.to_vec());
		this
	}

	pub fn boxed(&self) -> Box<dyn Transport> {
		Box::new(self.clone())
	}

	pub fn calls(&self) -> Vec<Call> {
		self.state().calls.clone()
	}

	pub fn listed_paths(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|c| match c {
				Call::List { path, .. } => Some(path),
				_ => None,
			})
			.collect()
	}

	pub fn put_paths(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|c| match c {
				Call::PutFile { path, .. } => Some(path),
				_ => None,
			})
			.collect()
	}

	pub fn made_dirs(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|c| match c {
				Call::MakeDir(path) => Some(path),
				_ => None,
			})
			.collect()
	}

	pub fn file(&self, path: &str) -> Option<Vec<u8>> {
		self.state().files.get(path).cloned()
	}

	/// Every `List(p)` other than `/` must follow a listing of `parent(p)` that
	/// showed `p`, or a `MakeDir(p)` earlier in the same run
	pub fn assert_lists_confirmed(&self) {
		let mut confirmed: BTreeSet<String> = BTreeSet::new();
		confirmed.insert("/".to_string());
		for call in self.calls() {
			match call {
				Call::List { path, dirs } => {
					assert!(confirmed.contains(&path), "List {} without confirmation", path);
					for dir in dirs {
						confirmed.insert(normalize(&format!("{}/{}", path, dir)));
					}
				}
				Call::MakeDir(path) => {
					confirmed.insert(path);
				}
				_ => {}
			}
		}
		let violations = self.state().violations.clone();
		assert!(violations.is_empty(), "lists of unknown paths: {:?}", violations);
	}

	fn listing(state: &MockState, path: &str) -> (Vec<String>, Vec<String>) {
		let mut results = Vec::new();
		let mut dirs = Vec::new();
		for dir in &state.dirs {
			if dir != "/" && parent(dir) == path {
				let name = file_name(dir).to_string();
				results.push("0".to_string());
				results.push(name.clone());
				dirs.push(name);
			}
		}
		for file in state.files.keys() {
			if parent(file) == path {
				results.push("1".to_string());
				results.push(file_name(file).to_string());
			}
		}
		(results, dirs)
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn connect(&mut self, host: &str, port: u16, app_name: &str) -> Result<(), ConnectionError> {
		let mut state = self.state();
		if state.refuse_connect {
			return Err(ConnectionError::WebSocket {
				endpoint: format!("ws://{}:{}", host, port),
				message: "Connection refused".to_string(),
			});
		}
		state.connected = true;
		state.calls.push(Call::Connect);
		state.calls.push(Call::Name(app_name.to_string()));
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.state().connected
	}

	async fn send(&mut self, command: &Command, _timeout: Option<Duration>) -> Reply {
		let mut state = self.state();
		if !state.connected {
			return Reply::Closed;
		}
		let operand = command.operands().first().cloned().unwrap_or_default();
		match command.opcode() {
			Opcode::DeviceList => {
				state.calls.push(Call::DeviceList);
				Reply::Results(state.devices.clone())
			}
			Opcode::Attach => {
				state.calls.push(Call::Attach(operand));
				Reply::Results(vec![])
			}
			Opcode::Name => {
				state.calls.push(Call::Name(operand));
				Reply::Results(vec![])
			}
			Opcode::Info => {
				state.calls.push(Call::Info);
				if state.answer_info {
					Reply::Results(vec!["1.11.0".to_string(), "sd2snes".to_string()])
				} else {
					Reply::Timeout
				}
			}
			Opcode::List => {
				if state.silent_lists.contains(&operand) {
					state.calls.push(Call::List { path: operand, dirs: vec![] });
					return Reply::Timeout;
				}
				if !state.dirs.contains(&operand) {
					state.calls.push(Call::List { path: operand.clone(), dirs: vec![] });
					state.violations.push(operand);
					state.connected = false;
					return Reply::Closed;
				}
				let (results, dirs) = Self::listing(&state, &operand);
				state.calls.push(Call::List { path: operand, dirs });
				Reply::Results(results)
			}
			Opcode::MakeDir => {
				state.calls.push(Call::MakeDir(operand.clone()));
				state.dirs.insert(operand);
				Reply::Results(vec![])
			}
			Opcode::PutFile => {
				let size = command
					.operands()
					.get(1)
					.and_then(|hex| u64::from_str_radix(hex, 16).ok())
					.unwrap_or(0);
				state.calls.push(Call::PutFile { path: operand.clone(), size });
				if let Some(token) = &state.cancel_on_put {
					token.cancel();
				}
				state.pending = Some((operand, size, Vec::new()));
				Reply::Results(vec![])
			}
			Opcode::Remove => {
				state.calls.push(Call::Remove(operand.clone()));
				state.files.remove(&operand);
				Reply::Results(vec![])
			}
		}
	}

	async fn send_binary(&mut self, data: &[u8]) -> ProtocolResult<()> {
		let mut state = self.state();
		if !state.connected {
			return Err(ProtocolError::Closed);
		}
		state.calls.push(Call::Binary(data.len()));
		let (path, size, mut buf) = match state.pending.take() {
			Some(pending) => pending,
			None => panic!("binary frame without a PutFile"),
		};
		if let Some(remaining) = state.failing_uploads.get_mut(&path) {
			if *remaining > 0 {
				*remaining -= 1;
				state.connected = false;
				return Err(ProtocolError::Closed);
			}
		}
		buf.extend_from_slice(data);
		if buf.len() as u64 >= size {
			state.files.insert(path, buf);
		} else {
			state.pending = Some((path, size, buf));
		}
		Ok(())
	}

	async fn disconnect(&mut self) {
		let mut state = self.state();
		if state.connected {
			state.calls.push(Call::Disconnect);
		}
		state.connected = false;
		state.pending = None;
	}
}

/// Config with the mock's device and default firmware timings
pub fn test_config() -> SyncConfig {
	let mut config = SyncConfig::default();
	config.device = DEVICE.to_string();
	config
}

/// Create a local file with a pinned modification time (epoch seconds)
pub fn rom(root: &Path, relative: &str, data: &[u8], mtime: i64) -> PathBuf {
	let path = root.join(relative);
	if let Some(dir) = path.parent() {
		fs::create_dir_all(dir).unwrap();
	}
	fs::write(&path, data).unwrap();
	filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime, 0)).unwrap();
	path
}

pub fn local_tree() -> TempDir {
	TempDir::new().unwrap()
}

// vim: ts=4

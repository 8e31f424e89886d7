//! Wire types for the device-control protocol
//!
//! Commands travel as JSON text frames of the form
//! `{"Opcode": "...", "Space": "SNES", "Operands": [...]}`. Reply-expecting
//! opcodes answer with `{"Results": [...]}`; the rest get no answer at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Address space every command is issued against
pub const SPACE: &str = "SNES";

/// Type flag the firmware uses for directories in `List` results
pub const DIR_FLAG: &str = "0";

/// Named operation carried by one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
	DeviceList,
	Attach,
	Name,
	Info,
	List,
	MakeDir,
	PutFile,
	Remove,
}

impl Opcode {
	/// Fire-and-forget opcodes: the firmware never answers these
	pub fn expects_reply(self) -> bool {
		!matches!(
			self,
			Opcode::Attach | Opcode::Name | Opcode::MakeDir | Opcode::PutFile | Opcode::Remove
		)
	}

	/// Reply timeout used when the caller does not override it
	pub fn default_timeout(self) -> Duration {
		match self {
			Opcode::List => Duration::from_secs(15),
			_ => Duration::from_secs(10),
		}
	}
}

impl fmt::Display for Opcode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// One RPC command. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
	#[serde(rename = "Opcode")]
	opcode: Opcode,
	#[serde(rename = "Space")]
	space: &'static str,
	#[serde(rename = "Operands", skip_serializing_if = "Vec::is_empty")]
	operands: Vec<String>,
}

impl Command {
	pub fn new(opcode: Opcode) -> Self {
		Command { opcode, space: SPACE, operands: Vec::new() }
	}

	pub fn with_operands<I, S>(opcode: Opcode, operands: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Command { opcode, space: SPACE, operands: operands.into_iter().map(Into::into).collect() }
	}

	pub fn device_list() -> Self {
		Command::new(Opcode::DeviceList)
	}

	pub fn attach(device: &str) -> Self {
		Command::with_operands(Opcode::Attach, [device])
	}

	pub fn name(app_name: &str) -> Self {
		Command::with_operands(Opcode::Name, [app_name])
	}

	pub fn info() -> Self {
		Command::new(Opcode::Info)
	}

	pub fn list(path: &str) -> Self {
		Command::with_operands(Opcode::List, [path])
	}

	pub fn make_dir(path: &str) -> Self {
		Command::with_operands(Opcode::MakeDir, [path])
	}

	/// `PutFile` announces the size as uppercase hex; the data follows as raw binary frames
	pub fn put_file(path: &str, size: u64) -> Self {
		Command::with_operands(Opcode::PutFile, [path.to_string(), format!("{:X}", size)])
	}

	pub fn remove(path: &str) -> Self {
		Command::with_operands(Opcode::Remove, [path])
	}

	pub fn opcode(&self) -> Opcode {
		self.opcode
	}

	pub fn operands(&self) -> &[String] {
		&self.operands
	}

	pub fn expects_reply(&self) -> bool {
		self.opcode.expects_reply()
	}

	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}

/// Outcome of sending one command
///
/// Fire-and-forget commands yield `Results` with an empty list as soon as
/// they are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	Results(Vec<String>),
	Timeout,
	Closed,
}

impl Reply {
	pub fn is_ok(&self) -> bool {
		matches!(self, Reply::Results(_))
	}
}

#[derive(Deserialize)]
struct ReplyFrame {
	#[serde(rename = "Results", default)]
	results: Vec<serde_json::Value>,
}

/// Parse the text of a reply frame into its result strings
///
/// Non-string values are kept in their JSON text form.
pub fn parse_results(text: &str) -> Result<Vec<String>, serde_json::Error> {
	let frame: ReplyFrame = serde_json::from_str(text)?;
	Ok(frame
		.results
		.into_iter()
		.map(|v| match v {
			serde_json::Value::String(s) => s,
			other => other.to_string(),
		})
		.collect())
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
	pub name: String,
	pub is_dir: bool,
}

/// Snapshot of one remote directory at the moment it was listed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
	pub entries: Vec<RemoteEntry>,
}

impl RemoteListing {
	/// Build a listing from interleaved `(type_flag, name)` results
	///
	/// `.` and `..` are dropped; a dangling flag without a name is ignored.
	pub fn from_results(results: &[String]) -> Self {
		let entries = results
			.chunks_exact(2)
			.filter(|pair| pair[1] != "." && pair[1] != "..")
			.map(|pair| RemoteEntry { name: pair[1].clone(), is_dir: pair[0] == DIR_FLAG })
			.collect();
		RemoteListing { entries }
	}

	pub fn dir_names(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().filter(|e| e.is_dir).map(|e| e.name.as_str())
	}

	pub fn file_names(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().filter(|e| !e.is_dir).map(|e| e.name.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}


// vim: ts=4

//! Error types for romsync operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::protocol::{Opcode, ProtocolError};

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Failed to reach or identify to the daemon
	ConnectionFailed { location: String, source: Box<dyn Error + Send + Sync> },

	/// A reply-expecting command the walk depends on got no answer
	CommandTimeout { opcode: Opcode, path: String },

	/// Operation targets a protected root path; nothing was sent
	SafetyViolation { path: String },

	/// A folder is needed where the device has a file of the same name
	NotADirectory { path: String },

	/// A file could not be transferred within the allowed attempts
	UploadFailed { path: String, attempts: u32, message: String },

	/// Invalid configuration
	InvalidConfig { message: String },

	/// I/O error
	Io(io::Error),

	/// Operation cancelled by the caller
	Aborted,

	/// Connection error (nested)
	Connection(ConnectionError),

	/// Protocol error (nested)
	Protocol(ProtocolError),

	/// Generic error message
	Other { message: String },
}

impl SyncError {
	/// Whether the device link is gone and must be re-established
	pub fn is_connection_loss(&self) -> bool {
		matches!(
			self,
			SyncError::Connection(ConnectionError::Disconnected)
				| SyncError::Protocol(ProtocolError::Closed)
		)
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::ConnectionFailed { location, source } => {
				write!(f, "Failed to connect to {}: {}", location, source)
			}
			SyncError::CommandTimeout { opcode, path } => {
				write!(f, "{} {} timed out", opcode, path)
			}
			SyncError::SafetyViolation { path } => {
				write!(f, "Refusing to write to protected path {}", path)
			}
			SyncError::NotADirectory { path } => {
				write!(f, "{} exists on the device as a file", path)
			}
			SyncError::UploadFailed { path, attempts, message } => {
				write!(f, "Upload of {} failed after {} attempt(s): {}", path, attempts, message)
			}
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Aborted => write!(f, "Operation cancelled"),
			SyncError::Connection(e) => write!(f, "Connection error: {}", e),
			SyncError::Protocol(e) => write!(f, "Protocol error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<ConnectionError> for SyncError {
	fn from(e: ConnectionError) -> Self {
		SyncError::Connection(e)
	}
}

impl From<ProtocolError> for SyncError {
	fn from(e: ProtocolError) -> Self {
		SyncError::Protocol(e)
	}
}

/// Connection-specific errors
#[derive(Debug)]
pub enum ConnectionError {
	/// Socket could not be opened within the connect timeout
	ConnectTimeout { endpoint: String },

	/// WebSocket handshake or socket failure
	WebSocket { endpoint: String, message: String },

	/// App identification failed
	HandshakeFailed { message: String },

	/// Daemon reports no attached hardware
	NoDevice,

	/// Connection disconnected unexpectedly
	Disconnected,
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::ConnectTimeout { endpoint } => {
				write!(f, "Timed out connecting to {}", endpoint)
			}
			ConnectionError::WebSocket { endpoint, message } => {
				write!(f, "WebSocket connection to {} failed: {}", endpoint, message)
			}
			ConnectionError::HandshakeFailed { message } => {
				write!(f, "Handshake failed: {}", message)
			}
			ConnectionError::NoDevice => write!(f, "No device found"),
			ConnectionError::Disconnected => write!(f, "Connection disconnected"),
		}
	}
}

impl Error for ConnectionError {}


// vim: ts=4

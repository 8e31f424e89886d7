//! Protocol error types
//!
//! Errors raised while framing commands or moving bytes over the device
//! socket, with automatic conversions from the underlying error types.

use std::fmt;
use std::io;

use tokio_tungstenite::tungstenite;

/// Protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// I/O error from async operations
	Io(io::Error),
	/// JSON encode/decode error
	Json(String),
	/// WebSocket layer error
	WebSocket(String),
	/// Socket was found closed before or while sending
	Closed,
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
			ProtocolError::Json(msg) => write!(f, "JSON error: {}", msg),
			ProtocolError::WebSocket(msg) => write!(f, "WebSocket error: {}", msg),
			ProtocolError::Closed => write!(f, "Socket closed"),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Io(e)
	}
}

impl From<serde_json::Error> for ProtocolError {
	fn from(e: serde_json::Error) -> Self {
		ProtocolError::Json(e.to_string())
	}
}

impl From<tungstenite::Error> for ProtocolError {
	fn from(e: tungstenite::Error) -> Self {
		match e {
			tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
				ProtocolError::Closed
			}
			tungstenite::Error::Io(io) => ProtocolError::Io(io),
			other => ProtocolError::WebSocket(other.to_string()),
		}
	}
}


// vim: ts=4

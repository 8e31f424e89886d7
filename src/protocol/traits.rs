//! Transport trait the device session is written against
//!
//! The session and the tree walk depend only on this trait, so the
//! WebSocket client can be swapped for a scripted device in tests.

use async_trait::async_trait;
use std::time::Duration;

use super::error::ProtocolError;
use super::types::{Command, Reply};
use crate::error::ConnectionError;

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// One persistent, strictly sequential command channel to the daemon
///
/// The firmware accepts a single command in flight; implementations never
/// pipeline and callers never share one transport between tasks.
#[async_trait]
pub trait Transport: Send {
	/// Open the socket and identify as `app_name`
	///
	/// Fails hard on any connect or handshake error; never retries.
	async fn connect(&mut self, host: &str, port: u16, app_name: &str)
		-> Result<(), ConnectionError>;

	/// Whether the socket is believed open
	fn is_connected(&self) -> bool;

	/// Send one command
	///
	/// Fire-and-forget opcodes return `Reply::Results(vec![])` once written.
	/// Reply-expecting opcodes wait up to `timeout` (or the opcode default)
	/// and yield `Reply::Timeout` instead of failing. A closed socket marks
	/// the transport disconnected and yields `Reply::Closed`.
	async fn send(&mut self, command: &Command, timeout: Option<Duration>) -> Reply;

	/// Write one raw binary frame (file payload after `PutFile`)
	async fn send_binary(&mut self, data: &[u8]) -> ProtocolResult<()>;

	/// Close the socket if open and clear connection state. Never fails.
	async fn disconnect(&mut self);
}

// vim: ts=4

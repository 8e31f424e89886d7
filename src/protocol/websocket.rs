//! WebSocket transport to the device daemon

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::error::ProtocolError;
use super::traits::{ProtocolResult, Transport};
use super::types::{parse_results, Command, Opcode, Reply};
use crate::config::Timings;
use crate::error::ConnectionError;
use crate::logging::*;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent WebSocket connection speaking the JSON command protocol
pub struct WsTransport {
	stream: Option<WsStream>,
	connected: bool,
	connect_timeout: Duration,
	name_settle: Duration,
	close_grace: Duration,
	late_reply_grace: Duration,
	// Replies to commands that timed out; the daemon may still send them
	owed_replies: usize,
}

impl WsTransport {
	pub fn new() -> Self {
		Self::with_timings(&Timings::default())
	}

	pub fn with_timings(timings: &Timings) -> Self {
		WsTransport {
			stream: None,
			connected: false,
			connect_timeout: timings.connect(),
			name_settle: timings.name_settle(),
			close_grace: timings.close_grace(),
			late_reply_grace: timings.late_reply_grace(),
			owed_replies: 0,
		}
	}

	fn mark_closed(&mut self) {
		if self.connected {
			debug!("Socket closed, marking connection down");
		}
		self.connected = false;
		self.stream = None;
		self.owed_replies = 0;
	}

	/// Drain replies still owed to commands that timed out
	///
	/// Replies carry no correlation id, so a late one would otherwise be read
	/// as the answer to the next command. Returns false if the socket closed.
	async fn skip_late_replies(&mut self) -> bool {
		while self.owed_replies > 0 {
			let stream = match self.stream.as_mut() {
				Some(stream) => stream,
				None => return false,
			};
			match tokio::time::timeout(self.late_reply_grace, stream.next()).await {
				Err(_) => {
					debug!("{} late reply(ies) never arrived", self.owed_replies);
					self.owed_replies = 0;
				}
				Ok(Some(Ok(Message::Text(text)))) => {
					debug!("Discarding late reply {}", text.as_str());
					self.owed_replies -= 1;
				}
				Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => {
					self.mark_closed();
					return false;
				}
				Ok(Some(Ok(_))) => {}
			}
		}
		true
	}

	async fn read_reply(&mut self, opcode: Opcode, wait: Duration) -> Reply {
		let deadline = tokio::time::Instant::now() + wait;
		loop {
			let stream = match self.stream.as_mut() {
				Some(stream) => stream,
				None => return Reply::Closed,
			};
			let next = match tokio::time::timeout_at(deadline, stream.next()).await {
				Ok(next) => next,
				Err(_) => {
					warn!("{} got no reply within {:?}", opcode, wait);
					self.owed_replies += 1;
					return Reply::Timeout;
				}
			};
			match next {
				Some(Ok(Message::Text(text))) => match parse_results(&text) {
					Ok(results) => {
						debug!("{} -> {} result(s)", opcode, results.len());
						return Reply::Results(results);
					}
					Err(e) => warn!("Ignoring malformed reply to {}: {}", opcode, e),
				},
				Some(Ok(Message::Close(frame))) => {
					debug!("Daemon closed the socket: {:?}", frame);
					self.mark_closed();
					return Reply::Closed;
				}
				Some(Ok(_)) => continue,
				Some(Err(e)) => {
					warn!("Socket error while waiting for {}: {}", opcode, e);
					self.mark_closed();
					return Reply::Closed;
				}
				None => {
					self.mark_closed();
					return Reply::Closed;
				}
			}
		}
	}
}

impl Default for WsTransport {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Transport for WsTransport {
	async fn connect(
		&mut self,
		host: &str,
		port: u16,
		app_name: &str,
	) -> Result<(), ConnectionError> {
		self.disconnect().await;

		let endpoint = format!("ws://{}:{}", host, port);
		debug!("Connecting to {}", endpoint);
		let stream = match tokio::time::timeout(self.connect_timeout, connect_async(endpoint.as_str()))
			.await
		{
			Ok(Ok((stream, _response))) => stream,
			Ok(Err(e)) => {
				return Err(ConnectionError::WebSocket { endpoint, message: e.to_string() })
			}
			Err(_) => return Err(ConnectionError::ConnectTimeout { endpoint }),
		};
		self.stream = Some(stream);
		self.connected = true;

		// The daemon binds the app identity before it will process anything else
		if !self.send(&Command::name(app_name), None).await.is_ok() {
			self.mark_closed();
			return Err(ConnectionError::HandshakeFailed {
				message: format!("could not identify as {} to {}", app_name, endpoint),
			});
		}
		tokio::time::sleep(self.name_settle).await;

		info!("Connected to {} as {}", endpoint, app_name);
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected && self.stream.is_some()
	}

	async fn send(&mut self, command: &Command, timeout: Option<Duration>) -> Reply {
		if !self.is_connected() {
			self.mark_closed();
			return Reply::Closed;
		}
		let text = match command.to_json() {
			Ok(text) => text,
			Err(e) => {
				error!("Cannot encode {} command: {}", command.opcode(), e);
				return Reply::Closed;
			}
		};
		if command.expects_reply() && !self.skip_late_replies().await {
			return Reply::Closed;
		}
		let stream = match self.stream.as_mut() {
			Some(stream) => stream,
			None => return Reply::Closed,
		};

		debug!("-> {} {:?}", command.opcode(), command.operands());
		let sent = stream.send(Message::Text(text.into())).await;
		if let Err(e) = sent {
			warn!("Sending {} failed: {}", command.opcode(), e);
			self.mark_closed();
			return Reply::Closed;
		}

		if !command.expects_reply() {
			return Reply::Results(Vec::new());
		}
		let wait = timeout.unwrap_or_else(|| command.opcode().default_timeout());
		self.read_reply(command.opcode(), wait).await
	}

	async fn send_binary(&mut self, data: &[u8]) -> ProtocolResult<()> {
		if !self.is_connected() {
			return Err(ProtocolError::Closed);
		}
		let stream = match self.stream.as_mut() {
			Some(stream) => stream,
			None => return Err(ProtocolError::Closed),
		};
		let sent = stream.send(Message::Binary(data.to_vec().into())).await;
		if let Err(e) = sent {
			self.mark_closed();
			return Err(e.into());
		}
		Ok(())
	}

	async fn disconnect(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			if self.connected {
				if let Err(e) = stream.close(None).await {
					debug!("Close frame not delivered: {}", e);
				}
				tokio::time::sleep(self.close_grace).await;
			}
		}
		self.connected = false;
		self.owed_replies = 0;
	}
}


// vim: ts=4

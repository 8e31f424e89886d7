//! Device-control protocol layer
//!
//! JSON commands framed over a persistent WebSocket to the usb2snes-style
//! daemon that bridges to the flashcart.
//!
//! # Example Usage
//!
//! ```ignore
//! use romsync::protocol::{Command, Reply, Transport, WsTransport};
//!
//! let mut transport = WsTransport::new();
//! transport.connect("localhost", 23074, "romsync").await?;
//! if let Reply::Results(devices) = transport.send(&Command::device_list(), None).await {
//!     println!("{:?}", devices);
//! }
//! ```

pub mod error;
pub mod traits;
pub mod types;
pub mod websocket;

pub use error::ProtocolError;
pub use traits::{ProtocolResult, Transport};
pub use types::{Command, Opcode, RemoteEntry, RemoteListing, Reply};
pub use websocket::WsTransport;

// vim: ts=4

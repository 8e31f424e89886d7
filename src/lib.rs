//! # romsync - Mirror a local ROM collection onto a flashcart
//!
//! romsync talks to a usb2snes-style WebSocket daemon and copies new and
//! modified ROM files from a local directory tree to a folder on the
//! flashcart's SD card. The firmware drops the connection when asked about
//! a path that does not exist, so the remote tree is only ever explored
//! top-down from listings that have just confirmed each directory.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use romsync::{CallbackBuilder, SyncConfig, SyncManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let callbacks = CallbackBuilder::new()
//!         .on_progress(|line| println!("{}", line))
//!         .on_error(|line| eprintln!("{}", line))
//!         .build();
//!     let mut manager = SyncManager::new(SyncConfig::default(), callbacks);
//!     let report = manager.sync("./roms", 0.0, false).await;
//!     println!("{}", report.summary());
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod sync;
pub mod sync_impl;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use callbacks::{CallbackBuilder, NoCallbacks, SyncCallbacks};
pub use config::{ConfigStore, MemoryConfigStore, SyncConfig, Timings, TomlConfigStore};
pub use error::{ConnectionError, SyncError};
pub use protocol::{ProtocolError, Transport, WsTransport};
pub use sync::{ManagerState, SyncManager};
pub use types::{FailedUpload, SyncCounters, SyncReport, SyncStatus, SyncTask};

// vim: ts=4

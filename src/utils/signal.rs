//! Signal handlers for graceful termination
//!
//! The first SIGINT/SIGTERM cancels the running sync, which stops at its
//! next file or folder boundary and closes the connection. A second signal
//! exits immediately.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancel `token` on the first termination signal, exit on the second
pub fn setup_signal_handlers(token: CancellationToken) {
	tokio::spawn(async move {
		let code = match wait_for_signal().await {
			Some(code) => code,
			None => return,
		};
		debug!("Received termination signal, cancelling sync...");
		eprintln!("\nCancelling after the current file (press Ctrl-C again to abort)");
		token.cancel();

		if wait_for_signal().await.is_some() {
			std::process::exit(code);
		}
	});
}

/// Wait for SIGTERM or SIGINT, returning the conventional exit code
#[cfg(unix)]
async fn wait_for_signal() -> Option<i32> {
	use tokio::signal;

	let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
			return None;
		}
	};

	let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
			return None;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => Some(143), // 128 + SIGTERM(15)
		_ = sigint.recv() => Some(130), // 128 + SIGINT(2)
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<i32> {
	match tokio::signal::ctrl_c().await {
		Ok(()) => Some(130),
		Err(e) => {
			warn!("Failed to setup Ctrl-C handler: {}", e);
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_handler_leaves_token_untouched_without_signal() {
		let token = CancellationToken::new();
		setup_signal_handlers(token.clone());
		tokio::task::yield_now().await;
		assert!(!token.is_cancelled());
	}
}

// vim: ts=4

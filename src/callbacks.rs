//! Observer traits for progress reporting and connection events
//!
//! Observers are supplied when a [`SyncManager`](crate::sync::SyncManager)
//! is built and are invoked from the task driving the sync run; hosts with
//! a UI thread marshal the calls themselves.

type TextFn = dyn Fn(&str) + Send + Sync;
type EventFn = dyn Fn() + Send + Sync;

/// Combined callback handler for all sync events
pub trait SyncCallbacks: Send + Sync {
	/// Human-readable progress line
	fn on_progress(&self, _text: &str) {}

	/// Human-readable error line (non-fatal and fatal alike)
	fn on_error(&self, _text: &str) {}

	/// Connected to the daemon and attached to a device
	fn on_connected(&self) {}

	/// Connection closed
	fn on_disconnected(&self) {}
}

/// Default callback implementation that does nothing
pub struct NoCallbacks;

impl SyncCallbacks for NoCallbacks {}

/// Builder for callbacks using function closures
pub struct CallbackBuilder {
	progress: Option<Box<TextFn>>,
	error: Option<Box<TextFn>>,
	connected: Option<Box<EventFn>>,
	disconnected: Option<Box<EventFn>>,
}

impl CallbackBuilder {
	/// Create a new callback builder
	pub fn new() -> Self {
		CallbackBuilder { progress: None, error: None, connected: None, disconnected: None }
	}

	/// Set progress callback
	pub fn on_progress<F>(mut self, callback: F) -> Self
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		self.progress = Some(Box::new(callback));
		self
	}

	/// Set error callback
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		self.error = Some(Box::new(callback));
		self
	}

	/// Set connected callback
	pub fn on_connected<F>(mut self, callback: F) -> Self
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.connected = Some(Box::new(callback));
		self
	}

	/// Set disconnected callback
	pub fn on_disconnected<F>(mut self, callback: F) -> Self
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.disconnected = Some(Box::new(callback));
		self
	}

	/// Build the callbacks handler
	pub fn build(self) -> Box<dyn SyncCallbacks> {
		Box::new(CompositeCallbacks {
			progress: self.progress,
			error: self.error,
			connected: self.connected,
			disconnected: self.disconnected,
		})
	}
}

impl Default for CallbackBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct CompositeCallbacks {
	progress: Option<Box<TextFn>>,
	error: Option<Box<TextFn>>,
	connected: Option<Box<EventFn>>,
	disconnected: Option<Box<EventFn>>,
}

impl SyncCallbacks for CompositeCallbacks {
	fn on_progress(&self, text: &str) {
		if let Some(ref callback) = self.progress {
			callback(text);
		}
	}

	fn on_error(&self, text: &str) {
		if let Some(ref callback) = self.error {
			callback(text);
		}
	}

	fn on_connected(&self) {
		if let Some(ref callback) = self.connected {
			callback();
		}
	}

	fn on_disconnected(&self) {
		if let Some(ref callback) = self.disconnected {
			callback();
		}
	}
}


// vim: ts=4

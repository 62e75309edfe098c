//! Device collaborators used by the flows.
//!
//! Navigation and haptic feedback are owned by the host application. The
//! headless implementation logs instead, which is what the CLI uses.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Moves the user between screens.
pub trait Navigator: Send + Sync {
	/// Returns to the home screen once transactions are broadcast.
	fn navigate_home(&self);
	/// Pops the current screen, e.g. after the PIN prompt resolves.
	fn navigate_back(&self);
}

/// Haptic feedback.
pub trait Haptics: Send + Sync {
	/// Signals that an action failed before anything was broadcast.
	fn vibrate_error(&self);
}

/// Navigator and haptics for runs without a UI.
///
/// Counts calls so callers can assert on them.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
	home: AtomicUsize,
	back: AtomicUsize,
	vibrations: AtomicUsize,
}

impl HeadlessDevice {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn home_count(&self) -> usize {
		self.home.load(Ordering::SeqCst)
	}

	pub fn back_count(&self) -> usize {
		self.back.load(Ordering::SeqCst)
	}

	pub fn vibration_count(&self) -> usize {
		self.vibrations.load(Ordering::SeqCst)
	}
}

impl Navigator for HeadlessDevice {
	fn navigate_home(&self) {
		self.home.fetch_add(1, Ordering::SeqCst);
		tracing::debug!("Navigating home");
	}

	fn navigate_back(&self) {
		self.back.fetch_add(1, Ordering::SeqCst);
		tracing::debug!("Navigating back");
	}
}

impl Haptics for HeadlessDevice {
	fn vibrate_error(&self) {
		self.vibrations.fetch_add(1, Ordering::SeqCst);
		tracing::debug!("Error haptic feedback");
	}
}

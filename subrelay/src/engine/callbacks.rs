// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::fmt::{Debug, Formatter};
use crate::SubbufferId;

type FullFn = Box<dyn Fn(SubbufferId) + Send + Sync>;
type LevelFn = Box<dyn Fn() + Send + Sync>;

/// Notifications fired by an [`Engine`](super::Engine). Callbacks run on the
/// producer or consumer thread that caused them, after every engine lock is
/// released, so they may call back into the engine.
#[derive(Default)]
pub struct Callbacks {
	on_full: Option<FullFn>,
	on_low: Option<LevelFn>,
	on_high: Option<LevelFn>,
}

impl Callbacks {
	pub fn new() -> Self { Self::default() }

	/// Sets the callback fired when a subbuffer fills and moves to the read queue.
	pub fn on_full(mut self, f: impl Fn(SubbufferId) + Send + Sync + 'static) -> Self {
		self.on_full = Some(Box::new(f));
		self
	}

	/// Sets the callback fired when the engine pauses.
	pub fn on_low(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_low = Some(Box::new(f));
		self
	}

	/// Sets the callback fired when the engine resumes.
	pub fn on_high(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_high = Some(Box::new(f));
		self
	}

	pub(crate) fn full(&self, id: SubbufferId) {
		if let Some(ref f) = self.on_full { f(id) }
	}

	pub(crate) fn low(&self) {
		if let Some(ref f) = self.on_low { f() }
	}

	pub(crate) fn high(&self) {
		if let Some(ref f) = self.on_high { f() }
	}
}

impl Debug for Callbacks {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callbacks")
			.field("on_full", &self.on_full.is_some())
			.field("on_low", &self.on_low.is_some())
			.field("on_high", &self.on_high.is_some())
			.finish()
	}
}

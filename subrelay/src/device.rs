// SPDX-License-Identifier: Apache-2.0

mod control;
pub mod notify;
mod splice;

pub use control::{ATTRIBUTES, Command, MessageHandler, Reply};
pub use splice::Spliced;

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{AcqRel, Release};
use std::thread;
use std::thread::Thread;
use log::info;
use spin::Mutex;
use notify::{Notification, Notifier, NullNotifier};
use crate::{Callbacks, Engine, EngineOptions, SubbufferId};
use crate::error::{Error, ErrorKind, MapOp, OperationKind, Result};
use crate::error::ErrorKind::{BadSize, Interrupted, NoReadable, Stopped, WouldBlock};
use crate::error::OperationKind::{Disable, Enable, Read, Splice};

fn error(op: OperationKind, kind: ErrorKind) -> Error {
	(op, kind).into()
}

/// Options for a [`Device`]: the engine it enables and how reads wait.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceOptions {
	pub engine: EngineOptions,
	/// Fail reads with [`WouldBlock`](ErrorKind::WouldBlock) instead of waiting.
	pub nonblocking: bool,
}

impl DeviceOptions {
	/// Creates a new set of device options.
	pub const fn new() -> Self {
		Self {
			engine: EngineOptions::new(),
			nonblocking: false,
		}
	}

	/// Sets the engine options.
	#[inline]
	pub const fn with_engine(mut self, value: EngineOptions) -> Self {
		self.engine = value;
		self
	}

	/// Sets non-blocking mode.
	#[inline]
	pub const fn with_nonblocking(mut self, value: bool) -> Self {
		self.nonblocking = value;
		self
	}
}

/// Parks the consumer thread until data arrives, a wake, or an interrupt.
#[derive(Debug, Default)]
struct Waiter {
	reader: Mutex<Option<Thread>>,
	woken: AtomicBool,
	interrupted: AtomicBool,
}

impl Waiter {
	/// Unparks the waiting reader, if any. Never blocks, so producers can call it.
	fn notify(&self) {
		if let Some(ref reader) = *self.reader.lock() {
			reader.unpark();
		}
	}

	fn wake(&self) {
		self.woken.store(true, Release);
		self.notify();
	}

	fn interrupt(&self) {
		self.interrupted.store(true, Release);
		self.notify();
	}

	fn take_woken(&self) -> bool { self.woken.swap(false, AcqRel) }
	fn take_interrupted(&self) -> bool { self.interrupted.swap(false, AcqRel) }

	fn register(&self) {
		*self.reader.lock() = Some(thread::current());
	}

	fn unregister(&self) {
		self.reader.lock().take();
	}
}

struct State {
	options: DeviceOptions,
	enabled: bool,
	/// The subbuffer held by the copying read path.
	checkout: Option<SubbufferId>,
}

/// The consumer side of an [`Engine`]: configuration and enabling, blocking
/// reads, zero-copy splicing, and wake-ups. One consumer drives a device at a
/// time; any number of [`Producer`]s write to it.
pub struct Device {
	engine: Arc<Engine>,
	state: Mutex<State>,
	waiter: Arc<Waiter>,
	notifier: Arc<dyn Notifier>,
	handler: Option<Box<dyn MessageHandler>>,
}

impl Default for Device {
	fn default() -> Self { Self::new(DeviceOptions::default()) }
}

impl Debug for Device {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("Device")
			.field("options", &state.options)
			.field("enabled", &state.enabled)
			.field("checkout", &state.checkout)
			.field("engine", &self.engine)
			.finish_non_exhaustive()
	}
}

impl Device {
	/// Creates a new, disabled device.
	pub fn new(options: DeviceOptions) -> Self {
		Self {
			engine: Arc::default(),
			state: Mutex::new(State {
				options,
				enabled: false,
				checkout: None,
			}),
			waiter: Arc::default(),
			notifier: Arc::new(NullNotifier),
			handler: None,
		}
	}

	/// Sets where pause and resume notifications are sent.
	pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
		self.notifier = Arc::new(notifier);
		self
	}

	/// Sets the handler for [`Command::Message`].
	pub fn with_handler(mut self, handler: impl MessageHandler + 'static) -> Self {
		self.handler = Some(Box::new(handler));
		self
	}

	/// Returns a handle producers write records through.
	pub fn producer(&self) -> Producer {
		Producer {
			engine: self.engine.clone(),
			waiter: self.waiter.clone(),
		}
	}

	/// Returns the underlying engine.
	pub fn engine(&self) -> &Arc<Engine> { &self.engine }

	/// Returns the current options.
	pub fn options(&self) -> DeviceOptions { self.state.lock().options }

	/// Returns `true` if the device is enabled.
	pub fn is_enabled(&self) -> bool { self.state.lock().enabled }

	/// Returns the subbuffer held by the copying read path.
	pub fn checked_out(&self) -> Option<SubbufferId> { self.state.lock().checkout }

	/// Sets non-blocking mode.
	pub fn set_nonblocking(&self, value: bool) {
		self.state.lock().options.nonblocking = value;
	}

	/// Allocates the engine's pool and starts accepting writes. Enabling an
	/// enabled device does nothing.
	pub fn enable(&self) -> Result {
		let mut state = self.state.lock();
		if state.enabled { return Ok(()) }

		let waiter = self.waiter.clone();
		let low = self.notifier.clone();
		let high = self.notifier.clone();
		let callbacks = Callbacks::new()
			.on_full(move |_| waiter.notify())
			.on_low (move || low.notify(Notification::Pause))
			.on_high(move || high.notify(Notification::Resume));

		self.engine.init(state.options.engine, callbacks).map_op(Enable)?;
		state.enabled = true;
		info!("device enabled");
		Ok(())
	}

	/// Releases this device's checkout, then stops and frees the engine. Fails,
	/// staying enabled, if a spliced subbuffer is still outstanding.
	pub fn disable(&self) -> Result {
		if !self.is_enabled() {
			return Err(error(Disable, Stopped))
		}

		self.release_checkout().map_op(Disable)?;
		let mut state = self.state.lock();
		if !state.enabled {
			return Err(error(Disable, Stopped))
		}
		self.engine.uninit().map_op(Disable)?;
		state.enabled = false;
		drop(state);

		// A blocked reader finds the engine stopped.
		self.waiter.notify();
		info!("device disabled");
		Ok(())
	}

	/// Reads the next readable subbuffer into `buf`, which must hold at least one
	/// subbuffer. The previous subbuffer read is released first, and the new one
	/// stays checked out until the next read.
	///
	/// With nothing readable, fails with [`WouldBlock`](ErrorKind::WouldBlock) in
	/// non-blocking mode, fails with [`Interrupted`](ErrorKind::Interrupted) after
	/// [`interrupt`](Self::interrupt), or waits. A [`wake`](Self::wake) with still
	/// nothing readable returns `Ok(0)`.
	pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
		{
			let state = self.state.lock();
			if !state.enabled {
				return Err(error(Read, Stopped))
			}
			if buf.len() < state.options.engine.subbuffer_size {
				return Err(error(Read, BadSize))
			}
		}
		self.release_checkout().map_op(Read)?;

		let Some(id) = self.wait_readable(Read)? else { return Ok(0) };
		let copied = self.engine.with_data(id, |data| {
			buf[..data.len()].copy_from_slice(data);
			data.len()
		});
		match copied {
			Ok(len) => {
				self.state.lock().checkout = Some(id);
				Ok(len)
			}
			Err(err) => {
				let _ = self.engine.release(id);
				Err(err.with_operation(Read))
			}
		}
	}

	/// Hands the next readable subbuffer's memory to the caller without copying.
	/// Waits like [`read`](Self::read); a wake with nothing readable returns
	/// `Ok(None)`.
	pub fn splice(&self) -> Result<Option<Spliced>> {
		if !self.is_enabled() {
			return Err(error(Splice, Stopped))
		}
		self.release_checkout().map_op(Splice)?;

		let Some(id) = self.wait_readable(Splice)? else { return Ok(None) };
		match Spliced::new(self.engine.clone(), id) {
			Ok(spliced) => Ok(Some(spliced)),
			Err(err) => {
				let _ = self.engine.release(id);
				Err(err)
			}
		}
	}

	/// Wakes a blocked read, which returns empty if nothing became readable.
	pub fn wake(&self) { self.waiter.wake() }

	/// Interrupts a blocked read, or the next read that would block.
	pub fn interrupt(&self) { self.waiter.interrupt() }

	/// Releases the subbuffer held by the copying read path. The device lock is
	/// not held while releasing, since a release can fire the notifier.
	fn release_checkout(&self) -> Result {
		let Some(id) = self.state.lock().checkout.take() else { return Ok(()) };
		self.engine.release(id).map_err(|err| {
			self.state.lock().checkout.get_or_insert(id);
			err
		})
	}

	fn wait_readable(&self, op: OperationKind) -> Result<Option<SubbufferId>> {
		// Registered before the first check, so a notification racing it leaves an
		// unpark token behind instead of getting lost.
		self.waiter.register();
		let result = loop {
			match self.engine.get() {
				Ok(id) => {
					// A wake that raced data in is spent on this read.
					self.waiter.take_woken();
					break Ok(Some(id))
				}
				Err(err) if err.kind() == NoReadable => { }
				Err(err) => break Err(err.with_operation(op)),
			}

			if self.state.lock().options.nonblocking {
				break Err(error(op, WouldBlock))
			}
			if self.waiter.take_interrupted() {
				break Err(error(op, Interrupted))
			}
			if self.waiter.take_woken() {
				break Ok(None)
			}

			thread::park();
		};
		self.waiter.unregister();
		result
	}
}

/// A cloneable handle for writing records to a [`Device`].
#[derive(Clone)]
pub struct Producer {
	engine: Arc<Engine>,
	waiter: Arc<Waiter>,
}

impl Producer {
	/// Writes a record, optionally waking the consumer as [`Device::wake`] does.
	/// Never blocks.
	pub fn write(&self, data: &[u8], wake_consumer: bool) -> Result<usize> {
		let written = self.engine.write(data)?;
		if wake_consumer {
			self.waiter.wake();
		}
		Ok(written)
	}

	/// Returns the underlying engine.
	pub fn engine(&self) -> &Arc<Engine> { &self.engine }
}

impl Debug for Producer {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Producer").finish_non_exhaustive()
	}
}

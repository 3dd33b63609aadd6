// SPDX-License-Identifier: Apache-2.0

use log::debug;
use crate::error::{Error, ErrorBox, MapOp, Result};
use crate::error::ErrorKind::{Enabled, Stopped, Unsupported};
use crate::error::OperationKind::{Advance, Attribute, Configure, Message};
use super::{Device, error};

/// The device's attribute keys.
pub const ATTRIBUTES: [&str; 3] = ["enabled", "subbuffer_size", "subbuffer_count"];

/// A control command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
	/// Sets the subbuffer size and count. Rejected while enabled.
	Configure {
		subbuffer_size: usize,
		subbuffer_count: usize,
	},
	/// Allocates the pool and starts accepting writes.
	Enable,
	/// Stops and frees the pool.
	Disable,
	/// Releases the checked-out subbuffer and checks out the next readable one.
	Advance,
	/// Makes every partially-filled subbuffer readable.
	Flush,
	/// Passes a message to the device's [`MessageHandler`].
	Message(Vec<u8>),
	/// Wakes a blocked read.
	Wake,
}

/// The result of a control command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
	Done,
	/// The number of subbuffers a flush made readable.
	Flushed(usize),
	/// The message handler's response.
	Message(Vec<u8>),
}

/// Handles [`Command::Message`] payloads, which the device passes through
/// without interpreting.
pub trait MessageHandler: Send + Sync {
	fn handle(&self, message: &[u8]) -> std::result::Result<Vec<u8>, ErrorBox>;
}

impl<F> MessageHandler for F
where F: Fn(&[u8]) -> std::result::Result<Vec<u8>, ErrorBox> + Send + Sync {
	fn handle(&self, message: &[u8]) -> std::result::Result<Vec<u8>, ErrorBox> {
		self(message)
	}
}

impl Device {
	/// Runs a control command.
	pub fn control(&self, command: Command) -> Result<Reply> {
		debug!("control command {command:?}");
		match command {
			Command::Configure { subbuffer_size, subbuffer_count } => {
				self.configure(subbuffer_size, subbuffer_count)?;
			}
			Command::Enable => self.enable()?,
			Command::Disable => self.disable()?,
			Command::Advance => self.advance()?,
			Command::Flush => return self.flush().map(Reply::Flushed),
			Command::Message(message) => return self.message(&message).map(Reply::Message),
			Command::Wake => self.wake(),
		}
		Ok(Reply::Done)
	}

	/// Sets the subbuffer size and count used by the next enable.
	pub fn configure(&self, subbuffer_size: usize, subbuffer_count: usize) -> Result {
		let mut state = self.state.lock();
		if state.enabled {
			return Err(error(Configure, Enabled))
		}

		let engine = state.options.engine
			.with_subbuffer_size(subbuffer_size)
			.with_subbuffer_count(subbuffer_count);
		engine.validate().map_err(|reason| Error::config(Configure, reason))?;
		state.options.engine = engine;
		Ok(())
	}

	/// Releases the checked-out subbuffer, if any, and checks out the next
	/// readable one without waiting.
	pub fn advance(&self) -> Result {
		if !self.is_enabled() {
			return Err(error(Advance, Stopped))
		}

		self.release_checkout().map_op(Advance)?;
		let id = self.engine.get().map_op(Advance)?;
		self.state.lock().checkout = Some(id);
		Ok(())
	}

	/// Flushes partially-filled subbuffers to the read queue and wakes the reader
	/// if any became readable.
	pub fn flush(&self) -> Result<usize> {
		let count = self.engine.flush()?;
		if count > 0 {
			self.waiter.notify();
		}
		Ok(count)
	}

	fn message(&self, message: &[u8]) -> Result<Vec<u8>> {
		let Some(ref handler) = self.handler else {
			return Err(error(Message, Unsupported))
		};
		handler.handle(message).map_err(|err|
			Error::other(Message, "message handler failed", Some(err))
		)
	}

	/// Reads an attribute.
	pub fn attr(&self, key: &str) -> Result<String> {
		let state = self.state.lock();
		let engine = &state.options.engine;
		let value = match key {
			"enabled"         => u8::from(state.enabled).to_string(),
			"subbuffer_size"  => engine.subbuffer_size.to_string(),
			"subbuffer_count" => engine.subbuffer_count.to_string(),
			_ => return Err(error(Attribute, Unsupported))
		};
		Ok(value)
	}

	/// Writes an attribute. Writing `enabled` enables or disables the device; the
	/// other attributes are rejected while enabled.
	pub fn set_attr(&self, key: &str, value: &str) -> Result {
		let parse = || value.trim().parse::<usize>().map_err(|_|
			Error::config(Attribute, "attribute value is not a number")
		);

		match key {
			"enabled" => match value.trim() {
				"1" => self.enable(),
				"0" => self.disable(),
				_ => Err(Error::config(Attribute, "enabled must be 0 or 1"))
			},
			"subbuffer_size" => {
				let count = self.options().engine.subbuffer_count;
				self.configure(parse()?, count)
			}
			"subbuffer_count" => {
				let size = self.options().engine.subbuffer_size;
				self.configure(size, parse()?)
			}
			_ => Err(error(Attribute, Unsupported))
		}
	}
}

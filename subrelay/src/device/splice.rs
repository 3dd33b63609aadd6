// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;
use log::warn;
use crate::{Engine, Result, SubbufferId};

/// A checked-out subbuffer whose memory was moved, not copied, to the consumer's
/// transport. Dropping it hands the memory back and releases the subbuffer,
/// exactly once.
pub struct Spliced {
	engine: Arc<Engine>,
	id: SubbufferId,
	data: Option<Box<[u8]>>,
	len: usize,
}

impl Spliced {
	pub(crate) fn new(engine: Arc<Engine>, id: SubbufferId) -> Result<Self> {
		let (data, len) = engine.lend(id)?;
		Ok(Self { engine, id, data: Some(data), len })
	}

	/// Returns the id of the spliced subbuffer.
	pub fn id(&self) -> SubbufferId { self.id }

	/// Returns the spliced bytes.
	pub fn as_slice(&self) -> &[u8] {
		match self.data {
			Some(ref data) => &data[..self.len],
			None => &[]
		}
	}

	/// Releases the subbuffer now, reporting any error rather than logging it on
	/// drop.
	pub fn release(mut self) -> Result {
		self.finish()
	}

	/// Converts into reference-counted [`Bytes`](bytes::Bytes). The subbuffer is
	/// released when the last clone drops.
	#[cfg(feature = "bytes")]
	pub fn into_bytes(self) -> bytes::Bytes {
		bytes::Bytes::from_owner(self)
	}

	fn finish(&mut self) -> Result {
		let Some(data) = self.data.take() else { return Ok(()) };
		self.engine.restore(self.id, data);
		self.engine.release(self.id)
	}
}

impl Deref for Spliced {
	type Target = [u8];
	fn deref(&self) -> &[u8] { self.as_slice() }
}

impl AsRef<[u8]> for Spliced {
	fn as_ref(&self) -> &[u8] { self.as_slice() }
}

impl Drop for Spliced {
	fn drop(&mut self) {
		if let Err(err) = self.finish() {
			warn!("spliced subbuffer {} was not released: {err}", self.id);
		}
	}
}

impl Debug for Spliced {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Spliced")
			.field("id", &self.id)
			.field("len", &self.len)
			.finish_non_exhaustive()
	}
}

// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::io;
use std::io::Read;
use crate::Device;

/// A [`Read`]er over a [`Device`]'s copying read path. Each subbuffer is staged
/// whole, then handed out in as many reads as the caller's buffers need. A device
/// read that returns empty after a wake is end-of-stream.
pub struct DeviceReader<'a> {
	device: &'a Device,
	staging: Vec<u8>,
	pos: usize,
	len: usize,
}

impl<'a> From<&'a Device> for DeviceReader<'a> {
	fn from(device: &'a Device) -> Self {
		Self {
			device,
			staging: Vec::new(),
			pos: 0,
			len: 0,
		}
	}
}

impl DeviceReader<'_> {
	/// Returns the number of staged bytes not yet read.
	pub fn staged(&self) -> usize { self.len - self.pos }

	fn fill(&mut self) -> io::Result<usize> {
		let size = self.device.options().engine.subbuffer_size;
		self.staging.resize(size, 0);
		self.pos = 0;
		self.len = 0;
		self.len = self.device.read(&mut self.staging)?;
		Ok(self.len)
	}
}

impl Read for DeviceReader<'_> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if buf.is_empty() { return Ok(0) }

		if self.staged() == 0 && self.fill()? == 0 {
			return Ok(0)
		}

		let count = min(buf.len(), self.staged());
		buf[..count].copy_from_slice(&self.staging[self.pos..self.pos + count]);
		self.pos += count;
		Ok(count)
	}
}

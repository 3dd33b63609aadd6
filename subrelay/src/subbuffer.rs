// SPDX-License-Identifier: Apache-2.0

use std::collections::TryReserveError;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;
use all_asserts::debug_assert_le;
use spin::{Mutex, MutexGuard};

/// The largest subbuffer size a pool accepts.
pub const MAX_SUBBUFFER_SIZE: usize = 64 * 1024;

/// A stable handle to a subbuffer, its index in the pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SubbufferId(pub(crate) usize);

impl SubbufferId {
	/// Creates an id for the subbuffer at `index`.
	pub const fn new(index: usize) -> Self { Self(index) }

	/// Returns the index of the subbuffer in its pool.
	pub fn index(self) -> usize { self.0 }
}

impl Display for SubbufferId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// The memory of a subbuffer, only reachable through its lock.
pub(crate) struct Block {
	/// The data, or `None` while lent to a transport.
	data: Option<Box<[u8]>>,
	/// The number of bytes written, from `[0,capacity]`.
	filled: usize,
	capacity: usize,
}

impl Block {
	fn alloc(capacity: usize) -> Result<Self, TryReserveError> {
		let mut data = Vec::new();
		data.try_reserve_exact(capacity)?;
		data.resize(capacity, 0);
		Ok(Self {
			data: Some(data.into_boxed_slice()),
			filled: 0,
			capacity,
		})
	}

	pub fn filled(&self) -> usize { self.filled }
	pub fn is_empty(&self) -> bool { self.filled == 0 }
	pub fn is_full (&self) -> bool { self.filled == self.capacity }
	/// Returns the number of bytes that can still be written.
	pub fn limit(&self) -> usize { self.capacity - self.filled }
	pub fn is_lent(&self) -> bool { self.data.is_none() }

	/// Returns the written bytes, empty if lent.
	pub fn data(&self) -> &[u8] {
		match self.data {
			Some(ref data) => &data[..self.filled],
			None => &[]
		}
	}

	/// Returns `true` if `src` overlaps the next `src.len()` bytes to be written.
	pub fn overlaps(&self, src: &[u8]) -> bool {
		let Some(ref data) = self.data else { return false };
		let free = &data[self.filled..];
		let len = src.len().min(free.len());
		ranges_overlap(src.as_ptr_range(), free[..len].as_ptr_range())
	}

	/// Claims `count` bytes of free space, returning their range. The bytes must be
	/// copied in with [`Self::fill`] before the lock is released.
	pub fn reserve(&mut self, count: usize) -> Range<usize> {
		debug_assert_le!(count, self.limit());
		let start = self.filled;
		self.filled += count;
		start..self.filled
	}

	/// Copies `src` into a range claimed by [`Self::reserve`].
	pub fn fill(&mut self, range: Range<usize>, src: &[u8]) {
		if let Some(ref mut data) = self.data {
			data[range].copy_from_slice(src);
		}
	}

	/// Marks the subbuffer empty for reuse.
	pub fn rearm(&mut self) {
		self.filled = 0;
	}

	/// Moves the memory out, leaving the block lent.
	pub fn lend(&mut self) -> Option<Box<[u8]>> {
		self.data.take()
	}

	/// Returns lent memory to the block.
	pub fn restore(&mut self, data: Box<[u8]>) {
		debug_assert!(self.is_lent(), "restored memory into an unlent block");
		debug_assert_eq!(data.len(), self.capacity);
		self.data = Some(data);
	}
}

fn ranges_overlap(a: Range<*const u8>, b: Range<*const u8>) -> bool {
	a.start < b.end && b.start < a.end
}

/// A fixed-capacity chunk of memory with its own lock. The lock serializes
/// appends against retiring the subbuffer to the read queue.
pub(crate) struct Subbuffer {
	block: Mutex<Block>,
}

impl Subbuffer {
	pub fn alloc(capacity: usize) -> Result<Self, TryReserveError> {
		Ok(Self { block: Mutex::new(Block::alloc(capacity)?) })
	}

	pub fn lock(&self) -> MutexGuard<'_, Block> {
		self.block.lock()
	}
}

impl Debug for Subbuffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("Subbuffer");
		match self.block.try_lock() {
			Some(block) => s.field("filled", &block.filled)
							.field("capacity", &block.capacity)
							.field("lent", &block.is_lent()),
			None => s.field("block", &"<locked>")
		};
		s.finish()
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::{Block, ranges_overlap};

	#[test]
	fn reserve_fill() {
		let mut block = Block::alloc(8).unwrap();
		assert!(block.is_empty());
		let range = block.reserve(5);
		block.fill(range.clone(), b"hello");
		assert_eq!(range, 0..5);
		assert_eq!(block.data(), b"hello");
		assert_eq!(block.limit(), 3);

		let range = block.reserve(3);
		block.fill(range, b"!!!");
		assert!(block.is_full());
		assert_eq!(block.data(), b"hello!!!");

		block.rearm();
		assert!(block.is_empty());
		assert_eq!(block.data(), b"");
	}

	#[test]
	fn lend_restore() {
		let mut block = Block::alloc(4).unwrap();
		let range = block.reserve(2);
		block.fill(range, b"ok");
		let data = block.lend().unwrap();
		assert!(block.is_lent());
		assert_eq!(block.data(), b"");
		assert_eq!(&data[..2], b"ok");
		block.restore(data);
		assert_eq!(block.data(), b"ok");
	}

	#[test]
	fn overlap() {
		let buf = [0u8; 16];
		let range = |r: std::ops::Range<usize>| buf[r].as_ptr_range();
		assert!( ranges_overlap(range(0..8), range(4..12)));
		assert!( ranges_overlap(range(4..12), range(0..8)));
		assert!( ranges_overlap(range(0..16), range(6..7)));
		assert!(!ranges_overlap(range(0..8), range(8..16)));
		assert!(!ranges_overlap(range(0..0), range(0..8)));
	}

	#[test]
	fn own_free_region_overlaps() {
		let mut block = Block::alloc(8).unwrap();
		let range = block.reserve(2);
		block.fill(range, b"ab");

		let data = block.data.as_deref().unwrap();
		assert!( block.overlaps(&data[2..6]));
		assert!( block.overlaps(&data[0..4]));
		assert!(!block.overlaps(&data[0..2]), "written bytes are not free");
	}

	#[test]
	fn separate_source_does_not_overlap() {
		let block = Block::alloc(8).unwrap();
		assert!(!block.overlaps(b"record"));
	}
}

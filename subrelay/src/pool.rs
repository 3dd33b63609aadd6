// SPDX-License-Identifier: Apache-2.0

mod busy;
mod queue;

pub(crate) use busy::BusySet;
pub(crate) use queue::Queue;

use std::collections::TryReserveError;
use std::ops::Index;
use amplify_derive::Display;
use itertools::Itertools;
use log::debug;
use crate::{Subbuffer, SubbufferId};
use crate::error::ErrorKind;
use crate::error::ErrorKind::{Lent, NotFound};

#[derive(Clone, Debug, thiserror::Error)]
#[error("failed to allocate {count} subbuffers of {size} bytes")]
pub struct AllocError {
	size: usize,
	count: usize,
	#[source]
	source: TryReserveError,
}

/// Where a subbuffer currently lives.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum Location {
	#[display("write queue")]
	Write,
	#[display("read queue")]
	Read,
	#[display("busy set")]
	Busy,
}

/// A snapshot of how many subbuffers each container holds.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Counts {
	pub write: usize,
	pub read: usize,
	pub busy: usize,
}

impl Counts {
	/// Returns the number of subbuffers across all containers.
	pub fn total(&self) -> usize { self.write + self.read + self.busy }
}

/// A fixed set of equally-sized subbuffers, each held by exactly one of the
/// write queue, read queue, or busy set.
#[derive(Debug)]
pub(crate) struct Pool {
	subbuffers: Vec<Subbuffer>,
	pub write: Queue,
	pub read: Queue,
	pub busy: BusySet,
}

impl Pool {
	/// Allocates `count` subbuffers of `size` bytes, all placed in the write queue.
	/// On failure, anything already allocated is dropped before returning.
	pub fn allocate(size: usize, count: usize) -> Result<Self, AllocError> {
		let error = |source| AllocError { size, count, source };

		let mut subbuffers = Vec::new();
		subbuffers.try_reserve_exact(count).map_err(error)?;
		for _ in 0..count {
			subbuffers.push(Subbuffer::alloc(size).map_err(error)?);
		}

		let pool = Self {
			subbuffers,
			write: Queue::with_capacity(count).map_err(error)?,
			read: Queue::with_capacity(count).map_err(error)?,
			busy: BusySet::with_capacity(count).map_err(error)?,
		};

		{
			let mut write = pool.write.lock();
			(0..count).map(SubbufferId).for_each(|id| write.push(id));
		}

		debug!("allocated {count} subbuffers of {size} bytes");
		Ok(pool)
	}

	/// Frees every subbuffer. The busy set must be empty.
	pub fn free_all(self) {
		debug_assert!(self.busy.is_empty(), "freed a pool with checked-out subbuffers");
		debug!("freed {} subbuffers", self.count());
	}

	/// Returns the number of subbuffers.
	pub fn count(&self) -> usize { self.subbuffers.len() }

	pub fn get(&self, id: SubbufferId) -> Option<&Subbuffer> {
		self.subbuffers.get(id.index())
	}

	pub fn push_read(&self, id: SubbufferId) { self.read.push(id) }

	/// Takes a checked-out subbuffer out of the busy set, re-arms it, and appends
	/// it to the write queue. Fails with [`NotFound`] if it isn't checked out, or
	/// [`Lent`] if its memory hasn't been restored.
	pub fn release(&self, id: SubbufferId) -> Result<(), ErrorKind> {
		let subbuffer = self.get(id).ok_or(NotFound)?;
		let mut write = self.write.lock();
		let mut block = subbuffer.lock();
		if !self.busy.contains(id) {
			return Err(NotFound)
		}
		if block.is_lent() {
			return Err(Lent)
		}
		self.remove_busy(id);
		block.rearm();
		write.push(id);
		Ok(())
	}

	/// Empties every subbuffer in the write queue in place, returning how many
	/// held data.
	pub fn rearm_write(&self) -> usize {
		let write = self.write.lock();
		let mut cleared = 0;
		for &id in write.iter() {
			let mut block = self[id].lock();
			if !block.is_empty() {
				block.rearm();
				cleared += 1;
			}
		}
		cleared
	}

	/// Moves every non-empty subbuffer in the write queue to the read queue,
	/// keeping their order. Returns the number moved.
	pub fn move_all_write_to_read(&self) -> usize {
		let mut write = self.write.lock();
		let mut moved = 0;
		write.retain(|&id| {
			// Waits out any append still copying into this subbuffer.
			let block = self[id].lock();
			if block.is_empty() { return true }
			self.read.push(id);
			moved += 1;
			false
		});
		moved
	}

	/// Moves every subbuffer in the read queue back to the write queue, re-arming
	/// each under its own lock. Returns the number moved.
	pub fn move_all_read_to_write(&self) -> usize {
		let mut write = self.write.lock();
		let mut moved = 0;
		while let Some(id) = self.read.pop() {
			self[id].lock().rearm();
			write.push(id);
			moved += 1;
		}
		moved
	}

	pub fn add_busy(&self, id: SubbufferId) { self.busy.add(id) }

	/// Removes the subbuffer from the busy set, returning `false` if it isn't
	/// there.
	pub fn remove_busy(&self, id: SubbufferId) -> bool { self.busy.remove(id) }

	/// Moves the head of the read queue into the busy set.
	pub fn checkout(&self) -> Option<SubbufferId> {
		let mut read = self.read.lock();
		let id = read.pop()?;
		self.add_busy(id);
		Some(id)
	}

	pub fn counts(&self) -> Counts {
		let write = self.write.lock();
		let read = self.read.lock();
		Counts {
			write: write.len(),
			read: read.len(),
			busy: self.busy.len(),
		}
	}

	pub fn location(&self, id: SubbufferId) -> Option<Location> {
		if self.write.contains(id) {
			Some(Location::Write)
		} else if self.read.contains(id) {
			Some(Location::Read)
		} else if self.busy.contains(id) {
			Some(Location::Busy)
		} else {
			None
		}
	}

	/// Returns the ids of non-empty subbuffers in the write queue.
	pub fn partial_ids(&self) -> Vec<SubbufferId> {
		let write = self.write.lock();
		write.iter()
			.copied()
			.filter(|&id| !self[id].lock().is_empty())
			.collect_vec()
	}
}

impl Index<SubbufferId> for Pool {
	type Output = Subbuffer;

	fn index(&self, id: SubbufferId) -> &Subbuffer {
		&self.subbuffers[id.index()]
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::SubbufferId;
	use crate::error::ErrorKind;
	use super::{Counts, Location, Pool};

	fn write(pool: &Pool, id: SubbufferId, data: &[u8]) {
		let mut block = pool[id].lock();
		let range = block.reserve(data.len());
		block.fill(range, data);
	}

	#[test]
	fn allocate() {
		let pool = Pool::allocate(64, 4).unwrap();
		assert_eq!(pool.count(), 4);
		assert_eq!(pool.counts(), Counts { write: 4, read: 0, busy: 0 });
		assert_eq!(pool.write.ids(), (0..4).map(SubbufferId).collect::<Vec<_>>());
		pool.free_all();
	}

	#[test]
	fn allocate_failure_rolls_back() {
		let err = Pool::allocate(usize::MAX, 2).unwrap_err();
		assert_eq!(
			err.to_string(),
			format!("failed to allocate 2 subbuffers of {} bytes", usize::MAX)
		);
	}

	#[test]
	fn release_rearms() {
		let pool = Pool::allocate(16, 2).unwrap();
		write(&pool, SubbufferId(0), b"abc");
		pool.move_all_write_to_read();
		assert_eq!(pool.location(SubbufferId(0)), Some(Location::Read));

		let id = pool.checkout().unwrap();
		assert_eq!(pool[id].lock().filled(), 3);
		assert_eq!(pool.release(id), Ok(()));
		assert_eq!(pool[id].lock().filled(), 0);
		assert_eq!(pool.write.ids(), [SubbufferId(1), SubbufferId(0)]);
		assert_eq!(pool.release(id), Err(ErrorKind::NotFound));
		assert_eq!(pool.release(SubbufferId(7)), Err(ErrorKind::NotFound));
	}

	#[test]
	fn release_refuses_lent() {
		let pool = Pool::allocate(16, 1).unwrap();
		write(&pool, SubbufferId(0), b"abc");
		pool.move_all_write_to_read();

		let id = pool.checkout().unwrap();
		let data = pool[id].lock().lend().unwrap();
		assert_eq!(pool.release(id), Err(ErrorKind::Lent));
		assert_eq!(pool.location(id), Some(Location::Busy));
		pool[id].lock().restore(data);
		assert_eq!(pool.release(id), Ok(()));
	}

	#[test]
	fn rearm_write_clears_partial() {
		let pool = Pool::allocate(16, 3).unwrap();
		write(&pool, SubbufferId(0), b"stale");
		write(&pool, SubbufferId(2), b"x");
		assert_eq!(pool.rearm_write(), 2);
		assert!(pool.partial_ids().is_empty());
		assert_eq!(pool.write.ids(), [SubbufferId(0), SubbufferId(1), SubbufferId(2)]);
		assert_eq!(pool.rearm_write(), 0);
	}

	#[test]
	fn flush_moves_partial_only() {
		let pool = Pool::allocate(16, 4).unwrap();
		for id in [0, 1, 3].map(SubbufferId) {
			write(&pool, id, b"x");
		}
		assert_eq!(pool.partial_ids(), [SubbufferId(0), SubbufferId(1), SubbufferId(3)]);
		assert_eq!(pool.move_all_write_to_read(), 3);
		assert_eq!(pool.write.ids(), [SubbufferId(2)]);
		assert_eq!(pool.read.ids(), [SubbufferId(0), SubbufferId(1), SubbufferId(3)]);
	}

	#[test]
	fn reset_rearms_all() {
		let pool = Pool::allocate(16, 3).unwrap();
		write(&pool, SubbufferId(0), b"data");
		write(&pool, SubbufferId(1), b"more");
		pool.move_all_write_to_read();
		assert_eq!(pool.move_all_read_to_write(), 2);
		assert_eq!(pool.counts(), Counts { write: 3, read: 0, busy: 0 });
		assert!(pool.partial_ids().is_empty());
		assert_eq!(pool.move_all_read_to_write(), 0);
	}

	#[test]
	fn busy() {
		let pool = Pool::allocate(16, 2).unwrap();
		assert_eq!(pool.checkout(), None);
		write(&pool, SubbufferId(0), b"z");
		pool.move_all_write_to_read();

		let id = pool.checkout().unwrap();
		assert_eq!(pool.location(id), Some(Location::Busy));
		assert_eq!(pool.counts().total(), 2);
		assert!(pool.remove_busy(id));
		assert!(!pool.remove_busy(id));
		assert_eq!(pool.location(id), None);
		pool.add_busy(id);
		assert_eq!(pool.release(id), Ok(()));
		assert_eq!(pool.counts(), Counts { write: 2, read: 0, busy: 0 });
	}
}

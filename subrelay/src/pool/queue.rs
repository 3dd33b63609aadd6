// SPDX-License-Identifier: Apache-2.0

use std::collections::{TryReserveError, VecDeque};
use std::collections::vec_deque::Iter;
use spin::{Mutex, MutexGuard};
use crate::SubbufferId;

/// An ordered list of subbuffer ids. Capacity is reserved for the whole pool up
/// front, so list operations never allocate.
#[derive(Debug, Default)]
pub(crate) struct List(VecDeque<SubbufferId>);

impl List {
	fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
		let mut ids = VecDeque::new();
		ids.try_reserve_exact(capacity)?;
		Ok(Self(ids))
	}

	pub fn len(&self) -> usize { self.0.len() }
	pub fn head(&self) -> Option<SubbufferId> { self.0.front().copied() }
	pub fn iter(&self) -> Iter<'_, SubbufferId> { self.0.iter() }
	pub fn contains(&self, id: SubbufferId) -> bool { self.0.contains(&id) }

	/// Inserts at the tail.
	pub fn push(&mut self, id: SubbufferId) {
		debug_assert!(!self.contains(id), "subbuffer {id} queued twice");
		self.0.push_back(id)
	}

	/// Removes from the head.
	pub fn pop(&mut self) -> Option<SubbufferId> {
		self.0.pop_front()
	}

	/// Keeps only the ids matching `keep`, in order.
	pub fn retain(&mut self, keep: impl FnMut(&SubbufferId) -> bool) {
		self.0.retain(keep)
	}
}

/// A write or read queue: a [`List`] behind its own lock, which guards the shape
/// of the list but not the subbuffers in it.
#[derive(Debug)]
pub struct Queue {
	list: Mutex<List>,
}

impl Queue {
	pub(crate) fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
		Ok(Self { list: Mutex::new(List::with_capacity(capacity)?) })
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, List> {
		self.list.lock()
	}

	/// Returns the number of queued subbuffers.
	pub fn len(&self) -> usize { self.lock().len() }

	/// Returns `true` if the subbuffer is queued.
	pub fn contains(&self, id: SubbufferId) -> bool { self.lock().contains(id) }

	/// Returns the queued ids, head first.
	#[cfg(test)]
	pub fn ids(&self) -> Vec<SubbufferId> {
		self.lock().iter().copied().collect()
	}

	pub(crate) fn push(&self, id: SubbufferId) {
		self.lock().push(id)
	}

	pub(crate) fn pop(&self) -> Option<SubbufferId> {
		self.lock().pop()
	}
}

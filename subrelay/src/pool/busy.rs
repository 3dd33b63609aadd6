// SPDX-License-Identifier: Apache-2.0

use std::collections::TryReserveError;
use spin::Mutex;
use crate::SubbufferId;

/// Subbuffers checked out to the consumer. Unordered, bounded by the pool size;
/// removal is by identity.
#[derive(Debug)]
pub struct BusySet {
	ids: Mutex<Vec<SubbufferId>>,
}

impl BusySet {
	pub(crate) fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
		let mut ids = Vec::new();
		ids.try_reserve_exact(capacity)?;
		Ok(Self { ids: Mutex::new(ids) })
	}

	/// Returns the number of checked-out subbuffers.
	pub fn len(&self) -> usize { self.ids.lock().len() }

	/// Returns `true` if nothing is checked out.
	pub fn is_empty(&self) -> bool { self.ids.lock().is_empty() }

	/// Returns `true` if the subbuffer is checked out.
	pub fn contains(&self, id: SubbufferId) -> bool {
		self.ids.lock().contains(&id)
	}

	pub(crate) fn add(&self, id: SubbufferId) {
		let mut ids = self.ids.lock();
		debug_assert!(!ids.contains(&id), "subbuffer {id} checked out twice");
		ids.push(id);
	}

	/// Removes the subbuffer, returning `false` if it was never added.
	pub(crate) fn remove(&self, id: SubbufferId) -> bool {
		let mut ids = self.ids.lock();
		if let Some(index) = ids.iter().position(|&busy| busy == id) {
			ids.swap_remove(index);
			true
		} else {
			false
		}
	}
}

#[cfg(test)]
mod test {
	use crate::SubbufferId;
	use super::BusySet;

	#[test]
	fn add_remove() {
		let busy = BusySet::with_capacity(2).unwrap();
		busy.add(SubbufferId(1));
		busy.add(SubbufferId(0));
		assert_eq!(busy.len(), 2);
		assert!(busy.remove(SubbufferId(1)));
		assert!(!busy.remove(SubbufferId(1)), "second removal should miss");
		assert!(busy.contains(SubbufferId(0)));
		assert!(busy.remove(SubbufferId(0)));
		assert!(busy.is_empty());
	}
}

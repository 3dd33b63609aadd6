// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Running totals for an engine, kept across re-initialization.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Stats {
	/// Records written.
	pub records: u64,
	/// Bytes written.
	pub bytes: u64,
	/// Records dropped for lack of a writable subbuffer.
	pub dropped: u64,
	/// Subbuffers retired to the read queue by writes.
	pub full_events: u64,
	/// Subbuffers moved to the read queue by flushes.
	pub flushed: u64,
}

#[derive(Debug)]
pub(crate) struct Counters {
	records: AtomicU64,
	bytes: AtomicU64,
	dropped: AtomicU64,
	full_events: AtomicU64,
	flushed: AtomicU64,
}

impl Counters {
	pub const fn new() -> Self {
		Self {
			records: AtomicU64::new(0),
			bytes: AtomicU64::new(0),
			dropped: AtomicU64::new(0),
			full_events: AtomicU64::new(0),
			flushed: AtomicU64::new(0),
		}
	}

	pub fn written(&self, len: usize) {
		self.records.fetch_add(1, Relaxed);
		self.bytes.fetch_add(len as u64, Relaxed);
	}

	pub fn dropped(&self) { self.dropped.fetch_add(1, Relaxed); }

	pub fn full(&self, count: usize) { self.full_events.fetch_add(count as u64, Relaxed); }

	pub fn flushed(&self, count: usize) { self.flushed.fetch_add(count as u64, Relaxed); }

	pub fn snapshot(&self) -> Stats {
		Stats {
			records: self.records.load(Relaxed),
			bytes: self.bytes.load(Relaxed),
			dropped: self.dropped.load(Relaxed),
			full_events: self.full_events.load(Relaxed),
			flushed: self.flushed.load(Relaxed),
		}
	}
}

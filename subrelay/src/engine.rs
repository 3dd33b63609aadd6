// SPDX-License-Identifier: Apache-2.0

mod callbacks;
mod options;
mod stats;

pub use callbacks::Callbacks;
pub use options::EngineOptions;
pub use stats::Stats;

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};
use log::{debug, info, trace};
use spin::RwLock;
use stats::Counters;
use crate::error::{Error, ErrorKind, MapOp, OperationKind, Result};
use crate::error::ErrorKind::{BadSize, Busy, Lent, NoReadable, NoWritable, NotFound, OutOfMemory, Overlap, Stopped};
use crate::error::OperationKind::{Allocate, Get, Init, Reset, Release as ReleaseOp, Splice, Uninit, Write};
use crate::pool::{Counts, Location, Pool};
use crate::SubbufferId;

fn error(op: OperationKind, kind: ErrorKind) -> Error {
	(op, kind).into()
}

struct Allocated {
	options: EngineOptions,
	pool: Pool,
	callbacks: Arc<Callbacks>,
}

/// The buffer engine: a pool of subbuffers with write placement, consumer
/// checkout, and threshold signaling. Share it between producers and the
/// consumer with an [`Arc`]; every operation takes `&self`.
///
/// `write`, `get`, `release`, `flush`, and `reset` never block; they only spin
/// for the short critical sections of other callers. `init` and `uninit` wait
/// for in-flight operations to finish.
pub struct Engine {
	state: RwLock<Option<Allocated>>,
	paused: AtomicBool,
	counters: Counters,
}

impl Default for Engine {
	fn default() -> Self { Self::new() }
}

impl Debug for Engine {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Engine")
			.field("options", &self.options())
			.field("paused", &self.is_paused())
			.field("counts", &self.counts())
			.finish_non_exhaustive()
	}
}

impl Engine {
	/// Creates a new, unallocated engine.
	pub const fn new() -> Self {
		Self {
			state: RwLock::new(None),
			paused: AtomicBool::new(false),
			counters: Counters::new(),
		}
	}

	/// Validates `options` and allocates the pool, all subbuffers writable.
	///
	/// If already allocated with the same options, the callbacks are replaced and
	/// the engine is [reset](Self::reset) instead of reallocated, also emptying
	/// partially-filled writable subbuffers. With different options the old pool
	/// is freed first, which fails if any subbuffer is still checked out.
	pub fn init(&self, options: EngineOptions, callbacks: Callbacks) -> Result {
		options.validate().map_err(|reason| Error::config(Init, reason))?;

		let mut state = self.state.write();
		match state.as_mut() {
			Some(current) if current.options == options => {
				Self::reset_pool(&current.pool).map_op(Init)?;
				let cleared = current.pool.rearm_write();
				trace!("discarded {cleared} partially-filled subbuffers");
				current.callbacks = Arc::new(callbacks);
				self.paused.store(false, Release);
				debug!("engine already allocated with the same options, reset instead");
				return Ok(())
			}
			Some(current) if !current.pool.busy.is_empty() =>
				return Err(error(Init, Busy)),
			_ => { }
		}

		if let Some(old) = state.take() {
			old.pool.free_all();
		}

		let EngineOptions { subbuffer_size, subbuffer_count, .. } = options;
		let pool = Pool::allocate(subbuffer_size, subbuffer_count).map_err(|err|
			Error::new(Allocate, OutOfMemory, Some(err.into()))
		)?;
		*state = Some(Allocated {
			options,
			pool,
			callbacks: Arc::new(callbacks),
		});
		self.paused.store(false, Release);
		debug!("engine initialized with {options:?}");
		Ok(())
	}

	/// Frees the pool and clears the configuration. Fails if any subbuffer is
	/// checked out.
	pub fn uninit(&self) -> Result {
		let mut state = self.state.write();
		match state.as_ref() {
			None => return Err(error(Uninit, Stopped)),
			Some(current) if !current.pool.busy.is_empty() =>
				return Err(error(Uninit, Busy)),
			_ => { }
		}

		if let Some(old) = state.take() {
			old.pool.free_all();
		}
		self.paused.store(false, Release);
		debug!("engine uninitialized");
		Ok(())
	}

	/// Writes a record to the first subbuffer in the write queue with room for it.
	/// Subbuffers passed over on the way, too full for this record, are retired to
	/// the read queue and reported through the full callback. A record is never
	/// split.
	///
	/// Fails with [`NoWritable`](ErrorKind::NoWritable) if no subbuffer has room;
	/// the record is dropped and counted in [`Stats::dropped`].
	pub fn write(&self, data: &[u8]) -> Result<usize> {
		let state = self.state.read();
		let Some(Allocated { options, pool, callbacks }) = state.as_ref() else {
			return Err(error(Write, Stopped))
		};

		let len = data.len();
		if len == 0 || len > options.subbuffer_size {
			return Err(error(Write, BadSize))
		}

		let mut retired = Vec::new();
		let result = Self::place(pool, data, &mut retired);
		match result {
			Ok(_) => self.counters.written(len),
			Err(ref err) if err.kind() == NoWritable => self.counters.dropped(),
			Err(_) => { }
		}
		self.counters.full(retired.len());

		let pause = options.is_low(pool.write.len()) &&
			self.paused
				.compare_exchange(false, true, AcqRel, Acquire)
				.is_ok();
		let callbacks = callbacks.clone();
		drop(state);

		for id in retired {
			callbacks.full(id);
		}

		if pause {
			info!("writable subbuffers at or below low threshold, pausing");
			callbacks.low();
		}

		result
	}

	fn place(pool: &Pool, data: &[u8], retired: &mut Vec<SubbufferId>) -> Result<usize> {
		let len = data.len();
		let mut write = pool.write.lock();
		while let Some(id) = write.head() {
			let mut block = pool[id].lock();
			if block.limit() < len {
				write.pop();
				pool.push_read(id);
				retired.push(id);
				continue
			}

			if block.overlaps(data) {
				return Err(error(Write, Overlap))
			}

			let range = block.reserve(len);
			if block.is_full() {
				write.pop();
				pool.push_read(id);
				retired.push(id);
			}

			// Other writers may move on to the next subbuffer while this one copies;
			// its lock keeps it from being retired mid-copy.
			drop(write);
			block.fill(range, data);
			trace!("wrote {len} bytes to subbuffer {id}");
			return Ok(len)
		}

		Err(error(Write, NoWritable))
	}

	/// Checks out the oldest readable subbuffer.
	pub fn get(&self) -> Result<SubbufferId> {
		let state = self.state.read();
		let Allocated { pool, .. } = Self::allocated(&state, Get)?;
		pool.checkout().ok_or_else(|| error(Get, NoReadable))
	}

	/// Returns a checked-out subbuffer to the write queue, emptied. Resumes a
	/// paused engine if the writable share reaches the high threshold.
	pub fn release(&self, id: SubbufferId) -> Result {
		let state = self.state.read();
		let Allocated { options, pool, callbacks } = Self::allocated(&state, ReleaseOp)?;
		pool.release(id).map_err(|kind| error(ReleaseOp, kind))?;

		let resume = self.try_resume(options, pool);
		let callbacks = callbacks.clone();
		drop(state);

		if resume {
			info!("writable subbuffers at or above high threshold, resuming");
			callbacks.high();
		}
		Ok(())
	}

	/// Moves every partially-filled subbuffer to the read queue without firing the
	/// full callback, returning how many became readable.
	pub fn flush(&self) -> Result<usize> {
		let state = self.state.read();
		let Allocated { pool, .. } = Self::allocated(&state, OperationKind::Flush)?;
		let moved = pool.move_all_write_to_read();
		self.counters.flushed(moved);
		debug!("flushed {moved} subbuffers");
		Ok(moved)
	}

	/// Discards unread data, moving every readable subbuffer back to the write
	/// queue. Fails if any subbuffer is checked out.
	pub fn reset(&self) -> Result {
		let state = self.state.read();
		let Allocated { options, pool, callbacks } = Self::allocated(&state, Reset)?;
		Self::reset_pool(pool)?;

		let resume = self.try_resume(options, pool);
		let callbacks = callbacks.clone();
		drop(state);

		if resume {
			info!("reset restored writable subbuffers, resuming");
			callbacks.high();
		}
		Ok(())
	}

	fn reset_pool(pool: &Pool) -> Result {
		if !pool.busy.is_empty() {
			return Err(error(Reset, Busy))
		}

		let moved = pool.move_all_read_to_write();
		debug!("reset {moved} subbuffers");
		Ok(())
	}

	fn try_resume(&self, options: &EngineOptions, pool: &Pool) -> bool {
		options.is_high(pool.write.len()) &&
		self.paused
			.compare_exchange(true, false, AcqRel, Acquire)
			.is_ok()
	}

	fn allocated(state: &Option<Allocated>, op: OperationKind) -> Result<&Allocated> {
		state.as_ref().ok_or_else(|| error(op, Stopped))
	}

	/// Calls `f` with the bytes of a checked-out subbuffer.
	pub fn with_data<R>(&self, id: SubbufferId, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
		let state = self.state.read();
		let Allocated { pool, .. } = Self::allocated(&state, OperationKind::Read)?;
		if !pool.busy.contains(id) {
			return Err(error(OperationKind::Read, NotFound))
		}

		let block = pool[id].lock();
		if block.is_lent() {
			return Err(error(OperationKind::Read, Lent))
		}
		Ok(f(block.data()))
	}

	/// Moves the memory of a checked-out subbuffer out of the pool, returning it
	/// with the number of bytes filled. It must be [restored](Self::restore) before
	/// the subbuffer can be released.
	pub(crate) fn lend(&self, id: SubbufferId) -> Result<(Box<[u8]>, usize)> {
		let state = self.state.read();
		let Allocated { pool, .. } = Self::allocated(&state, Splice)?;
		if !pool.busy.contains(id) {
			return Err(error(Splice, NotFound))
		}

		let mut block = pool[id].lock();
		let filled = block.filled();
		let data = block.lend().ok_or_else(|| error(Splice, Lent))?;
		Ok((data, filled))
	}

	pub(crate) fn restore(&self, id: SubbufferId, data: Box<[u8]>) {
		let state = self.state.read();
		if let Some(subbuffer) = state.as_ref().and_then(|state| state.pool.get(id)) {
			subbuffer.lock().restore(data);
		}
	}

	/// Returns `true` if the pool is allocated.
	pub fn is_allocated(&self) -> bool { self.state.read().is_some() }

	/// Returns `true` if the engine is paused by the low threshold.
	pub fn is_paused(&self) -> bool { self.paused.load(Acquire) }

	/// Returns the options the pool was allocated with.
	pub fn options(&self) -> Option<EngineOptions> {
		self.state.read().as_ref().map(|state| state.options)
	}

	/// Returns how many subbuffers each container holds, all zero if unallocated.
	pub fn counts(&self) -> Counts {
		self.state
			.read()
			.as_ref()
			.map(|state| state.pool.counts())
			.unwrap_or_default()
	}

	/// Returns which container holds the subbuffer.
	pub fn location(&self, id: SubbufferId) -> Option<Location> {
		self.state.read().as_ref()?.pool.location(id)
	}

	/// Returns the number of bytes written to the subbuffer.
	pub fn filled(&self, id: SubbufferId) -> Option<usize> {
		let state = self.state.read();
		let subbuffer = state.as_ref()?.pool.get(id)?;
		let filled = subbuffer.lock().filled();
		Some(filled)
	}

	/// Returns the ids of partially-filled subbuffers in the write queue.
	pub fn partial(&self) -> Vec<SubbufferId> {
		self.state
			.read()
			.as_ref()
			.map(|state| state.pool.partial_ids())
			.unwrap_or_default()
	}

	/// Returns the running totals.
	pub fn stats(&self) -> Stats { self.counters.snapshot() }
}

// SPDX-License-Identifier: Apache-2.0

use crate::{DEFAULT_SUBBUFFER_COUNT, DEFAULT_SUBBUFFER_SIZE, MAX_SUBBUFFER_SIZE};

/// Options for sizing an [`Engine`](super::Engine)'s pool and tuning its
/// backpressure.
///
/// # Subbuffer size and count
///
/// Every subbuffer has the same capacity, at most [`MAX_SUBBUFFER_SIZE`]. A record
/// can never be larger than one subbuffer. Defaults to `4KiB` × `16`.
///
/// # Thresholds
///
/// The low and high thresholds are percentages of the pool that is writable,
/// with `0 <= low <= high <= 100`. When a write leaves the writable share at or
/// below the low threshold, the engine pauses and fires its low callback. While
/// paused, a release that brings the writable share to or above the high
/// threshold resumes it and fires the high callback. Defaults to `20%` and `80%`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EngineOptions {
	pub subbuffer_size: usize,
	pub subbuffer_count: usize,
	pub low_threshold: u8,
	pub high_threshold: u8,
}

impl Default for EngineOptions {
	fn default() -> Self { Self::new() }
}

impl EngineOptions {
	/// Creates a new set of engine options.
	pub const fn new() -> Self {
		Self {
			subbuffer_size: DEFAULT_SUBBUFFER_SIZE,
			subbuffer_count: DEFAULT_SUBBUFFER_COUNT,
			low_threshold: 20,
			high_threshold: 80,
		}
	}

	/// Returns the subbuffer size in bytes.
	#[inline]
	pub const fn subbuffer_size(&self) -> usize { self.subbuffer_size }

	/// Returns the subbuffer count.
	#[inline]
	pub const fn subbuffer_count(&self) -> usize { self.subbuffer_count }

	/// Returns the low threshold percentage.
	#[inline]
	pub const fn low_threshold(&self) -> u8 { self.low_threshold }

	/// Returns the high threshold percentage.
	#[inline]
	pub const fn high_threshold(&self) -> u8 { self.high_threshold }

	/// Sets the subbuffer size in bytes.
	#[inline]
	pub fn set_subbuffer_size(&mut self, value: usize) {
		self.subbuffer_size = value;
	}

	/// Sets the subbuffer count.
	#[inline]
	pub fn set_subbuffer_count(&mut self, value: usize) {
		self.subbuffer_count = value;
	}

	/// Sets both threshold percentages.
	#[inline]
	pub fn set_thresholds(&mut self, low: u8, high: u8) {
		self.low_threshold = low;
		self.high_threshold = high;
	}

	/// Sets the subbuffer size in bytes.
	#[inline]
	pub const fn with_subbuffer_size(mut self, value: usize) -> Self {
		self.subbuffer_size = value;
		self
	}

	/// Sets the subbuffer count.
	#[inline]
	pub const fn with_subbuffer_count(mut self, value: usize) -> Self {
		self.subbuffer_count = value;
		self
	}

	/// Sets both threshold percentages.
	#[inline]
	pub const fn with_thresholds(mut self, low: u8, high: u8) -> Self {
		self.low_threshold = low;
		self.high_threshold = high;
		self
	}

	/// Checks the options, returning the reason they are invalid if so.
	pub fn validate(&self) -> Result<(), &'static str> {
		let &Self { subbuffer_size, subbuffer_count, low_threshold, high_threshold } = self;
		if subbuffer_size == 0 {
			Err("subbuffer size is zero")
		} else if subbuffer_size > MAX_SUBBUFFER_SIZE {
			Err("subbuffer size exceeds maximum")
		} else if subbuffer_count == 0 {
			Err("subbuffer count is zero")
		} else if high_threshold > 100 {
			Err("threshold above 100%")
		} else if low_threshold > high_threshold {
			Err("low threshold above high threshold")
		} else {
			Ok(())
		}
	}

	/// Returns `true` if `writable` subbuffers are at or below the low threshold.
	pub(crate) fn is_low(&self, writable: usize) -> bool {
		writable * 100 <= self.low_threshold as usize * self.subbuffer_count
	}

	/// Returns `true` if `writable` subbuffers are at or above the high threshold.
	pub(crate) fn is_high(&self, writable: usize) -> bool {
		writable * 100 >= self.high_threshold as usize * self.subbuffer_count
	}
}

#[cfg(test)]
mod test {
	use super::EngineOptions;

	#[test]
	fn validate() {
		let options = EngineOptions::new();
		assert_eq!(options.validate(), Ok(()));
		assert!(options.with_subbuffer_size(0).validate().is_err());
		assert!(options.with_subbuffer_size(64 * 1024 + 1).validate().is_err());
		assert!(options.with_subbuffer_count(0).validate().is_err());
		assert!(options.with_thresholds(50, 40).validate().is_err());
		assert!(options.with_thresholds(0, 101).validate().is_err());
		assert_eq!(options.with_thresholds(0, 0).validate(), Ok(()));
		assert_eq!(options.with_thresholds(100, 100).validate(), Ok(()));
	}

	#[test]
	fn thresholds() {
		let options = EngineOptions::new()
			.with_subbuffer_count(10)
			.with_thresholds(20, 80);
		assert!(!options.is_low(3));
		assert!( options.is_low(2));
		assert!(!options.is_high(7));
		assert!( options.is_high(8));
	}
}

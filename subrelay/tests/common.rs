// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![allow(dead_code)]

use std::fmt::{Arguments, Debug};
use subrelay::{Callbacks, Engine, EngineOptions, SubbufferId};
use subrelay::pool::Location;

macro_rules! qc_assert_eq {
	($left:expr,$right:expr) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, None)
			)
		}
	}};
    ($left:expr,$right:expr,$($arg:tt)+) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, Some(format_args!($($arg)+)))
			)
		}
	}};
}

pub fn format_qc_assert_error<L: Debug, R: Debug>(left: &L, right: &R, msg: Option<Arguments>) -> String {
	if let Some(msg) = msg {
		format!(
			"assertion failed `(left == right)`: {msg}\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	} else {
		format!(
			"assertion failed `(left == right)`:\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	}
}

/// Creates an engine allocated with `count` subbuffers of `size` bytes.
pub fn engine(size: usize, count: usize) -> Engine {
	let engine = Engine::new();
	engine.init(options(size, count), Callbacks::new()).unwrap();
	engine
}

pub fn options(size: usize, count: usize) -> EngineOptions {
	EngineOptions::new()
		.with_subbuffer_size(size)
		.with_subbuffer_count(count)
}

/// Checks that every subbuffer is held by exactly one container, and that none
/// in the write queue is full.
pub fn check_invariants(engine: &Engine) -> Result<(), String> {
	let options = engine.options().ok_or("engine is not allocated")?;
	let count = options.subbuffer_count();
	let counts = engine.counts();
	if counts.total() != count {
		return Err(format!("{counts:?} does not add up to {count} subbuffers"))
	}

	for id in (0..count).map(SubbufferId::new) {
		match engine.location(id) {
			None => return Err(format!("subbuffer {id} is lost")),
			Some(Location::Write) if engine.filled(id) == Some(options.subbuffer_size()) =>
				return Err(format!("full subbuffer {id} is still writable")),
			_ => { }
		}
	}
	Ok(())
}

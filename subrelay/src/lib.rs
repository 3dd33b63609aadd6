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

//! ## How it works
//!
//! Records are written to and read from fixed-size chunks of memory called
//! *subbuffers*. Every subbuffer is allocated once, up front, into a *pool*,
//! and from then on only changes hands. At any instant a subbuffer sits in
//! exactly one of three places:
//!
//! - the *write queue*, accepting records from any number of producers,
//! - the *read queue*, full or flushed, waiting for the consumer,
//! - the *busy set*, checked out by the consumer while it transfers the bytes.
//!
//! Producers always write to the head of the write queue. When a record does not
//! fit in the space left at the head, that subbuffer is retired to the read queue
//! and the next one is tried; if none fits, the record is dropped and counted.
//! Dropping is the normal response to a stalled consumer, writers never wait.
//!
//! The consumer takes subbuffers from the read queue one at a time, either
//! copying the bytes out ([`Device::read`]) or taking the memory itself without a
//! copy ([`Device::splice`]). Releasing a subbuffer re-arms it at the tail of the
//! write queue, closing the cycle.
//!
//! ### Backpressure
//!
//! Two thresholds, percentages of the pool that is writable, drive a pause and
//! resume signal. Once the writable share falls to the *low* threshold the engine
//! pauses and fires its low callback; it resumes, firing the high callback, only
//! once releases bring the writable share back up to the *high* threshold. The
//! gap between the two keeps the signal from flapping.
//!
//! ### Locking
//!
//! Every lock a producer can reach is a spin lock, so a producer never sleeps.
//! Locks are always taken in this order: write queue, subbuffer, read queue, busy
//! set. A producer may let go of the write queue while still holding the lock of
//! the subbuffer it is copying into; anything that retires a subbuffer takes that
//! same lock first, so a half-written record is never handed to the consumer.

pub mod device;
pub mod engine;
pub mod error;
pub mod pool;
mod std_io;
mod subbuffer;

pub use device::{Command, Device, DeviceOptions, MessageHandler, Producer, Reply, Spliced};
pub use device::notify::{Notification, Notifier, NullNotifier, UdpNotifier};
pub use engine::{Callbacks, Engine, EngineOptions, Stats};
pub use error::{Category, Error, ErrorKind, OperationKind, Result};
pub use std_io::DeviceReader;
pub use subbuffer::{MAX_SUBBUFFER_SIZE, SubbufferId};
pub(crate) use subbuffer::*;

pub const DEFAULT_SUBBUFFER_SIZE: usize = 4096;
pub const DEFAULT_SUBBUFFER_COUNT: usize = 16;

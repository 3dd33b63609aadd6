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

use std::{fmt, io, result};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use amplify_derive::Display;

pub type ErrorBox = Box<dyn StdError + Send + Sync>;
pub type Result<T = ()> = result::Result<T, Error>;

/// The operation that failed.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum OperationKind {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("initialize engine")]
	Init,
	#[display("uninitialize engine")]
	Uninit,
	#[display("allocate subbuffers")]
	Allocate,
	#[display("write record")]
	Write,
	#[display("get readable subbuffer")]
	Get,
	#[display("release subbuffer")]
	Release,
	#[display("flush write queue")]
	Flush,
	#[display("reset read queue")]
	Reset,
	#[display("read from device")]
	Read,
	#[display("splice from device")]
	Splice,
	#[display("configure device")]
	Configure,
	#[display("enable device")]
	Enable,
	#[display("disable device")]
	Disable,
	#[display("advance to next readable subbuffer")]
	Advance,
	#[display("pass message")]
	Message,
	#[display("access attribute")]
	Attribute,
}

/// What went wrong. See [`Category`] for how each kind should be handled.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	#[display("invalid configuration ({0})")]
	Config(&'static str),
	#[display("bad record size")]
	BadSize,
	#[display("engine stopped")]
	Stopped,
	#[display("source overlaps destination")]
	Overlap,
	#[display("out of memory")]
	OutOfMemory,
	#[display("no writable buffers")]
	NoWritable,
	#[display("no readable buffers")]
	NoReadable,
	#[display("subbuffer not checked out")]
	NotFound,
	#[display("unreleased buffers")]
	Busy,
	#[display("subbuffer memory held by a transport")]
	Lent,
	#[display("device enabled")]
	Enabled,
	#[display("operation would block")]
	WouldBlock,
	#[display("interrupted")]
	Interrupted,
	#[display("unsupported")]
	Unsupported,
	#[display("IO error")]
	Io,
	#[display("{0}")]
	Other(&'static str),
}

/// Broad classes of [`ErrorKind`].
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum Category {
	/// Invalid parameters. Never retried, the caller must correct them.
	#[display("configuration error")]
	Config,
	/// Expected under load: drop-and-count for writers, block or poll for the
	/// reader.
	#[display("capacity error")]
	Capacity,
	/// A caller bug, reported but never silently fixed.
	#[display("misuse")]
	Misuse,
	/// Allocation failed; the pool was rolled back.
	#[display("resource exhaustion")]
	Resource,
	#[display("other error")]
	Other,
}

impl ErrorKind {
	/// Returns the category this kind belongs to.
	pub fn category(self) -> Category {
		use ErrorKind::*;
		match self {
			Config(_) | BadSize             => Category::Config,
			NoWritable | NoReadable | NotFound |
			WouldBlock | Interrupted        => Category::Capacity,
			Stopped | Overlap | Busy |
			Lent | Enabled                  => Category::Misuse,
			OutOfMemory                     => Category::Resource,
			Unsupported | Io | Other(_)     => Category::Other,
		}
	}

	/// Returns `true` if the error is a steady-state condition rather than a
	/// fault.
	pub fn is_transient(self) -> bool {
		self.category() == Category::Capacity
	}
}

#[derive(Debug)]
pub struct Error {
	op: OperationKind,
	kind: ErrorKind,
	source: Option<ErrorBox>,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let Self { op, kind, source } = self;
		if let Some(source) = source {
			write!(f, "{op} failed; {kind} ({source})")
		} else {
			write!(f, "{op} failed; {kind}")
		}
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		if let Some(ref source) = self.source {
			Some(source.as_ref())
		} else {
			None
		}
	}
}

impl Error {
	pub(crate) fn new(
		op: OperationKind,
		kind: ErrorKind,
		source: Option<ErrorBox>
	) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new error with a custom message.
	pub fn other(
		op: OperationKind,
		message: &'static str,
		source: Option<ErrorBox>
	) -> Self {
		Self::new(op, ErrorKind::Other(message), source)
	}

	/// Creates a new configuration error.
	pub fn config(op: OperationKind, reason: &'static str) -> Self {
		Self::new(op, ErrorKind::Config(reason), None)
	}

	/// Creates a new IO error.
	pub fn io(op: OperationKind, error: io::Error) -> Self {
		Self::new(op, ErrorKind::Io, Some(error.into()))
	}

	/// Returns the operation kind.
	pub fn operation(&self) -> OperationKind { self.op }

	/// Sets the operation kind.
	pub fn with_operation(mut self, op: OperationKind) -> Self {
		self.op = op;
		self
	}

	/// Returns the error kind.
	pub fn kind(&self) -> ErrorKind { self.kind }

	/// Sets the error kind.
	pub fn with_kind(mut self, kind: ErrorKind) -> Self {
		self.kind = kind;
		self
	}

	/// Shorthand for `kind().is_transient()`.
	pub fn is_transient(&self) -> bool { self.kind.is_transient() }
}

impl From<(OperationKind, ErrorKind)> for Error {
	fn from((op, kind): (OperationKind, ErrorKind)) -> Self {
		Self::new(op, kind, None)
	}
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		let kind = match value.kind {
			ErrorKind::WouldBlock  => io::ErrorKind::WouldBlock,
			ErrorKind::Interrupted => io::ErrorKind::Interrupted,
			ErrorKind::OutOfMemory => io::ErrorKind::OutOfMemory,
			ErrorKind::Config(_) |
			ErrorKind::BadSize     => io::ErrorKind::InvalidInput,
			_                      => io::ErrorKind::Other,
		};
		io::Error::new(kind, value)
	}
}

/// Sets the operation on errors in a result.
pub(crate) trait MapOp<T> {
	fn map_op(self, op: OperationKind) -> Result<T>;
}

impl<T> MapOp<T> for Result<T> {
	fn map_op(self, op: OperationKind) -> Result<T> {
		self.map_err(|err| err.with_operation(op))
	}
}

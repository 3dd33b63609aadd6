// SPDX-License-Identifier: Apache-2.0

//! Out-of-band pause/resume notifications for the consumer's user-space side.
//! Delivery is best-effort and unordered; nothing on the data path waits on it.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use amplify_derive::Display;
use log::warn;

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum Notification {
	/// Producers should throttle, writable subbuffers are running out.
	#[display("pause producers")]
	Pause,
	/// Enough subbuffers were released for producers to continue.
	#[display("resume producers")]
	Resume,
}

impl Notification {
	/// Returns the one-byte datagram tag.
	pub const fn tag(self) -> u8 {
		match self {
			Self::Pause  => b'P',
			Self::Resume => b'R',
		}
	}

	/// Decodes a received datagram.
	pub fn decode(datagram: &[u8]) -> Option<Self> {
		match datagram {
			[b'P'] => Some(Self::Pause),
			[b'R'] => Some(Self::Resume),
			_ => None
		}
	}
}

pub trait Notifier: Send + Sync {
	/// Sends a notification. Must not block; failures are dropped.
	fn notify(&self, notification: Notification);
}

impl<F: Fn(Notification) + Send + Sync> Notifier for F {
	fn notify(&self, notification: Notification) { self(notification) }
}

/// Discards every notification.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
	fn notify(&self, _: Notification) { }
}

/// Sends each notification as a single-byte UDP datagram.
#[derive(Debug)]
pub struct UdpNotifier {
	socket: UdpSocket,
	target: SocketAddr,
}

impl UdpNotifier {
	/// Binds a non-blocking socket on an ephemeral port, sending to the first
	/// address `target` resolves to.
	pub fn new(target: impl ToSocketAddrs) -> io::Result<Self> {
		let target = target.to_socket_addrs()?.next().ok_or_else(||
			io::Error::new(io::ErrorKind::InvalidInput, "no notification address")
		)?;
		let local: SocketAddr = if target.is_ipv4() {
			(Ipv4Addr::UNSPECIFIED, 0).into()
		} else {
			(Ipv6Addr::UNSPECIFIED, 0).into()
		};
		let socket = UdpSocket::bind(local)?;
		socket.set_nonblocking(true)?;
		Ok(Self { socket, target })
	}

	/// Returns the address notifications are sent to.
	pub fn target(&self) -> SocketAddr { self.target }
}

impl Notifier for UdpNotifier {
	fn notify(&self, notification: Notification) {
		if let Err(err) = self.socket.send_to(&[notification.tag()], self.target) {
			warn!("dropped \"{notification}\" notification to {}: {err}", self.target);
		}
	}
}

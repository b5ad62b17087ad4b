//! Routing-netlink interface enumeration
//!
//! Direct kernel communication over an `AF_NETLINK`/`NETLINK_ROUTE` socket,
//! replacing a capture library's device-listing API:
//!
//! - `socket`: netlink socket lifecycle (syscalls, RAII)
//! - `structures`: binary structures matching kernel layout (`repr(C)`)
//! - `attr`: TLV attribute table over a receive buffer
//! - `message`: request construction and datagram walking
//! - `ifaddrs`: link dump, address dump and record correlation
//!
//! Netlink is Linux-specific; the socket-facing pieces only compile there.
//! The parsing layers are cross-platform so their tests run anywhere.

// SUBMODULE DECLARATIONS

#[cfg(target_os = "linux")]
pub mod socket;

pub mod attr;
pub mod message;
pub mod structures;

#[cfg(target_os = "linux")]
pub mod ifaddrs;

// PUBLIC RE-EXPORTS
//
// The high-level enumeration API is what front ends consume; the framing
// and attribute layers stay reachable for callers that drive their own
// dumps.

#[cfg(target_os = "linux")]
pub use ifaddrs::{netlink_getifaddrs, InterfaceDump, InterfaceRecord, NetlinkError};

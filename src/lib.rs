// ============================================================================
// NETBASE LIBRARY
// ============================================================================
// Kernel-facing network plumbing, no convenience layers:
//
// 1. `netlink` — enumerate network interfaces and their addresses by talking
//    routing netlink directly (length-prefixed, type-tagged binary messages
//    exchanged with the kernel's routing subsystem).
// 2. `netsock` — IPv4 socket primitives issued as raw syscalls, with input
//    validation in front of bind and nothing hidden behind retries.
//
// The two subsystems are independent. The netlink side is what a packet
// capture front end would use in place of its library's device listing; the
// socket side backs the standalone client/server harnesses.

pub mod netlink;

#[cfg(target_os = "linux")]
pub mod netsock;

#[cfg(target_os = "linux")]
pub use netlink::{netlink_getifaddrs, InterfaceDump, InterfaceRecord, NetlinkError};

#[cfg(target_os = "linux")]
pub use netsock::{SockError, SockName};

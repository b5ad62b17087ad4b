//! Routing-netlink socket management
//!
//! Safe wrapper around an `AF_NETLINK`/`NETLINK_ROUTE` socket. The raw file
//! descriptor is private and closed on drop, so a socket cannot leak across
//! an enumeration call.
//!
//! The transport is deliberately blocking and single-shot: one socket, one
//! outstanding dump, no timeout and no retry on interruption. Callers that
//! want concurrent discovery open one socket per call instead of sharing.

use std::io;
use std::os::unix::io::RawFd;

/// Socket-level (transport) failure: open, send or receive went wrong.
#[derive(Debug)]
pub struct SocketError {
    context: &'static str,
    source: io::Error,
}

impl SocketError {
    fn os(context: &'static str) -> Self {
        Self {
            context,
            source: io::Error::last_os_error(),
        }
    }

    fn new(context: &'static str, source: io::Error) -> Self {
        Self { context, source }
    }

    /// Kind of the underlying OS error.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Netlink routing socket with automatic cleanup.
pub struct NetlinkSocket {
    fd: RawFd,
}

impl NetlinkSocket {
    /// Open an `AF_NETLINK` socket on the routing protocol and bind it.
    ///
    /// # Errors
    ///
    /// Returns `SocketError` if `socket()`, `bind()` or `setsockopt()` fails.
    pub fn open() -> Result<Self, SocketError> {
        // SAFETY: plain libc syscalls; every return value is checked and
        // the fd is closed on any setup failure before returning.
        unsafe {
            let fd = libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_ROUTE);
            if fd < 0 {
                return Err(SocketError::os("socket() failed"));
            }

            // Bind with nl_pid = 0; the kernel assigns a unique port id.
            let mut addr: libc::sockaddr_nl = std::mem::zeroed();
            addr.nl_family = libc::AF_NETLINK as u16;
            addr.nl_pid = 0;
            addr.nl_groups = 0; // no multicast subscriptions

            let ret = libc::bind(
                fd,
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_nl>() as u32,
            );
            if ret < 0 {
                let err = SocketError::os("bind() failed");
                libc::close(fd);
                return Err(err);
            }

            // A full link dump on a busy host can exceed the default
            // receive buffer; 32KB matches the per-datagram read below.
            let rcvbuf: libc::c_int = 32768;
            let ret = libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                std::ptr::addr_of!(rcvbuf).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as u32,
            );
            if ret < 0 {
                let err = SocketError::os("setsockopt(SO_RCVBUF) failed");
                libc::close(fd);
                return Err(err);
            }

            Ok(Self { fd })
        }
    }

    /// Send one framed request to the kernel (destination pid 0).
    ///
    /// # Errors
    ///
    /// Returns `SocketError` if `sendto()` fails or not all bytes were sent.
    pub fn send(&self, data: &[u8]) -> Result<(), SocketError> {
        // SAFETY: `data.as_ptr()` is valid for `data.len()` bytes, and the
        // destination sockaddr_nl lives on the stack for the whole call.
        unsafe {
            let mut addr: libc::sockaddr_nl = std::mem::zeroed();
            addr.nl_family = libc::AF_NETLINK as u16;
            addr.nl_pid = 0; // the kernel
            addr.nl_groups = 0;

            let ret = libc::sendto(
                self.fd,
                data.as_ptr().cast::<libc::c_void>(),
                data.len(),
                0,
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_nl>() as u32,
            );

            if ret < 0 {
                return Err(SocketError::os("sendto() failed"));
            }
            if ret as usize != data.len() {
                return Err(SocketError::new(
                    "short send",
                    io::Error::from(io::ErrorKind::WriteZero),
                ));
            }

            Ok(())
        }
    }

    /// Receive one response datagram into `buffer`.
    ///
    /// A dump response arrives as a sequence of datagrams, each holding one
    /// or more concatenated messages; callers keep receiving until the dump
    /// terminates. Blocks until the kernel responds.
    ///
    /// # Errors
    ///
    /// Returns `SocketError` if `recv()` fails. An interrupted call is
    /// surfaced as-is; the transport performs no retry.
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize, SocketError> {
        // SAFETY: `buffer.as_mut_ptr()` is valid for `buffer.len()` bytes.
        unsafe {
            let ret = libc::recv(
                self.fd,
                buffer.as_mut_ptr().cast::<libc::c_void>(),
                buffer.len(),
                0,
            );

            if ret < 0 {
                return Err(SocketError::os("recv() failed"));
            }

            Ok(ret as usize)
        }
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        // Nothing to do with a close error inside a destructor.
        // SAFETY: fd is owned by this struct and closed exactly once.
        unsafe {
            libc::close(self.fd);
        }
    }
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_drop() {
        // NETLINK_ROUTE needs no privileges; opening must succeed on Linux.
        let socket = NetlinkSocket::open().expect("open routing socket");
        drop(socket);
    }

    #[test]
    fn test_sockets_are_independent() {
        // One socket per enumeration call: two may be open at once.
        let a = NetlinkSocket::open().expect("first socket");
        let b = NetlinkSocket::open().expect("second socket");
        drop(a);
        drop(b);
    }
}

//! Raw-syscall IPv4 socket transport
//!
//! Every operation here is a direct `syscall(2)` invocation of the kernel's
//! socket entry points, bypassing any sockets convenience layer. Parameter
//! and return conventions are exactly the kernel ABI: `sockaddr_in` layout,
//! network byte order for ports and addresses, `-1`/errno on failure.
//!
//! Contracts beyond the raw ABI:
//! - `net_bind` validates its inputs *before* touching the kernel: the
//!   descriptor must really be a socket and the address must be a valid
//!   IPv4 literal. An already-bound address/port is surfaced as the
//!   distinguished [`SockError::AddrInUse`].
//! - No call retries on `EINTR`; an interrupted caller retries itself.
//! - `net_getsockname` is best-effort and signals failure in-band with the
//!   [`AF_INVALID`] family sentinel instead of a separate error channel.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::unix::io::RawFd;

/// Sentinel written into [`SockName::family`] when `getsockname` fails.
pub const AF_INVALID: u16 = u16::MAX;

// ERROR TYPE

/// Raw socket layer failure.
///
/// The first two variants are validation errors raised before any syscall
/// is attempted; the rest surface the kernel's verdict untouched.
#[derive(Debug)]
pub enum SockError {
    /// The descriptor does not designate a socket resource.
    NotASocket(RawFd),
    /// The textual address is not a valid IPv4 literal.
    InvalidAddress(String),
    /// The requested address/port is already bound.
    AddrInUse { addr: Ipv4Addr, port: u16 },
    /// A kernel primitive returned a negative result.
    Syscall {
        call: &'static str,
        source: io::Error,
    },
}

impl SockError {
    fn syscall(call: &'static str) -> Self {
        SockError::Syscall {
            call,
            source: io::Error::last_os_error(),
        }
    }
}

impl std::fmt::Display for SockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SockError::NotASocket(fd) => write!(f, "descriptor {fd} is not a socket"),
            SockError::InvalidAddress(addr) => write!(f, "invalid IPv4 address: {addr}"),
            SockError::AddrInUse { addr, port } => {
                write!(f, "address or port already in use: {addr}:{port}")
            }
            SockError::Syscall { call, source } => write!(f, "{call} failed: {source}"),
        }
    }
}

impl std::error::Error for SockError {}

/// Local name of a socket as reported by the kernel.
///
/// `family` is [`AF_INVALID`] when the underlying call failed; callers check
/// that field instead of unwrapping a result.
#[derive(Debug, Clone, Copy)]
pub struct SockName {
    pub family: u16,
    pub addr: Ipv4Addr,
    pub port: u16,
}

fn sockaddr_in_from(addr: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain data; zeroing gives a valid value.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = port.to_be();
    sa.sin_addr = libc::in_addr {
        s_addr: u32::from(addr).to_be(),
    };
    sa
}

// SOCKET PRIMITIVES

/// `socket(2)` by syscall number.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_socket(domain: i32, sock_type: i32, protocol: i32) -> Result<RawFd, SockError> {
    // SAFETY: three integer arguments, exactly the kernel ABI.
    let fd = unsafe { libc::syscall(libc::SYS_socket, domain, sock_type, protocol) };
    if fd < 0 {
        return Err(SockError::syscall("syscall(SYS_socket)"));
    }
    Ok(fd as RawFd)
}

/// Validate and `bind(2)` a socket to an IPv4 address and port.
///
/// Two checks run before the kernel call: `fstat` must report the
/// descriptor as a socket file, and `addr` must parse as an IPv4 literal
/// ("999.1.1.1" is rejected here, not by the kernel).
///
/// # Errors
///
/// `NotASocket` / `InvalidAddress` for failed validation, `AddrInUse` when
/// the kernel rejects with `EADDRINUSE`, `Syscall` for anything else.
pub fn net_bind(sockfd: RawFd, addr: &str, port: u16) -> Result<(), SockError> {
    // SAFETY: fstat writes into a zeroed stat buffer we own.
    let mut f_info: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::fstat(sockfd, &mut f_info) };
    if ret == -1 {
        return Err(SockError::syscall("fstat"));
    }
    if f_info.st_mode & libc::S_IFMT != libc::S_IFSOCK {
        return Err(SockError::NotASocket(sockfd));
    }

    let ip: Ipv4Addr = addr
        .parse()
        .map_err(|_| SockError::InvalidAddress(addr.to_string()))?;

    let sa = sockaddr_in_from(ip, port);
    // SAFETY: sa lives on the stack for the duration of the call and the
    // length argument matches its size.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_bind,
            sockfd,
            std::ptr::addr_of!(sa),
            std::mem::size_of::<libc::sockaddr_in>() as u32,
        )
    };
    if ret == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EADDRINUSE) {
            return Err(SockError::AddrInUse { addr: ip, port });
        }
        return Err(SockError::Syscall {
            call: "syscall(SYS_bind)",
            source: err,
        });
    }
    Ok(())
}

/// `listen(2)` by syscall number.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_listen(sockfd: RawFd, backlog: i32) -> Result<(), SockError> {
    // SAFETY: two integer arguments.
    let ret = unsafe { libc::syscall(libc::SYS_listen, sockfd, backlog) };
    if ret == -1 {
        return Err(SockError::syscall("syscall(SYS_listen)"));
    }
    Ok(())
}

/// `accept(2)`: blocks for one connection, returns its descriptor and the
/// peer address. No retry on `EINTR`.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_accept(sockfd: RawFd) -> Result<(RawFd, SockName), SockError> {
    // SAFETY: the kernel fills addr up to addrlen bytes; both live on our
    // stack for the whole call.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut addrlen = std::mem::size_of::<libc::sockaddr_in>() as u32;
    let client_fd = unsafe {
        libc::syscall(
            libc::SYS_accept,
            sockfd,
            std::ptr::addr_of_mut!(sa),
            std::ptr::addr_of_mut!(addrlen),
        )
    };
    if client_fd == -1 {
        return Err(SockError::syscall("syscall(SYS_accept)"));
    }
    Ok((client_fd as RawFd, sockname_from(&sa)))
}

/// `connect(2)` to an IPv4 peer. No retry on `EINTR`.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_connect(sockfd: RawFd, peer: SocketAddrV4) -> Result<(), SockError> {
    let sa = sockaddr_in_from(*peer.ip(), peer.port());
    // SAFETY: sa is valid for the length passed.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_connect,
            sockfd,
            std::ptr::addr_of!(sa),
            std::mem::size_of::<libc::sockaddr_in>() as u32,
        )
    };
    if ret == -1 {
        return Err(SockError::syscall("syscall(SYS_connect)"));
    }
    Ok(())
}

/// `sendto(2)` with no destination (connected socket). Returns the number
/// of bytes the kernel accepted, which may be short; the caller loops.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_send(sockfd: RawFd, buf: &[u8]) -> Result<usize, SockError> {
    // SAFETY: buf pointer/length pair is valid for the call.
    let sent = unsafe {
        libc::syscall(
            libc::SYS_sendto,
            sockfd,
            buf.as_ptr(),
            buf.len(),
            0,
            std::ptr::null::<libc::sockaddr>(),
            0,
        )
    };
    if sent == -1 {
        return Err(SockError::syscall("syscall(SYS_sendto)"));
    }
    Ok(sent as usize)
}

/// `recvfrom(2)`: blocks for data, returns the byte count and the source
/// address. A count of zero means the peer closed. No retry on `EINTR`.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_recvfrom(sockfd: RawFd, buf: &mut [u8]) -> Result<(usize, SockName), SockError> {
    // SAFETY: buf and the address output both outlive the call.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut addrlen = std::mem::size_of::<libc::sockaddr_in>() as u32;
    let received = unsafe {
        libc::syscall(
            libc::SYS_recvfrom,
            sockfd,
            buf.as_mut_ptr(),
            buf.len(),
            0,
            std::ptr::addr_of_mut!(sa),
            std::ptr::addr_of_mut!(addrlen),
        )
    };
    if received == -1 {
        return Err(SockError::syscall("syscall(SYS_recvfrom)"));
    }
    Ok((received as usize, sockname_from(&sa)))
}

/// `close(2)` by syscall number.
///
/// # Errors
///
/// Returns `SockError::Syscall` on a negative kernel result.
pub fn net_close(sockfd: RawFd) -> Result<(), SockError> {
    // SAFETY: one integer argument.
    let ret = unsafe { libc::syscall(libc::SYS_close, sockfd) };
    if ret == -1 {
        return Err(SockError::syscall("syscall(SYS_close)"));
    }
    Ok(())
}

/// `getsockname(2)`, best-effort.
///
/// On failure the returned name carries the [`AF_INVALID`] family sentinel;
/// there is no error return.
#[must_use]
pub fn net_getsockname(sockfd: RawFd) -> SockName {
    // SAFETY: the kernel fills sa up to addrlen bytes.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut addrlen = std::mem::size_of::<libc::sockaddr_in>() as u32;
    let ret = unsafe {
        libc::syscall(
            libc::SYS_getsockname,
            sockfd,
            std::ptr::addr_of_mut!(sa),
            std::ptr::addr_of_mut!(addrlen),
        )
    };
    if ret == -1 {
        return SockName {
            family: AF_INVALID,
            addr: Ipv4Addr::UNSPECIFIED,
            port: 0,
        };
    }
    sockname_from(&sa)
}

fn sockname_from(sa: &libc::sockaddr_in) -> SockName {
    SockName {
        family: sa.sin_family,
        addr: Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)),
        port: u16::from_be(sa.sin_port),
    }
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_socket() -> RawFd {
        net_socket(libc::AF_INET, libc::SOCK_STREAM, 0).expect("socket")
    }

    #[test]
    fn test_bind_rejects_non_socket_descriptor() {
        let file = std::fs::File::open("/dev/null").expect("open /dev/null");
        let fd = {
            use std::os::unix::io::AsRawFd;
            file.as_raw_fd()
        };

        match net_bind(fd, "127.0.0.1", 0) {
            Err(SockError::NotASocket(bad)) => assert_eq!(bad, fd),
            other => panic!("expected NotASocket, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_rejects_invalid_ipv4_literal() {
        let fd = tcp_socket();

        // Validation fires before any kernel bind is attempted.
        match net_bind(fd, "999.1.1.1", 8080) {
            Err(SockError::InvalidAddress(addr)) => assert_eq!(addr, "999.1.1.1"),
            other => panic!("expected InvalidAddress, got {other:?}"),
        }
        match net_bind(fd, "not-an-address", 8080) {
            Err(SockError::InvalidAddress(_)) => {}
            other => panic!("expected InvalidAddress, got {other:?}"),
        }

        net_close(fd).expect("close");
    }

    #[test]
    fn test_bind_and_getsockname_roundtrip() {
        let fd = tcp_socket();

        // Port 0: the kernel picks a free one.
        net_bind(fd, "127.0.0.1", 0).expect("bind");

        let name = net_getsockname(fd);
        assert_eq!(name.family, libc::AF_INET as u16);
        assert_eq!(name.addr, Ipv4Addr::new(127, 0, 0, 1));
        assert_ne!(name.port, 0);

        net_close(fd).expect("close");
    }

    #[test]
    fn test_getsockname_sentinel_on_bad_descriptor() {
        let name = net_getsockname(-1);
        assert_eq!(name.family, AF_INVALID);
    }

    #[test]
    fn test_addr_in_use_is_distinguished() {
        let first = tcp_socket();
        net_bind(first, "127.0.0.1", 0).expect("bind first");
        net_listen(first, 1).expect("listen");
        let taken = net_getsockname(first).port;

        let second = tcp_socket();
        match net_bind(second, "127.0.0.1", taken) {
            Err(SockError::AddrInUse { port, .. }) => assert_eq!(port, taken),
            other => panic!("expected AddrInUse, got {other:?}"),
        }

        net_close(second).expect("close second");
        net_close(first).expect("close first");
    }

    #[test]
    fn test_connect_send_recv_over_loopback() {
        let server = tcp_socket();
        net_bind(server, "127.0.0.1", 0).expect("bind");
        net_listen(server, 1).expect("listen");
        let port = net_getsockname(server).port;

        let client = tcp_socket();
        net_connect(client, SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port))
            .expect("connect");

        let (conn, peer) = net_accept(server).expect("accept");
        assert_eq!(peer.addr, Ipv4Addr::new(127, 0, 0, 1));

        let sent = net_send(conn, b"ping").expect("send");
        assert_eq!(sent, 4);

        let mut buf = [0u8; 16];
        let (received, _) = net_recvfrom(client, &mut buf).expect("recv");
        assert_eq!(&buf[..received], b"ping");

        net_close(conn).expect("close conn");
        net_close(client).expect("close client");
        net_close(server).expect("close server");
    }

    #[test]
    fn test_close_rejects_bad_descriptor() {
        match net_close(-1) {
            Err(SockError::Syscall { call, .. }) => assert_eq!(call, "syscall(SYS_close)"),
            other => panic!("expected Syscall error, got {other:?}"),
        }
    }
}

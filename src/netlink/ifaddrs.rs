//! Interface and address enumeration over routing netlink
//!
//! This is the replacement for a capture library's device listing: one link
//! dump builds the interface directory, one address dump augments it. The
//! address dump must run second, because addresses are correlated into
//! records produced by the link dump.
//!
//! Correlation is a linear scan by interface index. Interface tables are
//! small (tens of entries), so no index map is kept.
//!
//! Linux-only, like the socket it drives.
//!
//! Known behavior: each record holds one flattened set of address fields.
//! An interface with several addresses keeps only the last one reported by
//! the kernel; earlier formatted fields are overwritten.

use serde::Serialize;

use crate::netlink::attr::AttrTable;
use crate::netlink::message::{
    build_addr_dump_request, build_link_dump_request, walk_messages, MessageError, WalkOutcome,
};
use crate::netlink::socket::{NetlinkSocket, SocketError};
use crate::netlink::structures::{
    AF_INET, AF_INET6, IFA_ADDRESS, IFA_BROADCAST, IFA_MAX, IFF_BROADCAST, IFF_LOOPBACK,
    IFF_MULTICAST, IFF_NOARP, IFF_POINTOPOINT, IFF_PROMISC, IFF_RUNNING, IFF_UP, IFLA_ADDRESS,
    IFLA_IFNAME, IFLA_MAX, IFLA_MTU, RTM_NEWADDR, RTM_NEWLINK,
};

// ERROR TYPES

/// Enumeration failure, one variant per leg of the error taxonomy.
#[derive(Debug)]
pub enum NetlinkError {
    /// Socket open/send/receive failed. Fatal to the enumeration call,
    /// never to the process.
    Transport(SocketError),
    /// Malformed or truncated message; parsing of that datagram stopped.
    Protocol(MessageError),
    /// The kernel answered with a nonzero error frame; that dump ended.
    Kernel(i32),
}

impl std::fmt::Display for NetlinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetlinkError::Transport(e) => write!(f, "netlink transport error: {e}"),
            NetlinkError::Protocol(e) => write!(f, "netlink protocol error: {e}"),
            NetlinkError::Kernel(code) => {
                write!(
                    f,
                    "netlink error frame: {} (errno {code})",
                    std::io::Error::from_raw_os_error(*code)
                )
            }
        }
    }
}

impl std::error::Error for NetlinkError {}

impl From<SocketError> for NetlinkError {
    fn from(e: SocketError) -> Self {
        NetlinkError::Transport(e)
    }
}

impl From<MessageError> for NetlinkError {
    fn from(e: MessageError) -> Self {
        NetlinkError::Protocol(e)
    }
}

// DATA MODEL

/// One discovered network interface with its flattened address fields.
///
/// Built by the link dump; `mtu`, `name` and `hardware_address` stay at
/// their defaults when the kernel omits the attribute. The address fields
/// are filled in by the address dump and hold the *last* address seen for
/// this interface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterfaceRecord {
    /// Kernel-assigned interface index, unique within one enumeration.
    pub index: i32,
    /// Interface name ("eth0"); empty if the name attribute was absent.
    pub name: String,
    /// IFF_* state bits.
    pub flags: u32,
    /// MTU in bytes; 0 until an MTU attribute supplies it.
    pub mtu: u32,
    /// Link-layer address; all-zero when absent or shorter than 6 bytes.
    pub hardware_address: [u8; 6],
    /// Address family reported for the link itself.
    pub link_family: u8,
    /// Family of the last correlated address (IPv4 or IPv6); 0 if none.
    pub address_family: u8,
    /// Formatted address ("192.0.2.1", "fe80::1"); empty if none.
    pub address: String,
    /// Dotted-decimal mask for IPv4, "/<prefix>" for IPv6; empty if none.
    pub netmask: String,
    /// Formatted broadcast address, IPv4 only; empty otherwise.
    pub broadcast: String,
}

impl InterfaceRecord {
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }

    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.flags & IFF_LOOPBACK != 0
    }

    /// Whether the link dump supplied a usable hardware address.
    #[must_use]
    pub fn has_hardware_address(&self) -> bool {
        self.hardware_address != [0u8; 6]
    }

    /// "aa:bb:cc:dd:ee:ff" form of the hardware address.
    #[must_use]
    pub fn hardware_address_string(&self) -> String {
        let m = &self.hardware_address;
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }

    /// Space-separated flag words, ifconfig style ("UP LOOPBACK RUNNING").
    #[must_use]
    pub fn flags_string(&self) -> String {
        const NAMES: [(u32, &str); 8] = [
            (IFF_UP, "UP"),
            (IFF_BROADCAST, "BROADCAST"),
            (IFF_LOOPBACK, "LOOPBACK"),
            (IFF_POINTOPOINT, "POINTOPOINT"),
            (IFF_RUNNING, "RUNNING"),
            (IFF_NOARP, "NOARP"),
            (IFF_PROMISC, "PROMISC"),
            (IFF_MULTICAST, "MULTICAST"),
        ];
        let words: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.flags & bit != 0)
            .map(|(_, name)| *name)
            .collect();
        words.join(" ")
    }
}

/// Result of one enumeration pass.
///
/// `error` is set when a dump ended early (kernel rejection, transport or
/// protocol failure after the initial send); every record fully built before
/// that point is still present and valid.
#[derive(Debug)]
pub struct InterfaceDump {
    pub interfaces: Vec<InterfaceRecord>,
    pub error: Option<NetlinkError>,
}

// NETMASK DERIVATION

/// Dotted-decimal IPv4 netmask implied by a prefix length.
///
/// Prefix 0 yields "0.0.0.0" and 32 yields "255.255.255.255". The shift is
/// guarded: prefix 0 never executes a 32-bit shift by 32.
///
/// # Errors
///
/// A prefix above 32 violates the kernel contract and is rejected.
pub fn ipv4_netmask(prefix: u8) -> Result<String, MessageError> {
    if prefix > 32 {
        return Err(MessageError::invalid_prefix(prefix));
    }
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    Ok(std::net::Ipv4Addr::from(mask).to_string())
}

// LINK DUMP (Interface Directory Builder)

/// Interpret bytes from an `IFLA_IFNAME` attribute: NUL-terminated text.
fn name_from_attr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decode one `RTM_NEWLINK` payload and append a record.
///
/// Payload layout: 16-byte `IfInfoMsg`, then attributes. Absent attributes
/// leave the record's defaults in place; a hardware-address attribute
/// shorter than 6 bytes is ignored rather than partially read.
///
/// # Errors
///
/// Returns `MessageError` if the payload cannot hold the fixed header.
pub fn append_link_record(
    records: &mut Vec<InterfaceRecord>,
    payload: &[u8],
) -> Result<(), MessageError> {
    const FIXED: usize = 16; // size_of::<IfInfoMsg>()
    if payload.len() < FIXED {
        return Err(MessageError::truncated("ifinfomsg", payload.len(), FIXED));
    }

    let mut record = InterfaceRecord {
        link_family: payload[0],
        index: i32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]),
        flags: u32::from_ne_bytes([payload[8], payload[9], payload[10], payload[11]]),
        ..InterfaceRecord::default()
    };

    // Copy what we keep out of the attribute views now; the table borrows
    // the receive buffer and dies with this message.
    let attrs = AttrTable::parse(&payload[FIXED..], IFLA_MAX);

    if let Some(name) = attrs.get(IFLA_IFNAME) {
        record.name = name_from_attr(name);
    }
    if let Some(mtu) = attrs.get(IFLA_MTU) {
        if mtu.len() >= 4 {
            record.mtu = u32::from_ne_bytes([mtu[0], mtu[1], mtu[2], mtu[3]]);
        }
    }
    if let Some(mac) = attrs.get(IFLA_ADDRESS) {
        if mac.len() >= 6 {
            record.hardware_address.copy_from_slice(&mac[..6]);
        }
    }

    records.push(record);
    Ok(())
}

// ADDRESS DUMP (Address Resolver)

/// Decode one `RTM_NEWADDR` payload and fold it into the matching record.
///
/// An address referencing an index absent from the link dump is skipped
/// silently: link and address dumps are independent kernel queries and may
/// race with interface changes in between.
///
/// # Errors
///
/// Returns `MessageError` if the payload cannot hold the fixed header or
/// carries a prefix length outside 0..=32 for an IPv4 address.
pub fn apply_address(
    records: &mut [InterfaceRecord],
    payload: &[u8],
) -> Result<(), MessageError> {
    const FIXED: usize = 8; // size_of::<IfAddrMsg>()
    if payload.len() < FIXED {
        return Err(MessageError::truncated("ifaddrmsg", payload.len(), FIXED));
    }

    let family = payload[0];
    let prefixlen = payload[1];
    let index = u32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]);

    let Some(record) = records
        .iter_mut()
        .find(|r| r.index >= 0 && r.index as u32 == index)
    else {
        log::debug!("address for unknown interface index {index}, skipping");
        return Ok(());
    };

    let attrs = AttrTable::parse(&payload[FIXED..], IFA_MAX);

    record.address_family = family;

    if let Some(addr) = attrs.get(IFA_ADDRESS) {
        match family {
            AF_INET if addr.len() >= 4 => {
                record.address =
                    std::net::Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]).to_string();
            }
            AF_INET6 if addr.len() >= 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&addr[..16]);
                record.address = std::net::Ipv6Addr::from(octets).to_string();
            }
            _ => {}
        }
    }

    // Broadcast is an IPv4 concept; the attribute is absent for IPv6.
    if family == AF_INET {
        if let Some(brd) = attrs.get(IFA_BROADCAST) {
            if brd.len() >= 4 {
                record.broadcast =
                    std::net::Ipv4Addr::new(brd[0], brd[1], brd[2], brd[3]).to_string();
            }
        }
        record.netmask = ipv4_netmask(prefixlen)?;
    } else if family == AF_INET6 {
        record.netmask = format!("/{prefixlen}");
    }

    Ok(())
}

// DUMP DRIVER

/// Receive datagrams for one dump until it terminates.
///
/// Messages of a kind other than `expected` are logged and skipped; the
/// kernel may interleave unrelated notifications.
fn drain_dump<F>(socket: &NetlinkSocket, expected: u16, mut apply: F) -> Result<(), NetlinkError>
where
    F: FnMut(&[u8]) -> Result<(), MessageError>,
{
    let mut buffer = vec![0u8; 32768];

    loop {
        let received = socket.recv(&mut buffer)?;

        let outcome = walk_messages(&buffer[..received], &mut |kind, payload| {
            if kind == expected {
                apply(payload)
            } else {
                log::debug!("skipping unexpected message type {kind}");
                Ok(())
            }
        })?;

        match outcome {
            WalkOutcome::DumpComplete => return Ok(()),
            WalkOutcome::KernelError(code) => return Err(NetlinkError::Kernel(code)),
            WalkOutcome::MoreToCome => {}
        }
    }
}

/// Enumerate interfaces and their addresses in one fresh session.
///
/// Opens its own routing socket, runs the link dump, then the address dump
/// against the records the link dump produced, and closes the socket. Every
/// call starts from scratch; nothing persists between calls.
///
/// A dump cut short (kernel rejection, transport or protocol failure) does
/// not discard what was already built: the partial record set is returned
/// with [`InterfaceDump::error`] set to the first such failure.
///
/// # Errors
///
/// Returns `Err` only when nothing could be collected at all: the socket
/// could not be opened or the initial link-dump request could not be sent.
pub fn netlink_getifaddrs() -> Result<InterfaceDump, NetlinkError> {
    let socket = NetlinkSocket::open()?;
    let mut records: Vec<InterfaceRecord> = Vec::new();

    socket.send(&build_link_dump_request(1))?;
    let mut error = drain_dump(&socket, RTM_NEWLINK, |payload| {
        append_link_record(&mut records, payload)
    })
    .err();

    // No directory means nothing to correlate addresses into.
    if !records.is_empty() {
        let addr_result = socket
            .send(&build_addr_dump_request(2))
            .map_err(NetlinkError::from)
            .and_then(|()| {
                drain_dump(&socket, RTM_NEWADDR, |payload| {
                    apply_address(&mut records, payload)
                })
            });
        if let Err(e) = addr_result {
            log::warn!("address dump ended early: {e}");
            error.get_or_insert(e);
        }
    }

    if let Some(e) = &error {
        log::warn!("enumeration incomplete: {e}");
    }

    Ok(InterfaceDump {
        interfaces: records,
        error,
    })
}

// TESTS

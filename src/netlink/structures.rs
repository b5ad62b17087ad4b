//! Binary structures for the routing-netlink (rtnetlink) protocol
//!
//! These structures use `#[repr(C)]` to match kernel layout exactly.
//! Netlink headers are host byte order; addresses carried in attributes
//! are network byte order and are decoded in `ifaddrs`.

// NETLINK MESSAGE HEADER

/// Netlink message header (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

// LINK DUMP FIXED HEADER

/// Interface info message (16 bytes), payload head of `RTM_NEWLINK`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

// ADDRESS DUMP FIXED HEADER

/// Interface address message (8 bytes), payload head of `RTM_NEWADDR`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

// ROUTING ATTRIBUTE HEADER

/// Routing attribute header (4 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtAttr {
    pub rta_len: u16,
    pub rta_type: u16,
}

// CONSTANTS

// Netlink control message types
pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const NLMSG_OVERRUN: u16 = 4;

// rtnetlink message types
pub const RTM_NEWLINK: u16 = 16;
pub const RTM_GETLINK: u16 = 18;
pub const RTM_NEWADDR: u16 = 20;
pub const RTM_GETADDR: u16 = 22;

// Netlink flags
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;

// Request flags
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Address families
pub const AF_UNSPEC: u8 = 0;
pub const AF_INET: u8 = 2;
pub const AF_INET6: u8 = 10;

// Link-level attributes (IFLA_*)
pub const IFLA_UNSPEC: u16 = 0;
pub const IFLA_ADDRESS: u16 = 1;
pub const IFLA_BROADCAST: u16 = 2;
pub const IFLA_IFNAME: u16 = 3;
pub const IFLA_MTU: u16 = 4;
pub const IFLA_LINK: u16 = 5;
pub const IFLA_QDISC: u16 = 6;
pub const IFLA_STATS: u16 = 7;
/// Highest link attribute type we index; higher types are skipped.
pub const IFLA_MAX: u16 = 7;

// Address attributes (IFA_*)
pub const IFA_UNSPEC: u16 = 0;
pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;
pub const IFA_LABEL: u16 = 3;
pub const IFA_BROADCAST: u16 = 4;
pub const IFA_ANYCAST: u16 = 5;
pub const IFA_CACHEINFO: u16 = 6;
/// Highest address attribute type we index.
pub const IFA_MAX: u16 = 6;

// Interface flags (IFF_*), bit positions match the kernel's if.h
pub const IFF_UP: u32 = 0x1;
pub const IFF_BROADCAST: u32 = 0x2;
pub const IFF_DEBUG: u32 = 0x4;
pub const IFF_LOOPBACK: u32 = 0x8;
pub const IFF_POINTOPOINT: u32 = 0x10;
pub const IFF_NOTRAILERS: u32 = 0x20;
pub const IFF_RUNNING: u32 = 0x40;
pub const IFF_NOARP: u32 = 0x80;
pub const IFF_PROMISC: u32 = 0x100;
pub const IFF_ALLMULTI: u32 = 0x200;
pub const IFF_MASTER: u32 = 0x400;
pub const IFF_SLAVE: u32 = 0x800;
pub const IFF_MULTICAST: u32 = 0x1000;

/// Kernel-imposed maximum interface name length, including NUL
pub const IF_NAMESIZE: usize = 16;

// HELPER FUNCTIONS

/// Align length to 4-byte boundary
#[must_use]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}

/// Calculate Netlink message length (header + payload)
#[must_use]
pub const fn nlmsg_length(payload_len: usize) -> u32 {
    (std::mem::size_of::<NlMsgHdr>() + payload_len) as u32
}

/// Calculate space a Netlink message occupies on the wire
#[must_use]
pub const fn nlmsg_space(payload_len: usize) -> usize {
    nlmsg_align(std::mem::size_of::<NlMsgHdr>() + payload_len)
}

/// Align attribute length to 4-byte boundary
#[must_use]
pub const fn rta_align(len: usize) -> usize {
    (len + 3) & !3
}

/// Calculate attribute length (header + payload)
#[must_use]
pub const fn rta_length(payload_len: usize) -> u16 {
    (std::mem::size_of::<RtAttr>() + payload_len) as u16
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<NlMsgHdr>(), 16);
        assert_eq!(std::mem::size_of::<IfInfoMsg>(), 16);
        assert_eq!(std::mem::size_of::<IfAddrMsg>(), 8);
        assert_eq!(std::mem::size_of::<RtAttr>(), 4);
    }

    #[test]
    fn test_alignment() {
        assert_eq!(nlmsg_align(0), 0);
        assert_eq!(nlmsg_align(1), 4);
        assert_eq!(nlmsg_align(3), 4);
        assert_eq!(nlmsg_align(4), 4);
        assert_eq!(nlmsg_align(5), 8);
        assert_eq!(rta_align(6), 8);
        assert_eq!(rta_align(8), 8);
    }

    #[test]
    fn test_message_length() {
        assert_eq!(nlmsg_length(std::mem::size_of::<IfInfoMsg>()), 32);
        assert_eq!(nlmsg_length(std::mem::size_of::<IfAddrMsg>()), 24);
        assert_eq!(nlmsg_space(std::mem::size_of::<IfAddrMsg>()), 24);
    }

    #[test]
    fn test_rta_length() {
        assert_eq!(rta_length(0), 4);
        assert_eq!(rta_length(4), 8);
    }
}

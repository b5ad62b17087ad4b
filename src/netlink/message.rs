//! Netlink message construction and datagram walking
//!
//! Requests are a 16-byte netlink header followed by a family-unspecified
//! fixed body (`IfInfoMsg` for link dumps, `IfAddrMsg` for address dumps),
//! padded to a 4-byte boundary.
//!
//! Responses arrive as datagrams that may hold several concatenated
//! messages, each individually length-prefixed. `walk_messages` splits one
//! datagram and advances by the *aligned* length of every message; advancing
//! by the logical length would desynchronize the walk on padded messages.

use crate::netlink::structures::{
    nlmsg_align, nlmsg_length, IfAddrMsg, IfInfoMsg, NlMsgHdr, NLMSG_DONE, NLMSG_ERROR,
    NLMSG_NOOP, NLM_F_DUMP, NLM_F_REQUEST, RTM_GETADDR, RTM_GETLINK,
};

// ERROR TYPE

/// Malformed or truncated wire data (the protocol-error leg).
///
/// Walking stops at the offending message; everything dispatched before it
/// stays applied.
#[derive(Debug)]
pub struct MessageError {
    message: String,
}

impl MessageError {
    fn new(message: String) -> Self {
        Self { message }
    }

    /// A fixed header did not fit in the bytes the message declared.
    pub(crate) fn truncated(what: &str, got: usize, need: usize) -> Self {
        Self::new(format!("{what} truncated: {got} bytes, need {need}"))
    }

    /// Prefix length outside the 0..=32 contract for an IPv4 address.
    pub(crate) fn invalid_prefix(prefix: u8) -> Self {
        Self::new(format!("IPv4 prefix length {prefix} out of range"))
    }
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MessageError {}

// REQUEST CONSTRUCTION

/// Serialize a `#[repr(C)]` request struct into `buffer`.
///
/// SAFETY: only instantiated with `NlMsgHdr`, `IfInfoMsg` and `IfAddrMsg`,
/// all of which are `#[repr(C)]` plain-data structs with no padding-
/// sensitive reads on the receiving side (the kernel defines the layout).
fn extend_with_struct<T: Copy>(buffer: &mut Vec<u8>, value: &T) {
    let bytes = unsafe {
        std::slice::from_raw_parts(
            std::ptr::from_ref(value).cast::<u8>(),
            std::mem::size_of::<T>(),
        )
    };
    buffer.extend_from_slice(bytes);
}

fn build_dump_request(msg_type: u16, payload_len: usize, seq: u32) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(nlmsg_align(
        std::mem::size_of::<NlMsgHdr>() + payload_len,
    ));

    let nlh = NlMsgHdr {
        nlmsg_len: nlmsg_length(payload_len),
        nlmsg_type: msg_type,
        nlmsg_flags: NLM_F_REQUEST | NLM_F_DUMP,
        nlmsg_seq: seq,
        nlmsg_pid: std::process::id(),
    };
    extend_with_struct(&mut buffer, &nlh);
    buffer
}

/// Build a "dump all links" request, family unspecified.
#[must_use]
pub fn build_link_dump_request(seq: u32) -> Vec<u8> {
    let ifm = IfInfoMsg {
        ifi_family: 0, // AF_UNSPEC: all families
        ifi_pad: 0,
        ifi_type: 0,
        ifi_index: 0,
        ifi_flags: 0,
        ifi_change: 0,
    };
    let mut buffer = build_dump_request(RTM_GETLINK, std::mem::size_of::<IfInfoMsg>(), seq);
    extend_with_struct(&mut buffer, &ifm);
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
    buffer
}

/// Build a "dump all addresses" request, family unspecified.
#[must_use]
pub fn build_addr_dump_request(seq: u32) -> Vec<u8> {
    let ifa = IfAddrMsg {
        ifa_family: 0, // AF_UNSPEC
        ifa_prefixlen: 0,
        ifa_flags: 0,
        ifa_scope: 0,
        ifa_index: 0,
    };
    let mut buffer = build_dump_request(RTM_GETADDR, std::mem::size_of::<IfAddrMsg>(), seq);
    extend_with_struct(&mut buffer, &ifa);
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
    buffer
}

// DATAGRAM WALKING

/// Outcome of walking one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Datagram exhausted; the dump continues in the next datagram.
    MoreToCome,
    /// `NLMSG_DONE` seen; the dump is complete (possibly empty).
    DumpComplete,
    /// Nonzero error frame; the kernel refused or aborted the dump.
    /// Messages dispatched before the frame stay applied.
    KernelError(i32),
}

/// Split one datagram into messages and hand every payload of interest to
/// `handler` together with its message type.
///
/// Control messages are consumed here: `NLMSG_DONE` terminates the dump,
/// `NLMSG_NOOP` is skipped, and an `NLMSG_ERROR` frame has its embedded code
/// decoded. A code of zero is an explicit acknowledgement and the walk
/// continues; a nonzero code ends the walk with `WalkOutcome::KernelError`.
///
/// # Errors
///
/// Returns `MessageError` when a message declares a length shorter than the
/// netlink header or longer than the bytes actually received. Handler errors
/// propagate unchanged.
pub fn walk_messages<F>(datagram: &[u8], handler: &mut F) -> Result<WalkOutcome, MessageError>
where
    F: FnMut(u16, &[u8]) -> Result<(), MessageError>,
{
    let hdr_len = std::mem::size_of::<NlMsgHdr>();
    let mut offset = 0usize;

    while offset + hdr_len <= datagram.len() {
        let nlmsg_len = u32::from_ne_bytes([
            datagram[offset],
            datagram[offset + 1],
            datagram[offset + 2],
            datagram[offset + 3],
        ]) as usize;
        let nlmsg_type = u16::from_ne_bytes([datagram[offset + 4], datagram[offset + 5]]);

        if nlmsg_len < hdr_len {
            return Err(MessageError::new(format!(
                "message length {nlmsg_len} below header size {hdr_len}"
            )));
        }
        if nlmsg_len > datagram.len() - offset {
            return Err(MessageError::new(format!(
                "message length {} exceeds datagram (offset={}, received={})",
                nlmsg_len,
                offset,
                datagram.len()
            )));
        }

        let payload = &datagram[offset + hdr_len..offset + nlmsg_len];

        match nlmsg_type {
            NLMSG_DONE => return Ok(WalkOutcome::DumpComplete),
            NLMSG_ERROR => {
                let code = parse_error_code(payload)?;
                if code != 0 {
                    return Ok(WalkOutcome::KernelError(code));
                }
                // code 0 is an ack, not a failure
            }
            NLMSG_NOOP => {}
            _ => handler(nlmsg_type, payload)?,
        }

        offset += nlmsg_align(nlmsg_len);
    }

    Ok(WalkOutcome::MoreToCome)
}

/// Decode the signed error code embedded in an `NLMSG_ERROR` payload.
///
/// The kernel stores errno negated (`-EACCES` for a refused dump); the
/// returned value is normalized to a positive errno, with 0 meaning an
/// explicit acknowledgement.
///
/// # Errors
///
/// Returns `MessageError` if the payload cannot hold the code.
pub fn parse_error_code(payload: &[u8]) -> Result<i32, MessageError> {
    if payload.len() < 4 {
        return Err(MessageError::new(format!(
            "error frame payload too short: {} bytes",
            payload.len()
        )));
    }
    let code = i32::from_ne_bytes([payload[0], payload[1], payload[2], payload[3]]);
    Ok(-code)
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::structures::{RTM_NEWADDR, RTM_NEWLINK};

    fn push_header(buf: &mut Vec<u8>, len: u32, msg_type: u16) {
        let nlh = NlMsgHdr {
            nlmsg_len: len,
            nlmsg_type: msg_type,
            nlmsg_flags: 0,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        };
        extend_with_struct(buf, &nlh);
    }

    fn collect_payloads(datagram: &[u8]) -> (WalkOutcome, Vec<(u16, Vec<u8>)>) {
        let mut seen = Vec::new();
        let outcome = walk_messages(datagram, &mut |kind, payload| {
            seen.push((kind, payload.to_vec()));
            Ok(())
        })
        .expect("walk");
        (outcome, seen)
    }

    #[test]
    fn test_link_request_shape() {
        let msg = build_link_dump_request(7);

        assert_eq!(msg.len(), 32);
        assert_eq!(msg.len() % 4, 0);

        let len = u32::from_ne_bytes([msg[0], msg[1], msg[2], msg[3]]);
        let msg_type = u16::from_ne_bytes([msg[4], msg[5]]);
        let flags = u16::from_ne_bytes([msg[6], msg[7]]);
        let seq = u32::from_ne_bytes([msg[8], msg[9], msg[10], msg[11]]);
        let pid = u32::from_ne_bytes([msg[12], msg[13], msg[14], msg[15]]);

        assert_eq!(len as usize, msg.len());
        assert_eq!(msg_type, RTM_GETLINK);
        assert_eq!(flags, NLM_F_REQUEST | NLM_F_DUMP);
        assert_eq!(seq, 7);
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_addr_request_shape() {
        let msg = build_addr_dump_request(8);

        assert_eq!(msg.len(), 24);
        let msg_type = u16::from_ne_bytes([msg[4], msg[5]]);
        assert_eq!(msg_type, RTM_GETADDR);
        // ifa_family = AF_UNSPEC
        assert_eq!(msg[16], 0);
    }

    #[test]
    fn test_walk_dispatches_and_completes() {
        let mut data = Vec::new();

        push_header(&mut data, 20, RTM_NEWLINK);
        data.extend_from_slice(&[1, 2, 3, 4]);

        push_header(&mut data, 20, RTM_NEWADDR);
        data.extend_from_slice(&[5, 6, 7, 8]);

        push_header(&mut data, 16, NLMSG_DONE);

        let (outcome, seen) = collect_payloads(&data);
        assert_eq!(outcome, WalkOutcome::DumpComplete);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (RTM_NEWLINK, vec![1, 2, 3, 4]));
        assert_eq!(seen[1], (RTM_NEWADDR, vec![5, 6, 7, 8]));
    }

    #[test]
    fn test_walk_advances_by_aligned_length() {
        let mut data = Vec::new();

        // 18-byte message occupies 20 bytes on the wire.
        push_header(&mut data, 18, RTM_NEWLINK);
        data.extend_from_slice(&[0xAA, 0xBB]);
        data.extend_from_slice(&[0, 0]); // padding

        push_header(&mut data, 16, NLMSG_DONE);

        let (outcome, seen) = collect_payloads(&data);
        assert_eq!(outcome, WalkOutcome::DumpComplete);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_datagram_without_done_wants_more() {
        let mut data = Vec::new();
        push_header(&mut data, 16, RTM_NEWLINK);

        let (outcome, seen) = collect_payloads(&data);
        assert_eq!(outcome, WalkOutcome::MoreToCome);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_error_frame_zero_is_ack() {
        let mut data = Vec::new();
        push_header(&mut data, 20, NLMSG_ERROR);
        data.extend_from_slice(&0i32.to_ne_bytes());

        // Ack does not end the dump; a later message is still dispatched.
        push_header(&mut data, 16, RTM_NEWLINK);

        let (outcome, seen) = collect_payloads(&data);
        assert_eq!(outcome, WalkOutcome::MoreToCome);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_error_frame_nonzero_halts_dump() {
        let mut data = Vec::new();
        push_header(&mut data, 20, RTM_NEWLINK);
        data.extend_from_slice(&[9, 9, 9, 9]);

        // EACCES, negated per kernel convention.
        push_header(&mut data, 20, NLMSG_ERROR);
        data.extend_from_slice(&(-13i32).to_ne_bytes());

        push_header(&mut data, 16, RTM_NEWLINK);

        let (outcome, seen) = collect_payloads(&data);
        assert_eq!(outcome, WalkOutcome::KernelError(13));
        // The record before the frame was dispatched; the one after was not.
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_undersized_message_length_rejected() {
        let mut data = Vec::new();
        push_header(&mut data, 8, RTM_NEWLINK);

        let result = walk_messages(&data, &mut |_, _| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn test_overlong_message_length_rejected() {
        let mut data = Vec::new();
        push_header(&mut data, 64, RTM_NEWLINK);
        data.extend_from_slice(&[0; 4]); // far fewer than 64 bytes

        let result = walk_messages(&data, &mut |_, _| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_frame_truncated_payload_rejected() {
        let mut data = Vec::new();
        push_header(&mut data, 18, NLMSG_ERROR);
        data.extend_from_slice(&[0, 0]);

        let result = walk_messages(&data, &mut |_, _| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_error_code_normalizes_sign() {
        assert_eq!(parse_error_code(&(-2i32).to_ne_bytes()).expect("code"), 2);
        assert_eq!(parse_error_code(&0i32.to_ne_bytes()).expect("code"), 0);
    }
}

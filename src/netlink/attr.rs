//! Routing-attribute (TLV) table parsing
//!
//! Every rtnetlink message carries a run of 4-byte-aligned, length-prefixed
//! attributes after its fixed header. This module walks that region once and
//! builds a table indexed by attribute type, where each slot is a borrowed
//! view into the original receive buffer.
//!
//! The table borrows; it never copies. Anything a caller needs beyond the
//! current message (interface name, address bytes) must be copied into an
//! owned record before the receive buffer is reused.

use crate::netlink::structures::{rta_align, RtAttr};

/// Attribute table for one message, indexed by attribute type.
///
/// Slot `t` holds the payload of the attribute with type `t`, or `None` if
/// the message did not carry that attribute. Types above the maximum the
/// caller asked for are skipped, never stored.
#[derive(Debug)]
pub struct AttrTable<'a> {
    slots: Vec<Option<&'a [u8]>>,
}

impl<'a> AttrTable<'a> {
    /// Walk the attribute region `data` and index every attribute with type
    /// `<= max_type`.
    ///
    /// The walk is defensive: it stops as soon as the remaining bytes cannot
    /// hold another attribute header, or an attribute declares a length that
    /// is shorter than its own header or runs past the end of the buffer.
    /// Nothing is read past `data`, and nothing from a malformed attribute
    /// onward is stored.
    #[must_use]
    pub fn parse(data: &'a [u8], max_type: u16) -> Self {
        let hdr = std::mem::size_of::<RtAttr>();
        let mut slots = vec![None; usize::from(max_type) + 1];
        let mut offset = 0usize;

        while offset + hdr <= data.len() {
            // rta_len and rta_type are native-endian u16s at the front of
            // the attribute.
            let rta_len =
                usize::from(u16::from_ne_bytes([data[offset], data[offset + 1]]));
            let rta_type = u16::from_ne_bytes([data[offset + 2], data[offset + 3]]);

            // Declared length must cover its own header and fit in what is
            // left of the buffer; otherwise the region is truncated or
            // malformed and the walk ends here.
            if rta_len < hdr || rta_len > data.len() - offset {
                break;
            }

            if rta_type <= max_type {
                slots[usize::from(rta_type)] = Some(&data[offset + hdr..offset + rta_len]);
            }

            // Advance by the padded length, not the logical one.
            offset += rta_align(rta_len);
        }

        Self { slots }
    }

    /// Payload of the attribute with the given type, if present.
    #[must_use]
    pub fn get(&self, attr_type: u16) -> Option<&'a [u8]> {
        self.slots.get(usize::from(attr_type)).copied().flatten()
    }
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    /// Append one attribute (header + payload + alignment padding).
    fn push_attr(buf: &mut Vec<u8>, attr_type: u16, payload: &[u8]) {
        let rta_len = (4 + payload.len()) as u16;
        buf.extend_from_slice(&rta_len.to_ne_bytes());
        buf.extend_from_slice(&attr_type.to_ne_bytes());
        buf.extend_from_slice(payload);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    #[test]
    fn test_empty_region() {
        let table = AttrTable::parse(&[], 7);
        for t in 0..=7 {
            assert!(table.get(t).is_none());
        }
    }

    #[test]
    fn test_single_attribute() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 4, &1500u32.to_ne_bytes());

        let table = AttrTable::parse(&buf, 7);
        assert_eq!(table.get(4), Some(&1500u32.to_ne_bytes()[..]));
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_multiple_attributes_with_padding() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 3, b"eth0\0"); // 9 bytes, padded to 12
        push_attr(&mut buf, 1, &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        push_attr(&mut buf, 4, &9000u32.to_ne_bytes());

        let table = AttrTable::parse(&buf, 7);
        assert_eq!(table.get(3), Some(&b"eth0\0"[..]));
        assert_eq!(table.get(1).map(<[u8]>::len), Some(6));
        assert_eq!(table.get(4), Some(&9000u32.to_ne_bytes()[..]));
    }

    #[test]
    fn test_type_above_max_is_skipped() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 9, b"skip");
        push_attr(&mut buf, 2, b"keep");

        // Max type 7: attribute 9 is skipped but the walk continues past it.
        let table = AttrTable::parse(&buf, 7);
        assert_eq!(table.get(2), Some(&b"keep"[..]));
        assert!(table.get(7).is_none());
    }

    #[test]
    fn test_overlength_attribute_stops_walk() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 2, b"ok");

        // Claim 64 bytes of payload but provide none.
        buf.extend_from_slice(&68u16.to_ne_bytes());
        buf.extend_from_slice(&3u16.to_ne_bytes());

        // A well-formed attribute after the malformed one must not be found.
        let resume_at = buf.len();
        push_attr(&mut buf, 4, &1500u32.to_ne_bytes());
        assert!(resume_at < buf.len());

        let table = AttrTable::parse(&buf, 7);
        assert_eq!(table.get(2), Some(&b"ok"[..]));
        assert!(table.get(3).is_none());
        assert!(table.get(4).is_none());
    }

    #[test]
    fn test_undersized_length_stops_walk() {
        let mut buf = Vec::new();
        // rta_len 2 cannot even cover the attribute header.
        buf.extend_from_slice(&2u16.to_ne_bytes());
        buf.extend_from_slice(&1u16.to_ne_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);

        let table = AttrTable::parse(&buf, 7);
        assert!(table.get(1).is_none());
    }

    #[test]
    fn test_truncated_header_ignored() {
        // Three stray bytes: not enough for an attribute header.
        let table = AttrTable::parse(&[8, 0, 1], 7);
        assert!(table.get(1).is_none());
    }

    #[test]
    fn test_zero_length_payload() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 5, &[]);

        let table = AttrTable::parse(&buf, 7);
        assert_eq!(table.get(5), Some(&[][..]));
    }
}

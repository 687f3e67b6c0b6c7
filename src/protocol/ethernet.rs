//! Ethernet II and IEEE 802.3 header scanners.
//!
//! Both frame formats share the first 14 bytes; the two-byte field after
//! the addresses is an EtherType when it is 0x600 or larger and an 802.3
//! frame length otherwise. Each scanner checks the field and hands the
//! frame to its sibling when the other format is on the wire, so either
//! entry point accepts either frame.

use crate::protocol::{lookup_ethertype, ProtocolId};
use crate::scanner::ScanState;
use crate::wire;

/// Well-known EtherType values.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const QINQ: u16 = 0x88A8;
    /// Pre-standard 802.1ad S-VLAN tag.
    pub const QINQ_OLD: u16 = 0x9100;
}

pub const ETHERNET_HEADER_LEN: usize = 14;

/// Values below this in the type/length field mean an 802.3 frame length.
pub const ETHERNET_TYPE_BOUNDARY: u16 = 0x600;

/// Fold a 6-byte MAC address into a 32-bit flow-pair value: the last four
/// bytes taken literally, XORed with the first two.
fn mac_hash(buf: &[u8], offset: usize) -> u32 {
    wire::read_u32_be(buf, offset + 2) ^ u32::from(wire::read_u16_be(buf, offset))
}

/// Scan an Ethernet II header.
pub(crate) fn scan_ethernet(scan: &mut ScanState) {
    if scan.remaining() < ETHERNET_HEADER_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    scan.length = ETHERNET_HEADER_LEN;

    let ether_type = wire::read_u16_be(buf, offset + 12);

    if scan.flow_key_mut().mark(ProtocolId::ETHERNET) {
        let dst = mac_hash(buf, offset);
        let src = mac_hash(buf, offset + 6);
        let key = scan.flow_key_mut();
        key.set_pair(0, ProtocolId::ETHERNET, dst, src);
        key.set_pair(1, ProtocolId::ETHERNET, u32::from(ether_type), u32::from(ether_type));
    }

    if ether_type < ETHERNET_TYPE_BOUNDARY {
        scan_802dot3(scan);
    } else {
        scan.next_id = scan.validate_next(lookup_ethertype(ether_type));
    }
}

/// Scan an IEEE 802.3 frame: the length field bounds the LLC payload, and
/// whatever the capture holds past it is trailer padding.
pub(crate) fn scan_802dot3(scan: &mut ScanState) {
    if scan.remaining() < ETHERNET_HEADER_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    scan.length = ETHERNET_HEADER_LEN;

    let type_or_len = wire::read_u16_be(buf, offset + 12);
    if type_or_len >= ETHERNET_TYPE_BOUNDARY {
        scan_ethernet(scan);
        return;
    }

    scan.next_id = scan.validate_next(ProtocolId::IEEE_802DOT2);

    let frame_len = type_or_len as usize;
    scan.hdr_payload = frame_len.saturating_sub(ETHERNET_HEADER_LEN);
    scan.hdr_postfix = scan.buf_len.saturating_sub(frame_len);

    if scan.flow_key_mut().mark(ProtocolId::IEEE_802DOT3) {
        let dst = mac_hash(buf, offset);
        let src = mac_hash(buf, offset + 6);
        let key = scan.flow_key_mut();
        key.set_pair(0, ProtocolId::IEEE_802DOT3, dst, src);
        // An 802.3 frame has no EtherType; only the address pair remains.
        key.truncate_pairs(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    #[test]
    fn ethernet_ii_chains_on_ethertype() {
        // dst, src, ethertype 0x0800, one payload byte
        let frame = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, //
            0x08, 0x00, //
            0x45,
        ];
        let mut h = Harness::new();
        let mut scan = h.state(&frame, ProtocolId::ETHERNET);

        scan_ethernet(&mut scan);

        assert_eq!(scan.length, 14);
        assert_eq!(scan.next_id, ProtocolId::IP4);
    }

    #[test]
    fn ethernet_contributes_mac_and_type_pairs() {
        let frame = [
            0xde, 0xad, 0xbe, 0xef, 0xca, 0xfe, //
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, //
            0x86, 0xdd,
        ];
        let mut h = Harness::new();
        let mut scan = h.state(&frame, ProtocolId::ETHERNET);

        scan_ethernet(&mut scan);

        let key = scan.packet().flow_key();
        assert_eq!(key.pair_count(), 2);
        assert_eq!(key.pair(0, false).0, 0xbeefcafe ^ 0xdead);
        assert_eq!(key.pair(0, false).1, 0x56789abc ^ 0x1234);
        assert_eq!(key.pair(1, false), (0x86dd, 0x86dd));
        assert_eq!(key.pair_id(0), ProtocolId::ETHERNET);
    }

    #[test]
    fn short_frame_leaves_length_zero() {
        let frame = [0xff, 0xff, 0xff, 0xff, 0xff];
        let mut h = Harness::new();
        let mut scan = h.state(&frame, ProtocolId::ETHERNET);

        scan_ethernet(&mut scan);

        assert_eq!(scan.length, 0);
    }

    #[test]
    fn dot3_frame_computes_payload_and_postfix() {
        // length field 0x30 = 48: 14 header + 34 payload, 12 trailer bytes
        let mut frame = vec![0u8; 60];
        frame[12] = 0x00;
        frame[13] = 0x30;
        let mut h = Harness::new();
        let mut scan = h.state(&frame, ProtocolId::ETHERNET);

        scan_ethernet(&mut scan);

        assert_eq!(scan.length, 14);
        assert_eq!(scan.next_id, ProtocolId::IEEE_802DOT2);
        assert_eq!(scan.hdr_payload, 48 - 14);
        assert_eq!(scan.hdr_postfix, 60 - 48);
    }

    #[test]
    fn dot3_entry_point_accepts_ethernet_ii() {
        let frame = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, //
            0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, //
            0x08, 0x06, // ARP
        ];
        let mut h = Harness::new();
        let mut scan = h.state(&frame, ProtocolId::IEEE_802DOT3);

        scan_802dot3(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::ARP);
    }
}

//! IPv6 header scanner, including the extension-header chain.

use crate::protocol::ProtocolId;
use crate::scanner::{header_flags, ScanState};
use crate::wire;

pub const IP6_HEADER_LEN: usize = 40;

/// IPv6 next-header values for the extension chain.
pub mod ip6_ext {
    pub const HOP_BY_HOP: u8 = 0;
    pub const ROUTING: u8 = 43;
    pub const FRAGMENT: u8 = 44;
    pub const ESP: u8 = 50;
    pub const AUTH: u8 = 51;
    pub const NO_NEXT_HEADER: u8 = 59;
    pub const DEST_OPTIONS: u8 = 60;
    pub const MOBILITY: u8 = 135;
}

/// Upper bound on extension headers walked before declaring the chain
/// malformed and degrading to payload.
const MAX_EXTENSION_HEADERS: usize = 32;

/// XOR-fold a 16-byte address into one 32-bit flow-pair value.
fn fold_addr(buf: &[u8], offset: usize) -> u32 {
    wire::read_u32_be(buf, offset)
        ^ wire::read_u32_be(buf, offset + 4)
        ^ wire::read_u32_be(buf, offset + 8)
        ^ wire::read_u32_be(buf, offset + 12)
}

/// Scan an IPv6 header and its extension chain. Extension headers extend
/// the recorded header length and shrink the payload; a fragment header
/// additionally sets the cumulative fragmented flag.
pub(crate) fn scan_ip6(scan: &mut ScanState) {
    if scan.remaining() < IP6_HEADER_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;

    scan.length = IP6_HEADER_LEN;
    let payload_len = wire::read_u16_be(buf, offset + 4) as usize;
    scan.hdr_payload = payload_len;

    // Same Ethernet-trailer trimming as IPv4, driven by the payload-length
    // field. 802.3 frames carry their own length and never need this.
    if scan.hdr_count >= 1 {
        let postfix = scan
            .buf_len
            .saturating_sub(offset + IP6_HEADER_LEN + payload_len);
        let mut trimmed = 0;
        if let Some(eth) = scan.packet_mut().last_header_mut() {
            if eth.id == ProtocolId::ETHERNET && postfix > 0 {
                eth.postfix = postfix;
                eth.payload = eth.payload.saturating_sub(postfix);
                trimmed = postfix;
            }
        }
        scan.buf_len -= trimmed;
    }

    if scan.flow_key_mut().mark(ProtocolId::IP6) {
        let src = fold_addr(buf, offset + 8);
        let dst = fold_addr(buf, offset + 24);
        let next = wire::read_u8(buf, offset + 6);
        let key = scan.flow_key_mut();
        key.set_pair(0, ProtocolId::IP6, src, dst);
        key.set_pair(1, ProtocolId::IP6, u32::from(next), u32::from(next));
        key.truncate_pairs(2);
    }

    let mut next_type = wire::read_u8(buf, offset + 6);
    let mut walked = 0;

    loop {
        match next_type {
            1 => {
                scan.next_id = scan.validate_next(ProtocolId::ICMP);
                return;
            }
            4 => {
                scan.next_id = scan.validate_next(ProtocolId::IP4);
                return;
            }
            6 => {
                scan.next_id = scan.validate_next(ProtocolId::TCP);
                return;
            }
            17 => {
                scan.next_id = scan.validate_next(ProtocolId::UDP);
                return;
            }
            58 => {
                // ICMPv6 has no decoder; its bytes are opaque payload.
                scan.next_id = ProtocolId::PAYLOAD;
                return;
            }
            132 => {
                scan.next_id = scan.validate_next(ProtocolId::SCTP);
                return;
            }
            ip6_ext::FRAGMENT
            | ip6_ext::HOP_BY_HOP
            | ip6_ext::ROUTING
            | ip6_ext::ESP
            | ip6_ext::AUTH
            | ip6_ext::DEST_OPTIONS
            | ip6_ext::MOBILITY => {
                if next_type == ip6_ext::FRAGMENT {
                    scan.flags |= header_flags::FRAGMENTED;
                }

                let ext_offset = offset + scan.length;
                if !scan.is_accessible(scan.length + 2) {
                    return;
                }

                let ext_type = wire::read_u8(buf, ext_offset);
                let ext_len = wire::read_u8(buf, ext_offset + 1) as usize * 8 + 8;

                walked += 1;
                if walked > MAX_EXTENSION_HEADERS
                    || offset + scan.length + ext_len > scan.buf_len
                {
                    tracing::debug!(
                        ext_type,
                        ext_len,
                        offset = scan.offset,
                        "malformed extension chain, degrading to payload"
                    );
                    scan.next_id = ProtocolId::PAYLOAD;
                    return;
                }

                scan.length += ext_len;
                // Extension headers are carved out of the payload length.
                scan.hdr_payload = scan.hdr_payload.saturating_sub(ext_len);
                next_type = ext_type;
            }
            _ => {
                scan.next_id = if scan.hdr_payload == 0 {
                    ProtocolId::END_OF_HEADERS
                } else {
                    ProtocolId::PAYLOAD
                };
                return;
            }
        }
    }
}

//! IPv4 header scanner and options dissection.

use crate::protocol::ProtocolId;
use crate::scanner::{header_flags, ScanState, SubHeader};
use crate::wire;

/// IP protocol numbers the scanner chains on.
pub mod ip_protocol {
    pub const ICMP: u8 = 1;
    pub const IPIP: u8 = 4;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const L2TP: u8 = 115;
    pub const SCTP: u8 = 132;
}

/// IPv4 option numbers recorded as sub-headers.
pub mod ip_option {
    pub const END_OF_LIST: u8 = 0;
    pub const NO_OP: u8 = 1;
    pub const SECURITY: u8 = 2;
    pub const LOOSE_SOURCE_ROUTE: u8 = 3;
    pub const TIMESTAMP: u8 = 4;
    pub const RECORD_ROUTE: u8 = 7;
    pub const STREAM_ID: u8 = 8;
    pub const STRICT_SOURCE_ROUTE: u8 = 9;
}

pub const IP4_MIN_LEN: usize = 20;

const FLAG_MF: u16 = 0x2000;
const FRAG_OFF_MASK: u16 = 0x1FFF;

#[inline]
fn ihl(b0: u8) -> usize {
    (b0 & 0x0F) as usize
}

/// Scan an IPv4 header.
///
/// Fragments are flagged cumulatively and, because the total-length field
/// of a fragment does not describe what this capture holds, the payload is
/// recomputed from the buffer. Non-first fragments never chain: their
/// payload is a slice of some other datagram's bytes.
pub(crate) fn scan_ip4(scan: &mut ScanState) {
    if scan.remaining() < IP4_MIN_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;

    let header_len = ihl(wire::read_u8(buf, offset)) * 4;
    let total_len = wire::read_u16_be(buf, offset + 2) as usize;
    scan.length = header_len;
    scan.hdr_payload = total_len.saturating_sub(header_len);

    // The IP total length exposes an Ethernet trailer: trim the preceding
    // Ethernet entry and the effective buffer so deeper headers don't
    // claim trailer bytes as payload.
    if scan.hdr_count >= 1 && total_len <= scan.buf_len {
        let postfix = scan.buf_len.saturating_sub(offset + total_len);
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

    let frag = wire::read_u16_be(buf, offset + 6);
    if frag & FLAG_MF != 0 || frag & FRAG_OFF_MASK > 0 {
        scan.flags |= header_flags::FRAGMENTED;
        scan.hdr_payload = scan.buf_len.saturating_sub(header_len + offset);
    }

    let protocol = wire::read_u8(buf, offset + 9);

    if scan.flow_key_mut().mark(ProtocolId::IP4) {
        let saddr = wire::read_u32_be(buf, offset + 12);
        let daddr = wire::read_u32_be(buf, offset + 16);
        let key = scan.flow_key_mut();
        key.set_pair(0, ProtocolId::IP4, saddr, daddr);
        key.set_pair(1, ProtocolId::IP4, u32::from(protocol), u32::from(protocol));
        key.truncate_pairs(2);
    }

    if header_len > IP4_MIN_LEN {
        dissect_ip4_options(scan, header_len);
    }

    // Fragments never chain: a non-first fragment carries a slice of some
    // other datagram's bytes, and even a first fragment's transport header
    // belongs to a reassembly context this scanner does not have.
    if frag & (FLAG_MF | FRAG_OFF_MASK) != 0 {
        scan.next_id = ProtocolId::PAYLOAD;
        return;
    }

    scan.next_id = match protocol {
        ip_protocol::ICMP => scan.validate_next(ProtocolId::ICMP),
        ip_protocol::IPIP => scan.validate_next(ProtocolId::IP4),
        ip_protocol::TCP => scan.validate_next(ProtocolId::TCP),
        ip_protocol::UDP => scan.validate_next(ProtocolId::UDP),
        ip_protocol::L2TP => scan.validate_next(ProtocolId::L2TP),
        ip_protocol::SCTP => scan.validate_next(ProtocolId::SCTP),
        _ => scan.next_id,
    };
}

/// Walk the options area of a header whose IHL exceeds five words,
/// attaching one sub-header per option. An end-of-list option converts the
/// rest of the area into an inter-header gap.
fn dissect_ip4_options(scan: &mut ScanState, header_len: usize) {
    let buf = scan.buf();
    let base = scan.offset;
    let end = header_len.min(scan.buf_len.saturating_sub(base));

    let mut at = IP4_MIN_LEN;
    while at < end {
        let option = wire::read_u8(buf, base + at) & 0x1F;
        match option {
            ip_option::END_OF_LIST => {
                let gap = end - at;
                scan.hdr_gap = gap;
                scan.length = scan.length.saturating_sub(gap);
                break;
            }
            ip_option::NO_OP => {
                at += 1;
            }
            _ => {
                let Some(len) = wire::try_read_u8(buf, base + at + 1) else {
                    break;
                };
                let len = len as usize;
                if len < 2 || at + len > end {
                    break;
                }
                // Offsets are kept relative to the IP header start.
                scan.push_subheader(SubHeader {
                    id: option,
                    offset: at,
                    length: len,
                });
                at += len;
            }
        }
    }
}

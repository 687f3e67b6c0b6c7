//! ICMPv4 header scanner.

use crate::protocol::ProtocolId;
use crate::scanner::{header_flags, ScanState};
use crate::wire;

pub const ICMP_HEADER_LEN: usize = 8;

/// ICMP message types the scanner distinguishes.
pub mod icmp_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const DEST_UNREACHABLE: u8 = 3;
    pub const REDIRECT: u8 = 5;
    pub const ECHO_REQUEST: u8 = 8;
    pub const TIME_EXCEEDED: u8 = 11;
    pub const PARAM_PROBLEM: u8 = 12;
}

/// Scan an ICMP header. Error messages carry the offending datagram's IP
/// header after their own, so unreachable/parameter-problem messages chain
/// into an embedded IPv4 header; its length fields describe the original
/// packet, not these bytes, hence the cumulative ignore-bounds flag.
pub(crate) fn scan_icmp(scan: &mut ScanState) {
    if scan.remaining() < 4 {
        return;
    }

    let msg_type = wire::read_u8(scan.buf(), scan.offset);
    scan.length = ICMP_HEADER_LEN;

    match msg_type {
        icmp_type::DEST_UNREACHABLE | icmp_type::PARAM_PROBLEM => {
            scan.next_id = scan.validate_next(ProtocolId::IP4);
            scan.flags |= header_flags::IGNORE_BOUNDS;
        }
        _ => {}
    }
}

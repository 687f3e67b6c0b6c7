//! RTCP scanner and heuristic validator (RFC 3550).
//!
//! RTCP packets are usually compound (SR + SDES + ...), so after one
//! report the scanner chains straight back to the RTCP id block. Packet
//! types 200..=205 map onto contiguous ids starting at the sender report.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const RTCP_HEADER_LEN: usize = 8;

const TYPE_BASE: u8 = 200;
const TYPE_MAX: u8 = 205;

#[inline]
fn version(b0: u8) -> u8 {
    (b0 >> 6) & 0x03
}

#[inline]
fn report_count(b0: u8) -> u8 {
    b0 & 0x1F
}

/// Scan one RTCP report. The length field counts 32-bit words minus one,
/// including the header.
pub(crate) fn scan_rtcp(scan: &mut ScanState) {
    if scan.remaining() < 4 {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;

    scan.length = (wire::read_u16_be(buf, offset + 2) as usize + 1) * 4;

    let packet_type = wire::read_u8(buf, offset + 1);
    if (TYPE_BASE..=TYPE_MAX).contains(&packet_type) {
        scan.id = ProtocolId::RTCP_SENDER_REPORT.offset_by(packet_type - TYPE_BASE);
        // Compound packets: try the next report right away.
        scan.next_id = ProtocolId::RTCP_SENDER_REPORT;
    } else {
        scan.id = ProtocolId::PAYLOAD;
    }
}

/// Passive RTCP plausibility check at the current scan offset: version 2,
/// sane report count, type in the report range, odd destination port.
pub(crate) fn validate_rtcp(scan: &ScanState) -> Option<ProtocolId> {
    let buf = scan.buf();
    let offset = scan.offset;

    if scan.buf_len.saturating_sub(offset) < 12 {
        return None;
    }

    let b0 = wire::read_u8(buf, offset);
    let packet_type = wire::read_u8(buf, offset + 1);

    if version(b0) != 2
        || report_count(b0) > 15
        || !(TYPE_BASE..=TYPE_MAX).contains(&packet_type)
    {
        return None;
    }

    if scan.dport & 0x01 != 1 {
        return None;
    }

    Some(ProtocolId::RTCP_SENDER_REPORT.offset_by(packet_type - TYPE_BASE))
}

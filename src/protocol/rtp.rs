//! RTP header scanner and heuristic validator (RFC 3550).

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const RTP_HEADER_LEN: usize = 12;
const RTP_EXT_HEADER_LEN: usize = 4;

#[inline]
fn version(b0: u8) -> u8 {
    (b0 >> 6) & 0x03
}

#[inline]
fn has_padding(b0: u8) -> bool {
    (b0 >> 5) & 0x01 != 0
}

#[inline]
fn has_extension(b0: u8) -> bool {
    (b0 >> 4) & 0x01 != 0
}

#[inline]
fn csrc_count(b0: u8) -> usize {
    (b0 & 0x0F) as usize
}

#[inline]
fn payload_type(b1: u8) -> u8 {
    b1 & 0x7F
}

/// Scan an RTP header: fixed part, CSRC list, optional extension. When the
/// padding bit is set the final byte of the payload says how many trailing
/// pad bytes there are; they become the header's postfix.
pub(crate) fn scan_rtp(scan: &mut ScanState) {
    if scan.remaining() < RTP_HEADER_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    let b0 = wire::read_u8(buf, offset);

    scan.length = RTP_HEADER_LEN + csrc_count(b0) * 4;

    if has_extension(b0) {
        if !scan.is_accessible(scan.length + RTP_EXT_HEADER_LEN) {
            scan.length = 0;
            return;
        }
        let ext_words = wire::read_u16_be(buf, offset + scan.length + 2) as usize;
        scan.length += ext_words * 4 + RTP_EXT_HEADER_LEN;
    }

    if has_padding(b0) && scan.wire_len > 0 && scan.wire_len <= scan.buf_len {
        scan.hdr_postfix = wire::read_u8(buf, scan.wire_len - 1) as usize;
    }
}

/// Passive RTP plausibility check at the current scan offset.
///
/// Rejects short buffers, wrong versions, zero timestamps, payload types
/// outside the static and dynamic ranges, duplicate CSRC entries, bogus
/// extension lengths and odd destination ports (RTP rides even ports, its
/// RTCP sibling odd ones).
pub(crate) fn validate_rtp(scan: &ScanState) -> Option<ProtocolId> {
    let buf = scan.buf();
    let offset = scan.offset;

    if scan.buf_len.saturating_sub(offset) < RTP_HEADER_LEN {
        return None;
    }

    let b0 = wire::read_u8(buf, offset);
    let b1 = wire::read_u8(buf, offset + 1);
    let ts = wire::read_u32_be(buf, offset + 4);
    let ptype = payload_type(b1);

    if version(b0) != 2 || ts == 0 || (ptype > 34 && ptype < 96) {
        return None;
    }

    let cc = csrc_count(b0);
    if scan.buf_len.saturating_sub(offset) < RTP_HEADER_LEN + cc * 4 {
        return None;
    }
    for i in 0..cc {
        let a = wire::read_u32_be(buf, offset + RTP_HEADER_LEN + i * 4);
        for j in (i + 1)..cc {
            if a == wire::read_u32_be(buf, offset + RTP_HEADER_LEN + j * 4) {
                return None;
            }
        }
    }

    let payload_len = scan.wire_len.saturating_sub(offset);
    let mut actual = RTP_HEADER_LEN + cc * 4;

    if has_extension(b0) {
        let ext_len_off = offset + RTP_HEADER_LEN + cc * 4 + 2;
        let ext_words = wire::try_read_u16_be(buf, ext_len_off)? as usize;
        let ext_len = ext_words * 4;
        if (!scan.is_fragment() && offset + ext_len > scan.wire_len) || ext_len > 1500 {
            return None;
        }
        actual += ext_len;
    }

    if scan.dport & 0x01 != 0 {
        return None;
    }

    if payload_len < actual && scan.wire_len == scan.buf_len {
        return None;
    }

    Some(ProtocolId::RTP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    fn rtp_packet(cc: usize, ext: bool, pad: bool) -> Vec<u8> {
        let mut b0 = 0x80u8; // version 2
        b0 |= cc as u8;
        if ext {
            b0 |= 0x10;
        }
        if pad {
            b0 |= 0x20;
        }
        let mut p = vec![b0, 0x00]; // payload type 0 (PCMU)
        p.extend_from_slice(&[0x12, 0x34]); // seq
        p.extend_from_slice(&[0x00, 0x00, 0x10, 0x00]); // timestamp
        p.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]); // ssrc
        for i in 0..cc {
            p.extend_from_slice(&(0x1000u32 + i as u32).to_be_bytes());
        }
        if ext {
            p.extend_from_slice(&[0x00, 0x01, 0x00, 0x02]); // profile, 2 words
            p.extend_from_slice(&[0u8; 8]);
        }
        p.extend_from_slice(&[0u8; 16]); // payload
        p
    }

    fn scanned_len(pkt: &[u8], dport: u16) -> (usize, usize) {
        let mut h = Harness::new();
        let mut scan = h.state(pkt, ProtocolId::RTP);
        scan.dport = dport;
        scan_rtp(&mut scan);
        (scan.length, scan.hdr_postfix)
    }

    #[test]
    fn length_includes_csrc_and_extension() {
        assert_eq!(scanned_len(&rtp_packet(0, false, false), 5004).0, 12);
        assert_eq!(scanned_len(&rtp_packet(3, false, false), 5004).0, 24);
        assert_eq!(scanned_len(&rtp_packet(1, true, false), 5004).0, 12 + 4 + 4 + 8);
    }

    #[test]
    fn padding_becomes_postfix() {
        let mut pkt = rtp_packet(0, false, true);
        *pkt.last_mut().unwrap() = 4; // four pad bytes
        assert_eq!(scanned_len(&pkt, 5004).1, 4);
    }

    #[test]
    fn validator_accepts_plausible_header() {
        let pkt = rtp_packet(2, false, false);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);
        scan.dport = 5004;

        assert_eq!(validate_rtp(&scan), Some(ProtocolId::RTP));
    }

    #[test]
    fn validator_rejects_wrong_version() {
        let mut pkt = rtp_packet(0, false, false);
        pkt[0] = 0x40; // version 1
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);
        scan.dport = 5004;

        assert_eq!(validate_rtp(&scan), None);
    }

    #[test]
    fn validator_rejects_odd_port() {
        let pkt = rtp_packet(0, false, false);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);
        scan.dport = 5005;

        assert_eq!(validate_rtp(&scan), None);
    }

    #[test]
    fn validator_rejects_duplicate_csrc() {
        let mut pkt = rtp_packet(2, false, false);
        // Make CSRC[1] == CSRC[0]
        let (a, b) = (12, 16);
        let first: [u8; 4] = pkt[a..a + 4].try_into().unwrap();
        pkt[b..b + 4].copy_from_slice(&first);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);
        scan.dport = 5004;

        assert_eq!(validate_rtp(&scan), None);
    }

    #[test]
    fn validator_rejects_undersized_buffer() {
        let pkt = rtp_packet(0, false, false);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt[..8], ProtocolId::UDP);
        scan.dport = 5004;

        assert_eq!(validate_rtp(&scan), None);
    }
}

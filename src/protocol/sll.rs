//! Pseudo link-layer headers: Linux cooked capture (SLL), the BSD
//! null/loopback header, and the catch-all payload scanner.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const SLL_HEADER_LEN: usize = 16;
const NULL_HEADER_LEN: usize = 4;

/// Scan a Linux cooked-capture header.
pub(crate) fn scan_sll(scan: &mut ScanState) {
    if scan.remaining() < SLL_HEADER_LEN {
        return;
    }

    scan.length = SLL_HEADER_LEN;

    if wire::read_u16_be(scan.buf(), scan.offset + 14) == 0x0800 {
        scan.next_id = scan.validate_next(ProtocolId::IP4);
    }
}

/// Scan a null/loopback header: a single protocol-family word whose byte
/// order depends on the capturing host, so both orders are tried.
pub(crate) fn scan_null_header(scan: &mut ScanState) {
    if scan.remaining() < NULL_HEADER_LEN {
        return;
    }

    scan.id = ProtocolId::NULL_HEADER;
    scan.length = NULL_HEADER_LEN;

    // PF_INET == 2 on every platform that writes this header.
    let family_le = wire::read_u32_le(scan.buf(), scan.offset);
    let family_be = wire::read_u32_be(scan.buf(), scan.offset);
    if family_le == 2 || family_be == 2 {
        scan.next_id = ProtocolId::IP4;
    } else {
        scan.next_id = ProtocolId::PAYLOAD;
    }
}

/// Whatever is left when no more headers can be identified.
///
/// With a resume point pending (a suspended chunk sequence), the payload
/// only runs up to it; arriving there with nothing to consume is what
/// triggers the scan loop's stack pop.
pub(crate) fn scan_payload(scan: &mut ScanState) {
    scan.id = ProtocolId::PAYLOAD;

    match scan.resume_top() {
        Some((resume_offset, _)) => {
            scan.length = resume_offset
                .min(scan.buf_len)
                .saturating_sub(scan.offset);
            scan.next_id = ProtocolId::PAYLOAD;
        }
        None => {
            scan.length = scan.buf_len.saturating_sub(scan.offset);
            scan.next_id = ProtocolId::END_OF_HEADERS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    #[test]
    fn sll_chains_to_ipv4() {
        let mut pkt = vec![0u8; 14];
        pkt.extend_from_slice(&[0x08, 0x00]);
        pkt.extend_from_slice(&[0x45, 0x00]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::SLL);

        scan_sll(&mut scan);

        assert_eq!(scan.length, 16);
        assert_eq!(scan.next_id, ProtocolId::IP4);
    }

    #[test]
    fn null_header_accepts_both_byte_orders() {
        for family in [[2, 0, 0, 0], [0, 0, 0, 2]] {
            let mut h = Harness::new();
            let mut scan = h.state(&family, ProtocolId::NULL_HEADER);
            scan_null_header(&mut scan);
            assert_eq!(scan.next_id, ProtocolId::IP4);
        }

        let pkt = [24, 0, 0, 0]; // PF_INET6 on some BSDs; not decoded
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::NULL_HEADER);
        scan_null_header(&mut scan);
        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }

    #[test]
    fn payload_takes_the_rest_and_ends() {
        let pkt = [0u8; 32];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::PAYLOAD);
        scan.offset = 20;

        scan_payload(&mut scan);

        assert_eq!(scan.length, 12);
        assert_eq!(scan.next_id, ProtocolId::END_OF_HEADERS);
    }
}

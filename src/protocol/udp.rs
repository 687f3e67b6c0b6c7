//! UDP header scanner.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const UDP_HEADER_LEN: usize = 8;

/// Well-known ports with a direct next-header binding.
pub mod port {
    pub const L2TP: u16 = 1701;
    pub const RTP: u16 = 5004;
    pub const RTCP: u16 = 5005;
    pub const SIP: u16 = 5060;
}

fn lookup_port(scan: &mut ScanState, port: u16) -> Option<ProtocolId> {
    match port {
        port::L2TP => Some(scan.validate_next(ProtocolId::L2TP)),
        port::RTP => Some(scan.validate_next(ProtocolId::RTP)),
        port::RTCP => Some(scan.validate_next(ProtocolId::RTCP_SENDER_REPORT)),
        port::SIP => Some(scan.validate_next(ProtocolId::SIP)),
        _ => None,
    }
}

/// Scan a UDP header. Port policy matches TCP: destination first, then
/// source, and unmatched sub-1024 ports end the scan.
pub(crate) fn scan_udp(scan: &mut ScanState) {
    let remain = scan.remaining();
    if remain < UDP_HEADER_LEN {
        if remain > 0 && scan.is_wire_truncated() {
            scan.length = UDP_HEADER_LEN;
        }
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    scan.length = UDP_HEADER_LEN;

    let sport = wire::read_u16_be(buf, offset);
    let dport = wire::read_u16_be(buf, offset + 2);

    if scan.flow_key_mut().mark(ProtocolId::UDP) {
        let key = scan.flow_key_mut();
        key.push_pair(ProtocolId::UDP, u32::from(sport), u32::from(dport));
        key.set_reversible();
    }

    scan.sport = sport;
    scan.dport = dport;

    if let Some(next) = lookup_port(scan, dport) {
        scan.next_id = next;
        return;
    }
    if let Some(next) = lookup_port(scan, sport) {
        scan.next_id = next;
        return;
    }

    if dport < 1024 || sport < 1024 {
        scan.next_id = ProtocolId::END_OF_HEADERS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    fn header(sport: u16, dport: u16, len: u16) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&sport.to_be_bytes());
        h.extend_from_slice(&dport.to_be_bytes());
        h.extend_from_slice(&len.to_be_bytes());
        h.extend_from_slice(&[0x00, 0x00]); // checksum
        h
    }

    #[test]
    fn fixed_length_and_ports() {
        let mut pkt = header(40000, 9999, 16);
        pkt.extend_from_slice(&[0u8; 8]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);

        scan_udp(&mut scan);

        assert_eq!(scan.length, 8);
        assert_eq!((scan.sport, scan.dport), (40000, 9999));
        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
        assert!(scan.packet().flow_key().is_reversible());
    }

    #[test]
    fn sip_port_binds_on_request_line() {
        let mut pkt = header(40000, 5060, 0);
        pkt.extend_from_slice(b"INVITE sip:alice@example.com SIP/2.0\r\n\r\n");
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);

        scan_udp(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::SIP);
    }

    #[test]
    fn sip_port_with_binary_payload_degrades() {
        let mut pkt = header(40000, 5060, 0);
        pkt.extend_from_slice(&[0x00, 0x01, 0x02, 0x03]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);

        scan_udp(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }

    #[test]
    fn l2tp_port_binds() {
        let mut pkt = header(40000, 1701, 0);
        // L2TP data message, version 2
        pkt.extend_from_slice(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);

        scan_udp(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::L2TP);
    }

    #[test]
    fn unmatched_well_known_port_ends_scan() {
        let mut pkt = header(53, 40000, 0);
        pkt.extend_from_slice(&[0u8; 12]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::UDP);

        scan_udp(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::END_OF_HEADERS);
    }
}

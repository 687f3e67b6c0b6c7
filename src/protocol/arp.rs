//! ARP header scanner.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

const ARP_FIXED_LEN: usize = 8;

/// Scan an ARP header. Total length follows from the address sizes the
/// header itself declares: two hardware/protocol address pairs after the
/// fixed part.
pub(crate) fn scan_arp(scan: &mut ScanState) {
    if scan.remaining() < ARP_FIXED_LEN {
        return;
    }

    let buf = scan.buf();
    let hlen = wire::read_u8(buf, scan.offset + 4) as usize;
    let plen = wire::read_u8(buf, scan.offset + 5) as usize;

    scan.length = (hlen + plen) * 2 + ARP_FIXED_LEN;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;
    use crate::protocol::ProtocolId as Id;

    #[test]
    fn ethernet_ipv4_request_is_28_bytes() {
        let mut pkt = vec![
            0x00, 0x01, // hardware type: ethernet
            0x08, 0x00, // protocol type: IPv4
            0x06, 0x04, // hlen, plen
            0x00, 0x01, // opcode: request
        ];
        pkt.extend_from_slice(&[0u8; 20]);
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, Id::ARP);

        scan_arp(&mut scan);

        assert_eq!(scan.length, 28);
        assert_eq!(scan.next_id, Id::PAYLOAD);
    }

    #[test]
    fn short_buffer_is_unparsed() {
        let pkt = [0x00, 0x01, 0x08, 0x00, 0x06];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, Id::ARP);

        scan_arp(&mut scan);

        assert_eq!(scan.length, 0);
    }
}

//! PPP and L2TP header scanners.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const PPP_HEADER_LEN: usize = 4;
const L2TP_BASE_LEN: usize = 6;

/// Scan a PPP header (HDLC-framed: address, control, protocol).
pub(crate) fn scan_ppp(scan: &mut ScanState) {
    if scan.remaining() < PPP_HEADER_LEN {
        return;
    }

    scan.length = PPP_HEADER_LEN;

    match wire::read_u16_be(scan.buf(), scan.offset + 2) {
        0x0021 => scan.next_id = scan.validate_next(ProtocolId::IP4),
        0x0057 => scan.next_id = scan.validate_next(ProtocolId::IP6),
        _ => {}
    }
}

/// Scan an L2TP header. The flag bits in the first byte announce which
/// optional fields (length, sequence numbers, offset) are present and so
/// determine the header size; data messages (T clear) chain to PPP.
pub(crate) fn scan_l2tp(scan: &mut ScanState) {
    if scan.remaining() < 2 {
        return;
    }

    let b0 = wire::read_u8(scan.buf(), scan.offset);
    let is_control = (b0 >> 7) & 0x01 != 0;
    let has_length = (b0 >> 6) & 0x01 != 0;
    let has_sequence = (b0 >> 3) & 0x01 != 0;
    let has_offset = (b0 >> 1) & 0x01 != 0;

    scan.length = L2TP_BASE_LEN;
    if has_length {
        scan.length += 2;
    }
    if has_sequence {
        scan.length += 4;
    }
    if has_offset {
        scan.length += 4;
    }

    if !is_control {
        scan.next_id = scan.validate_next(ProtocolId::PPP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    #[test]
    fn ppp_chains_on_protocol_field() {
        let pkt = [0xff, 0x03, 0x00, 0x21, 0x45, 0x00];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::PPP);

        scan_ppp(&mut scan);

        assert_eq!(scan.length, 4);
        assert_eq!(scan.next_id, ProtocolId::IP4);
    }

    #[test]
    fn ppp_unknown_protocol_stays_payload() {
        let pkt = [0xff, 0x03, 0xc0, 0x21, 0x01, 0x01];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::PPP);

        scan_ppp(&mut scan);

        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }

    #[test]
    fn l2tp_data_message_chains_to_ppp() {
        // T=0, no optional fields, version 2
        let pkt = [0x00, 0x02, 0x00, 0x01, 0x00, 0x01, 0xff, 0x03, 0x00, 0x21];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::L2TP);

        scan_l2tp(&mut scan);

        assert_eq!(scan.length, 6);
        assert_eq!(scan.next_id, ProtocolId::PPP);
    }

    #[test]
    fn l2tp_optional_fields_grow_header() {
        // T=1 (control), L=1, S=1: 6 + 2 + 4
        let pkt = [0xc8, 0x02, 0x00, 0x0c, 0, 1, 0, 1, 0, 0, 0, 0];
        let mut h = Harness::new();
        let mut scan = h.state(&pkt, ProtocolId::L2TP);

        scan_l2tp(&mut scan);

        assert_eq!(scan.length, 12);
        // Control messages carry no PPP frame.
        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }
}

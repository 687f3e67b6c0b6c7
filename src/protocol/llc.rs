//! IEEE 802.2 LLC and SNAP header scanners.

use crate::protocol::{lookup_ethertype, ProtocolId};
use crate::scanner::ScanState;
use crate::wire;

const LLC_MIN_LEN: usize = 4;
const SNAP_LEN: usize = 5;

/// DSAP value announcing a SNAP extension header.
const DSAP_SNAP: u8 = 0xAA;

/// OUI values whose SNAP PID field carries an EtherType.
const OUI_ENCAPSULATED_ETHERNET: u32 = 0x000000;
const OUI_CISCO_90: u32 = 0x0000F8;

/// Scan an LLC (802.2) header. U-format control fields are one byte, so
/// the header is 3 bytes; I/S formats carry a 16-bit control field.
pub(crate) fn scan_llc(scan: &mut ScanState) {
    if scan.remaining() < LLC_MIN_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;

    let control = wire::read_u8(buf, offset + 2);
    scan.length = if control & 0x03 == 0x03 { 3 } else { 4 };

    let dsap = wire::read_u8(buf, offset);
    if dsap == DSAP_SNAP {
        scan.next_id = scan.validate_next(ProtocolId::IEEE_SNAP);
    }
}

/// Scan a SNAP header: 3-byte OUI plus 2-byte protocol id.
pub(crate) fn scan_snap(scan: &mut ScanState) {
    if scan.remaining() < SNAP_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    scan.length = SNAP_LEN;

    let pid = wire::read_u16_be(buf, offset + 3);

    if scan.flow_key_mut().mark(ProtocolId::IEEE_SNAP) {
        // The PID takes the next-protocol slot alongside whatever address
        // pair the frame header staged at slot 0.
        scan
            .flow_key_mut()
            .set_pair(1, ProtocolId::IEEE_SNAP, u32::from(pid), u32::from(pid));
    }

    let oui = (u32::from(wire::read_u8(buf, offset)) << 16)
        | (u32::from(wire::read_u8(buf, offset + 1)) << 8)
        | u32::from(wire::read_u8(buf, offset + 2));

    if oui == OUI_ENCAPSULATED_ETHERNET || oui == OUI_CISCO_90 {
        scan.next_id = scan.validate_next(lookup_ethertype(pid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::Harness;

    #[test]
    fn llc_u_format_is_three_bytes() {
        let buf = [0xaa, 0xaa, 0x03, 0x00];
        let mut h = Harness::new();
        let mut scan = h.state(&buf, ProtocolId::IEEE_802DOT2);

        scan_llc(&mut scan);

        assert_eq!(scan.length, 3);
        assert_eq!(scan.next_id, ProtocolId::IEEE_SNAP);
    }

    #[test]
    fn llc_i_format_is_four_bytes() {
        let buf = [0x42, 0x42, 0x00, 0x00];
        let mut h = Harness::new();
        let mut scan = h.state(&buf, ProtocolId::IEEE_802DOT2);

        scan_llc(&mut scan);

        assert_eq!(scan.length, 4);
        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }

    #[test]
    fn snap_resolves_encapsulated_ethertype() {
        // OUI 00-00-00, PID 0x0800 (IPv4)
        let buf = [0x00, 0x00, 0x00, 0x08, 0x00, 0x45];
        let mut h = Harness::new();
        let mut scan = h.state(&buf, ProtocolId::IEEE_SNAP);

        scan_snap(&mut scan);

        assert_eq!(scan.length, 5);
        assert_eq!(scan.next_id, ProtocolId::IP4);
        assert_eq!(scan.packet().flow_key().pair(1, false), (0x0800, 0x0800));
    }

    #[test]
    fn snap_unknown_oui_stays_payload() {
        let buf = [0x00, 0x60, 0x1d, 0x08, 0x00];
        let mut h = Harness::new();
        let mut scan = h.state(&buf, ProtocolId::IEEE_SNAP);

        scan_snap(&mut scan);

        assert_eq!(scan.length, 5);
        assert_eq!(scan.next_id, ProtocolId::PAYLOAD);
    }
}

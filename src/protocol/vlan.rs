//! IEEE 802.1q VLAN tag scanner.

use crate::protocol::{lookup_ethertype, ProtocolId};
use crate::scanner::ScanState;
use crate::wire;

const VLAN_LEN: usize = 4;

/// EtherType/length boundary, same rule as the Ethernet header.
const TYPE_BOUNDARY: u16 = 0x600;

/// 12-bit VLAN id from the TCI field.
#[inline]
pub fn vlan_id(tci: u16) -> u16 {
    tci & 0x0FFF
}

/// 3-bit priority code point from the TCI field.
#[inline]
pub fn vlan_priority(tci: u16) -> u8 {
    ((tci & 0xE000) >> 13) as u8
}

/// Scan an 802.1q tag. The encapsulated type field follows the Ethernet
/// convention: a value below 0x600 is an 802.3 frame length, in which case
/// the tag is followed by LLC and the length bounds the payload.
pub(crate) fn scan_vlan(scan: &mut ScanState) {
    if scan.remaining() < VLAN_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;
    scan.length = VLAN_LEN;

    let encap_type = wire::read_u16_be(buf, offset + 2);

    if encap_type < TYPE_BOUNDARY {
        scan.next_id = scan.validate_next(ProtocolId::IEEE_802DOT2);
        scan.hdr_payload = (encap_type as usize).saturating_sub(scan.length + offset);
    } else {
        scan.next_id = scan.validate_next(lookup_ethertype(encap_type));
    }
}

//! SCTP header and chunk scanners.
//!
//! Everything after the common SCTP header is a sequence of chunks, each a
//! header in its own right: `[SCTP][CHUNK][CHUNK]...`. Chunk types map
//! directly onto a contiguous id block, so one scanner serves them all. A
//! DATA chunk pauses the chunk walk: its continuation point goes on the
//! resume stack while the chunk body is scanned as payload, giving port
//! bindings a chance to identify the carried protocol.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

pub const SCTP_HEADER_LEN: usize = 12;
pub const SCTP_CHUNK_HEADER_LEN: usize = 4;
const SCTP_DATA_CHUNK_LEN: usize = 16;

/// Highest chunk type with an id slot (SHUTDOWN COMPLETE).
const MAX_CHUNK_TYPE: u8 = 14;

/// DATA chunk flag bits.
pub mod data_flags {
    pub const LAST_SEGMENT: u8 = 0x01;
    pub const FIRST_SEGMENT: u8 = 0x02;
    pub const ORDERED: u8 = 0x04;
    pub const DELAYED: u8 = 0x08;
}

/// Scan the common SCTP header.
pub(crate) fn scan_sctp(scan: &mut ScanState) {
    if scan.remaining() < SCTP_HEADER_LEN {
        return;
    }

    scan.length = SCTP_HEADER_LEN;
    // Chunk decoders reach back here for the port fields.
    scan.sctp_offset = scan.offset;
    scan.next_id = ProtocolId::SCTP_DATA;
}

/// Scan one SCTP chunk and rewrite the current id to the chunk's own
/// protocol id.
pub(crate) fn scan_sctp_chunk(scan: &mut ScanState) {
    if scan.remaining() < SCTP_CHUNK_HEADER_LEN {
        return;
    }

    let buf = scan.buf();
    let offset = scan.offset;

    let chunk_type = wire::read_u8(buf, offset);
    let chunk_flags = wire::read_u8(buf, offset + 1);
    let len = wire::read_u16_be(buf, offset + 2) as usize;
    // Chunks are padded to a 4-byte boundary; the length field is not.
    let padded = len + ((4 - (len % 4)) & 0x03);

    if chunk_type > MAX_CHUNK_TYPE {
        return;
    }
    scan.id = ProtocolId::SCTP_DATA.offset_by(chunk_type);

    if chunk_type != 0 {
        scan.length = padded;
        scan.next_id = ProtocolId::SCTP_DATA;
        return;
    }

    // DATA chunk: record only its fixed header and scan the carried bytes
    // as payload, resuming the chunk walk afterwards.
    scan.length = SCTP_DATA_CHUNK_LEN;
    scan.push_resume(offset + padded, ProtocolId::SCTP_DATA);
    scan.next_id = ProtocolId::PAYLOAD;

    if chunk_flags & data_flags::FIRST_SEGMENT != 0 {
        let Some(sport) = wire::try_read_u16_be(buf, scan.sctp_offset) else {
            return;
        };
        let Some(dport) = wire::try_read_u16_be(buf, scan.sctp_offset + 2) else {
            return;
        };
        scan.sport = sport;
        scan.dport = dport;

        scan.next_id = match dport {
            80 | 8080 | 8081 => scan.validate_next(ProtocolId::HTTP),
            5060 => scan.validate_next(ProtocolId::SIP),
            _ => scan.next_id,
        };

        if scan.next_id == ProtocolId::PAYLOAD {
            scan.next_id = match sport {
                80 | 8080 | 8081 => scan.validate_next(ProtocolId::HTTP),
                5060 => scan.validate_next(ProtocolId::SIP),
                _ => scan.next_id,
            };
        }
    }
}

//! The header-walk state machine.
//!
//! A loop rather than recursive descent: chunked protocols (SCTP) pause
//! their parent's remaining bytes and resume them later through an
//! explicit, bounded stack, which recursion would make awkward to bound.
//!
//! Each iteration dispatches the current id's scan function, resolves the
//! next id through binding flags and heuristic chains, records the header,
//! and advances. A zero header length is the universal "could not parse"
//! signal and degrades to payload instead of aborting the packet.

use tracing::trace;

use crate::error::{Result, ScanError};
use crate::protocol::{binding_flags, ProtocolId, Registry};
use crate::scanner::state::{header_flags, BindingFlagsTable, HeaderEntry, PacketRecord, ScanState};

/// Scan one packet buffer into `packet`. Returns the final scan offset.
pub(crate) fn run(
    registry: &Registry,
    flags: &BindingFlagsTable,
    packet: &mut PacketRecord,
    buf: &[u8],
    wire_len: usize,
    first_id: ProtocolId,
) -> Result<usize> {
    let mut scan = ScanState::new(registry, packet, buf, wire_len, first_id);

    while scan.id != ProtocolId::END_OF_HEADERS {
        scan.is_recorded = false;

        trace!(
            id = %scan.id,
            offset = scan.offset,
            buf_len = scan.buf_len,
            "scanning header"
        );

        // Dispatch through the registry. An unregistered id is a no-op;
        // the zero length below turns it into payload.
        if let Some(scan_fn) = registry.scan_fn(scan.id) {
            scan_fn(&mut scan);
        }

        if scan.length == 0 {
            if scan.id == ProtocolId::PAYLOAD {
                match scan.pop_resume() {
                    // Nothing suspended: the walk is over.
                    None => scan.next_id = ProtocolId::END_OF_HEADERS,
                    // A chunked protocol is waiting; pick up where it left off.
                    Some((offset, next_id)) => {
                        scan.next_id = next_id;
                        scan.offset = offset;
                    }
                }
            } else {
                scan.next_id = ProtocolId::PAYLOAD;
            }
        } else {
            let binding = if scan.id.is_valid() {
                flags[scan.id.index()]
            } else {
                0
            };

            if binding & binding_flags::OVERRIDE != 0 {
                // The caller disabled auto-chaining past this protocol.
                // Override outranks heuristics, so none run.
                scan.next_id = ProtocolId::PAYLOAD;
            } else if binding & binding_flags::HEURISTIC != 0 {
                run_heuristics(registry, &mut scan, binding);
            }

            record_header(&mut scan)?;
        }

        scan.id = scan.next_id;
        scan.offset += scan.length + scan.hdr_gap;
        scan.length = 0;
        scan.next_id = ProtocolId::PAYLOAD;
        scan.clear_header_scratch();

        if scan.offset >= scan.buf_len {
            scan.id = ProtocolId::END_OF_HEADERS;
        }
    }

    let final_offset = scan.offset;
    scan.packet_mut().flow_key_mut().finalize();
    drop(scan);

    trace!(
        headers = packet.header_count(),
        final_offset,
        header_map = packet.header_map(),
        "scan complete"
    );

    Ok(final_offset)
}

/// Evaluate the heuristic chain for the current header. Validators peek at
/// the next header's bytes, so the offset is advanced past header+gap for
/// the duration and restored afterwards.
///
/// Pre mode runs the chain before trusting the direct lookup: only when
/// every validator demurs does the directly discovered binding stand. Post
/// mode consults the chain only when the direct lookup found nothing.
fn run_heuristics(registry: &Registry, scan: &mut ScanState, binding: u32) {
    let saved_offset = scan.offset;
    let saved_length = scan.length;
    scan.offset += scan.length + scan.hdr_gap;

    if binding & binding_flags::HEURISTIC_PRE != 0 {
        let direct = scan.next_id;
        scan.next_id = ProtocolId::PAYLOAD;

        for validate in registry.heuristics(scan.id) {
            if let Some(id) = validate(scan) {
                scan.next_id = id;
                break;
            }
        }

        if scan.next_id == ProtocolId::PAYLOAD {
            scan.next_id = direct;
        }
    } else if scan.next_id == ProtocolId::PAYLOAD {
        for validate in registry.heuristics(scan.id) {
            if let Some(id) = validate(scan) {
                scan.next_id = id;
                break;
            }
        }
    }

    scan.offset = saved_offset;
    scan.length = saved_length;
}

/// Record the current header into the packet's entry sequence.
///
/// Idempotent within one iteration: a second call before the offset
/// advances is a no-op. Trailing postfix bytes shrink the effective wire
/// and buffer lengths so the next header cannot claim them, and a decoder
/// that set no payload gets the remainder of the buffer by default.
pub(crate) fn record_header(scan: &mut ScanState) -> Result<()> {
    if scan.is_recorded {
        return Ok(());
    }

    scan.wire_len = scan.wire_len.saturating_sub(scan.hdr_postfix);
    if scan.buf_len > scan.wire_len {
        scan.buf_len = scan.wire_len;
    }

    if scan.hdr_payload == 0 && scan.id != ProtocolId::PAYLOAD {
        scan.hdr_payload = scan
            .buf_len
            .saturating_sub(scan.offset + scan.hdr_prefix + scan.length + scan.hdr_gap);
    }

    adjust_for_truncation(scan);

    let max = scan.packet().max_headers();
    if scan.packet().header_count() >= max {
        return Err(ScanError::TooManyHeaders { max });
    }

    let mut entry = HeaderEntry {
        id: scan.id,
        offset: scan.offset + scan.hdr_prefix,
        length: scan.length,
        prefix: scan.hdr_prefix,
        gap: scan.hdr_gap,
        payload: scan.hdr_payload,
        postfix: scan.hdr_postfix,
        // Own flags plus whatever the packet accumulated (fragmentation
        // and the like) that encapsulated headers inherit.
        flags: scan.hdr_flags | (scan.flags & header_flags::CUMULATIVE_MASK),
        subheaders: std::mem::take(&mut scan.pending_subheaders),
    };
    if !entry.subheaders.is_empty() {
        entry.flags |= header_flags::SUBHEADERS_DISSECTED;
    }

    trace!(
        id = %entry.id,
        offset = entry.offset,
        length = entry.length,
        payload = entry.payload,
        flags = entry.flags,
        "recording header"
    );

    let id = scan.id;
    let packet = scan.packet_mut();
    packet.mark_header(id);
    packet.push_header(entry);

    scan.is_recorded = true;
    scan.hdr_count += 1;

    Ok(())
}

/// Clamp the current header's regions to the buffer, cutting from the end
/// backwards: postfix first, then payload, gap, and the header proper.
/// Trailer bytes are the most expendable and the header the least; the
/// prefix is never cut. Each clamped region gets its truncation flag.
fn adjust_for_truncation(scan: &mut ScanState) {
    let buf_len = scan.buf_len;
    let start = scan.offset + scan.hdr_prefix + scan.length + scan.hdr_gap + scan.hdr_payload;

    if start + scan.hdr_postfix <= buf_len {
        return;
    }

    if scan.hdr_postfix > 0 {
        scan.hdr_flags |= header_flags::POSTFIX_TRUNCATED;
        scan.hdr_postfix = scan.mem_len.saturating_sub(start);
        trace!(postfix = scan.hdr_postfix, "clamped postfix");
    }

    let start = start - scan.hdr_payload;
    if start + scan.hdr_payload <= buf_len {
        return;
    }

    scan.hdr_flags |= header_flags::PAYLOAD_TRUNCATED;
    scan.hdr_payload = buf_len.saturating_sub(start);
    trace!(payload = scan.hdr_payload, "clamped payload");

    let start = start - scan.hdr_gap;
    if scan.hdr_gap > 0 && start + scan.hdr_gap > buf_len {
        scan.hdr_flags |= header_flags::GAP_TRUNCATED;
        scan.hdr_gap = buf_len.saturating_sub(start);
        trace!(gap = scan.hdr_gap, "clamped gap");
    }

    let start = start - scan.length;
    if start + scan.length > buf_len {
        scan.hdr_flags |= header_flags::HEADER_TRUNCATED;
        scan.length = buf_len.saturating_sub(start);
        trace!(length = scan.length, "clamped header");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::state::MAX_ENTRY_COUNT;

    fn fresh<'a>(
        registry: &'a Registry,
        packet: &'a mut PacketRecord,
        buf: &'a [u8],
        max_headers: usize,
    ) -> ScanState<'a> {
        packet.reset(0, buf.len() as u32, buf.len() as u32, max_headers);
        ScanState::new(registry, packet, buf, buf.len(), ProtocolId::ETHERNET)
    }

    #[test]
    fn record_is_idempotent_per_iteration() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 64];
        let mut scan = fresh(&registry, &mut packet, &buf, MAX_ENTRY_COUNT);

        scan.id = ProtocolId::ETHERNET;
        scan.length = 14;

        record_header(&mut scan).unwrap();
        record_header(&mut scan).unwrap();

        assert_eq!(scan.packet().header_count(), 1);
    }

    #[test]
    fn default_payload_is_buffer_remainder() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 64];
        let mut scan = fresh(&registry, &mut packet, &buf, MAX_ENTRY_COUNT);

        scan.id = ProtocolId::ETHERNET;
        scan.length = 14;
        record_header(&mut scan).unwrap();

        assert_eq!(scan.packet().headers()[0].payload, 50);
    }

    #[test]
    fn truncation_clamps_back_to_front() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 30];
        let mut scan = fresh(&registry, &mut packet, &buf, MAX_ENTRY_COUNT);

        // Claims 20 header + 20 payload + 4 postfix against 30 bytes.
        scan.id = ProtocolId::IP4;
        scan.length = 20;
        scan.hdr_payload = 20;
        scan.hdr_postfix = 4;
        record_header(&mut scan).unwrap();

        let entry = &scan.packet().headers()[0];
        // wire_len shrank by the postfix before clamping: 30 - 4 = 26.
        assert_eq!(entry.length, 20);
        assert_eq!(entry.payload, 6);
        assert_eq!(entry.postfix, 0);
        assert_ne!(entry.flags & header_flags::PAYLOAD_TRUNCATED, 0);
        assert_ne!(entry.flags & header_flags::POSTFIX_TRUNCATED, 0);
        assert_eq!(entry.flags & header_flags::HEADER_TRUNCATED, 0);
    }

    #[test]
    fn truncation_reaches_header_last() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 10];
        let mut scan = fresh(&registry, &mut packet, &buf, MAX_ENTRY_COUNT);

        scan.id = ProtocolId::TCP;
        scan.offset = 0;
        scan.length = 20;
        scan.hdr_payload = 5;
        record_header(&mut scan).unwrap();

        let entry = &scan.packet().headers()[0];
        assert_eq!(entry.length, 10);
        assert_eq!(entry.payload, 0);
        assert_ne!(entry.flags & header_flags::HEADER_TRUNCATED, 0);
        assert_ne!(entry.flags & header_flags::PAYLOAD_TRUNCATED, 0);
    }

    #[test]
    fn capacity_overflow_is_an_error() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 64];
        let mut scan = fresh(&registry, &mut packet, &buf, 2);

        for i in 0..2 {
            scan.is_recorded = false;
            scan.id = ProtocolId::ETHERNET;
            scan.offset = i;
            scan.length = 1;
            record_header(&mut scan).unwrap();
        }

        scan.is_recorded = false;
        scan.length = 1;
        let err = record_header(&mut scan).unwrap_err();
        assert!(matches!(err, ScanError::TooManyHeaders { max: 2 }));
    }

    #[test]
    fn cumulative_flags_propagate() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        let buf = [0u8; 64];
        let mut scan = fresh(&registry, &mut packet, &buf, MAX_ENTRY_COUNT);

        scan.id = ProtocolId::IP4;
        scan.length = 20;
        scan.flags |= header_flags::FRAGMENTED;
        record_header(&mut scan).unwrap();

        scan.is_recorded = false;
        scan.clear_header_scratch();
        scan.id = ProtocolId::PAYLOAD;
        scan.offset = 20;
        scan.length = 10;
        record_header(&mut scan).unwrap();

        for entry in scan.packet().headers() {
            assert_ne!(entry.flags & header_flags::FRAGMENTED, 0);
        }
    }
}

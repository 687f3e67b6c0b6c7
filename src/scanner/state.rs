//! Per-scan and per-packet state.
//!
//! [`ScanState`] is the mutable working set threaded through every scan
//! function for one in-progress packet; [`PacketRecord`] is the durable
//! result the scan writes into. Records live in the scanner's ring and are
//! reset, never reallocated, between packets.

use smallvec::SmallVec;

use crate::flow::FlowKey;
use crate::protocol::{ProtocolId, Registry, MAX_ID_COUNT};

/// Flag bits recorded on a [`HeaderEntry`].
pub mod header_flags {
    /// Prefix bytes were cut by the capture. Kept for completeness; the
    /// truncation pass never actually cuts a prefix.
    pub const PREFIX_TRUNCATED: u16 = 0x0001;
    /// The header proper was cut short by the capture.
    pub const HEADER_TRUNCATED: u16 = 0x0002;
    /// The inter-header gap was cut short.
    pub const GAP_TRUNCATED: u16 = 0x0004;
    /// The payload region was cut short.
    pub const PAYLOAD_TRUNCATED: u16 = 0x0008;
    /// The trailer/postfix region was cut short.
    pub const POSTFIX_TRUNCATED: u16 = 0x0010;
    /// Header belongs to a fragmented datagram. Cumulative: once set, every
    /// deeper header in the packet inherits it.
    pub const FRAGMENTED: u16 = 0x0020;
    /// Bounds checks against the enclosing header are not meaningful
    /// (e.g. an IPv4 header embedded in an ICMP error). Cumulative.
    pub const IGNORE_BOUNDS: u16 = 0x0040;
    /// Sub-headers (IPv4 options) were dissected into the entry.
    pub const SUBHEADERS_DISSECTED: u16 = 0x0080;

    /// Flags inherited by every subsequently encapsulated header.
    pub const CUMULATIVE_MASK: u16 = FRAGMENTED | IGNORE_BOUNDS;
}

/// Flag bits recorded on a [`PacketRecord`].
pub mod packet_flags {
    /// Captured length is smaller than the on-wire length.
    pub const TRUNCATED: u16 = 0x0001;
}

/// Capacity of the tunnel/chunk resume stack. SCTP nests a handful of
/// levels at most; pushes beyond this are dropped, never corrupting state.
pub const RESUME_STACK_DEPTH: usize = 8;

/// Hard cap on header entries a single packet may record.
pub const MAX_ENTRY_COUNT: usize = 64;

/// Sanity ceiling for one packet record's in-memory size.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// A dissected sub-header (an IPv4 option) attached to a header entry.
/// Offsets are relative to the start of the owning header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubHeader {
    pub id: u8,
    pub offset: usize,
    pub length: usize,
}

/// Location and shape of one discovered header.
///
/// Entries are append-only: once recorded they are never mutated, except
/// that a network-layer decoder may trim the payload/postfix of the
/// link-layer entry directly before it when the IP total length reveals an
/// Ethernet trailer.
#[derive(Debug, Clone, Default)]
pub struct HeaderEntry {
    pub id: ProtocolId,
    /// Absolute offset of the header proper (past any prefix).
    pub offset: usize,
    pub length: usize,
    pub prefix: usize,
    pub gap: usize,
    pub payload: usize,
    pub postfix: usize,
    pub flags: u16,
    pub subheaders: SmallVec<[SubHeader; 4]>,
}

impl HeaderEntry {
    pub fn is_truncated(&self) -> bool {
        self.flags
            & (header_flags::HEADER_TRUNCATED
                | header_flags::GAP_TRUNCATED
                | header_flags::PAYLOAD_TRUNCATED
                | header_flags::POSTFIX_TRUNCATED
                | header_flags::PREFIX_TRUNCATED)
            != 0
    }

    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + self.length + self.gap
    }
}

/// Everything recorded about one scanned packet.
#[derive(Debug, Clone, Default)]
pub struct PacketRecord {
    frame_num: u64,
    wire_len: u32,
    cap_len: u32,
    flags: u16,
    header_map: u64,
    headers: SmallVec<[HeaderEntry; 8]>,
    flow_key: FlowKey,
    final_offset: usize,
    max_headers: usize,
}

impl PacketRecord {
    pub(crate) fn reset(&mut self, frame_num: u64, wire_len: u32, cap_len: u32, max_headers: usize) {
        self.frame_num = frame_num;
        self.wire_len = wire_len;
        self.cap_len = cap_len;
        self.flags = 0;
        self.header_map = 0;
        self.headers.clear();
        self.flow_key.clear();
        self.final_offset = 0;
        self.max_headers = max_headers;
        if cap_len != wire_len {
            self.flags |= packet_flags::TRUNCATED;
        }
    }

    /// Bytes of scratch storage one record needs for `max_headers` entries.
    /// Callers sizing their own pools use this; the scanner's ring is
    /// pre-sized with it too.
    pub fn byte_size(max_headers: usize) -> usize {
        std::mem::size_of::<PacketRecord>() + max_headers * std::mem::size_of::<HeaderEntry>()
    }

    /// In-memory size of this record as populated.
    pub fn byte_size_used(&self) -> usize {
        std::mem::size_of::<PacketRecord>()
            + self.headers.len() * std::mem::size_of::<HeaderEntry>()
            + self
                .headers
                .iter()
                .map(|h| h.subheaders.len() * std::mem::size_of::<SubHeader>())
                .sum::<usize>()
    }

    /// Monotonic frame sequence number assigned by the scanner.
    pub fn frame_number(&self) -> u64 {
        self.frame_num
    }

    pub fn wire_len(&self) -> u32 {
        self.wire_len
    }

    pub fn cap_len(&self) -> u32 {
        self.cap_len
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & packet_flags::TRUNCATED != 0
    }

    /// O(1) presence query against the header bitmap.
    pub fn has_header(&self, id: ProtocolId) -> bool {
        id.is_valid() && self.header_map & (1u64 << id.index()) != 0
    }

    /// Bitmap of every protocol id recorded in this packet.
    pub fn header_map(&self) -> u64 {
        self.header_map
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    /// Entries in discovery order.
    pub fn headers(&self) -> &[HeaderEntry] {
        &self.headers
    }

    pub fn header(&self, index: usize) -> Option<&HeaderEntry> {
        self.headers.get(index)
    }

    /// First recorded entry with the given id.
    pub fn find_header(&self, id: ProtocolId) -> Option<&HeaderEntry> {
        self.headers.iter().find(|h| h.id == id)
    }

    pub fn flow_key(&self) -> &FlowKey {
        &self.flow_key
    }

    /// Offset at which the scan stopped.
    pub fn final_offset(&self) -> usize {
        self.final_offset
    }

    pub(crate) fn set_final_offset(&mut self, offset: usize) {
        self.final_offset = offset;
    }

    pub(crate) fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub(crate) fn mark_header(&mut self, id: ProtocolId) {
        if id.is_valid() {
            self.header_map |= 1u64 << id.index();
        }
    }

    pub(crate) fn push_header(&mut self, entry: HeaderEntry) {
        self.headers.push(entry);
    }

    pub(crate) fn last_header_mut(&mut self) -> Option<&mut HeaderEntry> {
        self.headers.last_mut()
    }

    pub(crate) fn flow_key_mut(&mut self) -> &mut FlowKey {
        &mut self.flow_key
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ResumePoint {
    offset: usize,
    next_id: ProtocolId,
}

/// Mutable state of one in-progress scan, passed by exclusive reference to
/// every scan function. Decoders report their findings by setting `length`,
/// `next_id` and the `hdr_*` region fields.
pub struct ScanState<'a> {
    registry: &'a Registry,
    packet: &'a mut PacketRecord,
    buf: &'a [u8],

    /// Protocol currently being scanned.
    pub id: ProtocolId,
    /// Protocol the current header chains to. Defaults to payload each
    /// iteration; decoders override it on a successful lookup.
    pub next_id: ProtocolId,
    /// Absolute offset of the current header.
    pub offset: usize,
    /// Length of the current header; 0 means "could not parse".
    pub length: usize,

    /// Effective buffer length. Shrinks when trailer bytes are discovered.
    pub buf_len: usize,
    /// Immutable captured length of the underlying buffer.
    pub mem_len: usize,
    /// Claimed on-wire length. Shrinks in step with recorded postfixes.
    pub wire_len: usize,

    /// Cumulative flags inherited by every header recorded from now on.
    pub flags: u16,

    /// Region sizes of the current header, reset every iteration.
    pub hdr_prefix: usize,
    pub hdr_gap: usize,
    pub hdr_payload: usize,
    pub hdr_postfix: usize,
    /// Per-header flags for the entry about to be recorded.
    pub hdr_flags: u16,

    /// Transport ports seen most recently; heuristic validators read these.
    pub sport: u16,
    pub dport: u16,
    /// Offset of the enclosing SCTP header, for chunk decoders.
    pub sctp_offset: usize,

    pub(crate) is_recorded: bool,
    pub(crate) hdr_count: usize,
    pub(crate) pending_subheaders: SmallVec<[SubHeader; 4]>,

    stack: [ResumePoint; RESUME_STACK_DEPTH],
    stack_len: usize,
}

impl<'a> ScanState<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        packet: &'a mut PacketRecord,
        buf: &'a [u8],
        wire_len: usize,
        first_id: ProtocolId,
    ) -> Self {
        ScanState {
            registry,
            packet,
            buf,
            id: first_id,
            next_id: ProtocolId::PAYLOAD,
            offset: 0,
            length: 0,
            buf_len: buf.len(),
            mem_len: buf.len(),
            wire_len,
            flags: 0,
            hdr_prefix: 0,
            hdr_gap: 0,
            hdr_payload: 0,
            hdr_postfix: 0,
            hdr_flags: 0,
            sport: 0,
            dport: 0,
            sctp_offset: 0,
            is_recorded: false,
            hdr_count: 0,
            pending_subheaders: SmallVec::new(),
            stack: [ResumePoint::default(); RESUME_STACK_DEPTH],
            stack_len: 0,
        }
    }

    /// The raw packet buffer.
    #[inline]
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Bytes between the current offset and the effective buffer end.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf_len.saturating_sub(self.offset)
    }

    /// Whether `len` bytes past the current offset are inside the buffer.
    #[inline]
    pub fn is_accessible(&self, len: usize) -> bool {
        self.offset + len <= self.buf_len
    }

    /// Whether a fragmented outer header was seen earlier in this packet.
    #[inline]
    pub fn is_fragment(&self) -> bool {
        self.flags & header_flags::FRAGMENTED != 0
    }

    /// Whether the capture holds fewer bytes than the packet had on the
    /// wire. Distinguishes a cut-off header (record it clamped) from bytes
    /// that were never a header at all (leave length 0).
    #[inline]
    pub fn is_wire_truncated(&self) -> bool {
        self.wire_len > self.buf_len
    }

    /// The packet record being filled.
    #[inline]
    pub fn packet(&self) -> &PacketRecord {
        self.packet
    }

    #[inline]
    pub fn packet_mut(&mut self) -> &mut PacketRecord {
        self.packet
    }

    /// Flow key of the packet record being filled.
    #[inline]
    pub fn flow_key_mut(&mut self) -> &mut FlowKey {
        self.packet.flow_key_mut()
    }

    /// Queue a dissected sub-header for attachment to the current header
    /// entry when it is recorded.
    pub fn push_subheader(&mut self, sub: SubHeader) {
        self.pending_subheaders.push(sub);
    }

    /// Push a resume point for a chunked protocol: once the nested scan
    /// bottoms out in payload, scanning continues at `offset` with
    /// `next_id`. A push beyond the stack's fixed depth is dropped.
    pub fn push_resume(&mut self, offset: usize, next_id: ProtocolId) {
        if self.stack_len < RESUME_STACK_DEPTH {
            self.stack[self.stack_len] = ResumePoint { offset, next_id };
            self.stack_len += 1;
        } else {
            tracing::debug!(
                depth = RESUME_STACK_DEPTH,
                "resume stack full, dropping push"
            );
        }
    }

    /// The most recent resume point, if any. The payload scanner bounds
    /// itself here so suspended chunk sequences are not swallowed.
    pub fn resume_top(&self) -> Option<(usize, ProtocolId)> {
        if self.stack_len == 0 {
            return None;
        }
        let p = self.stack[self.stack_len - 1];
        Some((p.offset, p.next_id))
    }

    pub(crate) fn pop_resume(&mut self) -> Option<(usize, ProtocolId)> {
        if self.stack_len == 0 {
            return None;
        }
        self.stack_len -= 1;
        let p = self.stack[self.stack_len];
        Some((p.offset, p.next_id))
    }

    pub(crate) fn resume_depth(&self) -> usize {
        self.stack_len
    }

    /// Run the validator for `id` against the bytes of the *next* header
    /// (offset temporarily advanced past the current header and gap), then
    /// restore the scan position. Protocols without a validator are
    /// accepted as-is; a failed validation falls back to payload.
    pub fn validate_next(&mut self, id: ProtocolId) -> ProtocolId {
        if self.buf_len.saturating_sub(self.offset) == 0 {
            return ProtocolId::PAYLOAD;
        }

        let Some(validate) = self.registry.validate_fn(id) else {
            return id;
        };

        let saved_offset = self.offset;
        let saved_length = self.length;
        self.offset += self.length + self.hdr_gap;

        let result = validate(self);

        self.offset = saved_offset;
        self.length = saved_length;

        result.unwrap_or(ProtocolId::PAYLOAD)
    }

    /// Run the validator for `id` against the current offset.
    pub fn validate(&self, id: ProtocolId) -> ProtocolId {
        match self.registry.validate_fn(id) {
            Some(validate) => validate(self).unwrap_or(ProtocolId::PAYLOAD),
            None => id,
        }
    }

    /// Reset the per-header scratch after an iteration completes.
    pub(crate) fn clear_header_scratch(&mut self) {
        self.hdr_prefix = 0;
        self.hdr_gap = 0;
        self.hdr_payload = 0;
        self.hdr_postfix = 0;
        self.hdr_flags = 0;
        self.pending_subheaders.clear();
    }
}

// Keep the flags array type in one place; the scanner and the machine both
// index it by protocol id.
pub(crate) type BindingFlagsTable = [u32; MAX_ID_COUNT];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Registry;

    #[test]
    fn resume_stack_is_bounded() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        packet.reset(0, 4, 4, MAX_ENTRY_COUNT);
        let buf = [0u8; 4];
        let mut scan = ScanState::new(&registry, &mut packet, &buf, 4, ProtocolId::ETHERNET);

        for i in 0..RESUME_STACK_DEPTH + 3 {
            scan.push_resume(i, ProtocolId::SCTP_DATA);
        }
        assert_eq!(scan.resume_depth(), RESUME_STACK_DEPTH);

        // LIFO order, overflow pushes were dropped.
        assert_eq!(
            scan.pop_resume(),
            Some((RESUME_STACK_DEPTH - 1, ProtocolId::SCTP_DATA))
        );
    }

    #[test]
    fn accessibility_tracks_effective_length() {
        let registry = Registry::builtin();
        let mut packet = PacketRecord::default();
        packet.reset(0, 10, 10, MAX_ENTRY_COUNT);
        let buf = [0u8; 10];
        let mut scan = ScanState::new(&registry, &mut packet, &buf, 10, ProtocolId::ETHERNET);

        assert!(scan.is_accessible(10));
        assert!(!scan.is_accessible(11));

        scan.offset = 4;
        assert_eq!(scan.remaining(), 6);

        // Trailer discovery shrinks the effective buffer.
        scan.buf_len = 8;
        assert_eq!(scan.remaining(), 4);
        assert!(!scan.is_accessible(5));
    }

    #[test]
    fn record_bitmap_and_lookup() {
        let mut packet = PacketRecord::default();
        packet.reset(7, 100, 100, MAX_ENTRY_COUNT);
        packet.mark_header(ProtocolId::IP4);
        packet.push_header(HeaderEntry {
            id: ProtocolId::IP4,
            offset: 14,
            length: 20,
            ..Default::default()
        });

        assert!(packet.has_header(ProtocolId::IP4));
        assert!(!packet.has_header(ProtocolId::TCP));
        assert_eq!(packet.frame_number(), 7);
        assert_eq!(packet.find_header(ProtocolId::IP4).unwrap().offset, 14);
    }

    #[test]
    fn record_sizing_formula() {
        let base = PacketRecord::byte_size(0);
        let sized = PacketRecord::byte_size(MAX_ENTRY_COUNT);
        assert_eq!(
            sized - base,
            MAX_ENTRY_COUNT * std::mem::size_of::<HeaderEntry>()
        );
        assert!(sized < MAX_RECORD_BYTES);
    }
}

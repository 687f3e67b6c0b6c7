//! The scanner session: configuration, the packet-record ring, and the
//! scan entry point.

mod machine;
mod state;

use std::sync::Arc;

use crate::error::{Result, ScanError};
use crate::protocol::{ProtocolId, Registry, MAX_ID_COUNT};

pub use state::{
    header_flags, packet_flags, HeaderEntry, PacketRecord, ScanState, SubHeader, MAX_ENTRY_COUNT,
    MAX_RECORD_BYTES, RESUME_STACK_DEPTH,
};

pub(crate) use state::BindingFlagsTable;

use crate::protocol::binding_flags;

/// Scanner sizing and binding defaults.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Header entries one packet may record before the scan errors out.
    pub max_headers: usize,
    /// Packet records kept live before the ring wraps and reuses slots.
    pub ring_slots: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            max_headers: MAX_ENTRY_COUNT,
            ring_slots: 16,
        }
    }
}

/// A packet scanner session.
///
/// Owns its scratch storage (a ring of pre-allocated packet records) and
/// the per-protocol binding flags, and shares an immutable [`Registry`]
/// with any number of sibling scanners. One scanner serves one capture
/// stream; scanning itself allocates nothing on the hot path.
pub struct Scanner {
    registry: Arc<Registry>,
    flags: BindingFlagsTable,
    frame_num: u64,
    ring: Vec<PacketRecord>,
    cursor: usize,
    max_headers: usize,
}

impl Scanner {
    /// A scanner with default sizing and the default binding flags
    /// (heuristics enabled for TCP and UDP, matching their registered
    /// validator chains).
    pub fn new(registry: Arc<Registry>) -> Self {
        Scanner::with_config(registry, ScannerConfig::default())
            .expect("default configuration is valid")
    }

    pub fn with_config(registry: Arc<Registry>, config: ScannerConfig) -> Result<Self> {
        if config.max_headers == 0 || config.max_headers > MAX_ENTRY_COUNT {
            return Err(ScanError::InvalidConfig {
                reason: "max_headers must be in 1..=MAX_ENTRY_COUNT",
            });
        }
        if config.ring_slots == 0 {
            return Err(ScanError::InvalidConfig {
                reason: "ring_slots must be nonzero",
            });
        }
        if PacketRecord::byte_size(config.max_headers) > MAX_RECORD_BYTES {
            return Err(ScanError::InvalidConfig {
                reason: "record size exceeds the sanity ceiling",
            });
        }

        let mut flags = [0u32; MAX_ID_COUNT];
        flags[ProtocolId::TCP.index()] = binding_flags::HEURISTIC;
        flags[ProtocolId::UDP.index()] = binding_flags::HEURISTIC;

        Ok(Scanner {
            registry,
            flags,
            frame_num: 0,
            ring: vec![PacketRecord::default(); config.ring_slots],
            cursor: 0,
            max_headers: config.max_headers,
        })
    }

    /// Scan one captured packet.
    ///
    /// `buf` is the captured bytes; `wire_len` the length the packet had
    /// on the wire, which must be at least `buf.len()` (a shorter capture
    /// marks the record truncated). `first_id` names the outermost header,
    /// normally dictated by the capture's link type.
    ///
    /// The returned record lives in the scanner's ring: it stays valid
    /// until `ring_slots` further packets have been scanned.
    pub fn scan(&mut self, buf: &[u8], wire_len: u32, first_id: ProtocolId) -> Result<&PacketRecord> {
        let cap_len = buf.len() as u32;
        if wire_len < cap_len {
            return Err(ScanError::WireLengthTooSmall { wire_len, cap_len });
        }

        let frame_num = self.frame_num;
        self.frame_num += 1;

        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % self.ring.len();

        let record = &mut self.ring[slot];
        record.reset(frame_num, wire_len, cap_len, self.max_headers);

        let final_offset = machine::run(
            &self.registry,
            &self.flags,
            record,
            buf,
            wire_len as usize,
            first_id,
        )?;
        record.set_final_offset(final_offset);

        let bytes = record.byte_size_used();
        if bytes > MAX_RECORD_BYTES {
            return Err(ScanError::RecordTooLarge {
                bytes,
                ceiling: MAX_RECORD_BYTES,
            });
        }

        Ok(&self.ring[slot])
    }

    /// Set the binding flags for one protocol id. Takes effect on the next
    /// scan; see [`binding_flags`].
    pub fn set_binding_flags(&mut self, id: ProtocolId, flags: u32) {
        if id.is_valid() {
            self.flags[id.index()] = flags;
        }
    }

    pub fn binding_flags(&self, id: ProtocolId) -> u32 {
        if id.is_valid() {
            self.flags[id.index()]
        } else {
            0
        }
    }

    /// Frame number the next scanned packet will carry.
    pub fn frame_number(&self) -> u64 {
        self.frame_num
    }

    /// Resynchronize the frame counter (e.g. when resuming a capture).
    pub fn set_frame_number(&mut self, frame_num: u64) {
        self.frame_num = frame_num;
    }

    /// The registry this scanner dispatches through.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

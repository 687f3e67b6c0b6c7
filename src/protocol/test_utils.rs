//! Shared fixtures for decoder unit tests.

use crate::protocol::{ProtocolId, Registry};
use crate::scanner::{PacketRecord, ScanState, MAX_ENTRY_COUNT};

/// Owns the registry and packet record a [`ScanState`] borrows, so decoder
/// tests can drive a single scan function in isolation.
pub(crate) struct Harness {
    registry: Registry,
    packet: PacketRecord,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Harness {
            registry: Registry::builtin(),
            packet: PacketRecord::default(),
        }
    }

    /// A fresh scan state positioned at offset 0 of `buf`, as the scan
    /// loop would present it to the decoder for `id`.
    pub(crate) fn state<'a>(&'a mut self, buf: &'a [u8], id: ProtocolId) -> ScanState<'a> {
        let Harness { registry, packet } = self;
        packet.reset(0, buf.len() as u32, buf.len() as u32, MAX_ENTRY_COUNT);
        ScanState::new(registry, packet, buf, buf.len(), id)
    }
}

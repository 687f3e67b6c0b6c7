//! # wirescan
//!
//! Zero-copy protocol-header scanner and flow classifier for raw packet
//! buffers.
//!
//! Given a captured packet, wirescan walks successive protocol headers
//! (Ethernet, VLAN, IP, TCP/UDP, SCTP chunks, RTP/RTCP, SIP/HTTP, ...),
//! determines each header's boundaries, infers the next header through
//! port/EtherType lookup tables and heuristic validators, and records the
//! result into a compact per-packet header table plus a flow key that
//! identifies the bidirectional conversation the packet belongs to.
//!
//! The input is untrusted and possibly truncated: decoders bounds-check
//! before every field access, truncated regions are clamped and flagged
//! rather than rejected, and a header that cannot be parsed degrades to
//! opaque payload instead of failing the packet.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use wirescan::{ProtocolId, Registry, Scanner};
//!
//! let registry = Arc::new(Registry::builtin());
//! let mut scanner = Scanner::new(registry);
//!
//! // A minimal Ethernet + IPv4 + UDP datagram.
//! let packet = vec![
//!     0x02, 0, 0, 0, 0, 1, 0x02, 0, 0, 0, 0, 2, 0x08, 0x00, // Ethernet
//!     0x45, 0x00, 0x00, 0x20, 0x00, 0x01, 0x00, 0x00, // IPv4 ...
//!     0x40, 0x11, 0x00, 0x00, 10, 0, 0, 1, 10, 0, 0, 2,
//!     0x9c, 0x40, 0x9c, 0x41, 0x00, 0x0c, 0x00, 0x00, // UDP
//!     1, 2, 3, 4, // payload
//! ];
//!
//! let wire_len = packet.len() as u32;
//! let record = scanner.scan(&packet, wire_len, ProtocolId::ETHERNET).unwrap();
//!
//! assert!(record.has_header(ProtocolId::UDP));
//! assert!(record.flow_key().is_reversible());
//! for header in record.headers() {
//!     println!("{} @ {} len {}", header.id, header.offset, header.length);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |                            wirescan                               |
//! +-------------------------------------------------------------------+
//! |  wire/      - endian-explicit reads/writes at arbitrary offsets   |
//! |  protocol/  - ProtocolId, Registry, one scanner per protocol      |
//! |  scanner/   - scan state machine, truncation handling, ring       |
//! |  flow/      - flow-key pairs, reversible hash, direction match    |
//! |  error/     - error types                                         |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Concurrency
//!
//! A [`Registry`] is immutable once built and freely shared. Each
//! [`Scanner`] owns its scratch storage and serves one capture stream;
//! run one scanner per thread and no synchronization is needed. A scan is
//! a single synchronous call with no I/O, no suspension points, and no
//! allocation on the hot path.

pub mod error;
pub mod flow;
pub mod prelude;
pub mod protocol;
pub mod scanner;
pub mod wire;

pub use error::{Result, ScanError};
pub use flow::{flow_flags, FlowDirection, FlowKey, MAX_FLOW_PAIRS};
pub use protocol::{
    binding_flags, ethertype, ip_protocol, lookup_ethertype, ProtocolId, Registry, ScanFn,
    ValidateFn, MAX_ID_COUNT,
};
pub use scanner::{
    header_flags, packet_flags, HeaderEntry, PacketRecord, ScanState, Scanner, ScannerConfig,
    SubHeader, MAX_ENTRY_COUNT, MAX_RECORD_BYTES, RESUME_STACK_DEPTH,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Convenience re-exports for the common case.
//!
//! ```rust
//! use wirescan::prelude::*;
//! ```

pub use crate::error::{Result, ScanError};
pub use crate::flow::{FlowDirection, FlowKey};
pub use crate::protocol::{binding_flags, ProtocolId, Registry};
pub use crate::scanner::{
    header_flags, packet_flags, HeaderEntry, PacketRecord, Scanner, ScannerConfig,
};

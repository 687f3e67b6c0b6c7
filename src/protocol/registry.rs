//! Dispatch tables for scan functions, validators and heuristic chains.
//!
//! A registry is built once at startup and then only read, so any number
//! of scanner instances (one per capture thread) may share it. Dispatching
//! an id with no registered scan function is a defined no-op: the header
//! length stays 0 and the scan loop falls back to payload.

use crate::protocol::{ProtocolId, MAX_ID_COUNT};
use crate::scanner::ScanState;

/// A per-protocol header scanner. Reports through the scan state: header
/// length, next protocol id, region sizes and flow-key contributions.
pub type ScanFn = for<'a> fn(&mut ScanState<'a>);

/// A passive header validator. Inspects the bytes at the current scan
/// offset and either confirms a protocol id or reports no match. The
/// shared reference makes mutation of scan state impossible.
pub type ValidateFn = for<'a> fn(&ScanState<'a>) -> Option<ProtocolId>;

/// Upper bound on heuristic validators chained per protocol id.
pub const MAX_HEURISTICS_PER_ID: usize = 8;

/// Per-protocol binding behavior, configured on the scanner (not the
/// registry) as a bit set per id.
pub mod binding_flags {
    /// Discard the decoder's discovered next id and force payload. The
    /// caller has explicitly disabled auto-chaining past this protocol.
    pub const OVERRIDE: u32 = 0x0001;
    /// Consult the protocol's heuristic validator chain.
    pub const HEURISTIC: u32 = 0x0002;
    /// Run heuristics before trusting the direct lookup rather than only
    /// after it came up empty.
    pub const HEURISTIC_PRE: u32 = 0x0004;
}

/// Immutable dispatch tables indexed by protocol id.
pub struct Registry {
    scan: [Option<ScanFn>; MAX_ID_COUNT],
    validate: [Option<ValidateFn>; MAX_ID_COUNT],
    heuristics: [Vec<ValidateFn>; MAX_ID_COUNT],
    names: [&'static str; MAX_ID_COUNT],
}

impl Registry {
    /// An empty registry. Useful only as a base for custom registration;
    /// almost every caller wants [`Registry::builtin`].
    pub fn new() -> Self {
        Registry {
            scan: [None; MAX_ID_COUNT],
            validate: [None; MAX_ID_COUNT],
            heuristics: std::array::from_fn(|_| Vec::new()),
            names: [""; MAX_ID_COUNT],
        }
    }

    /// The full built-in protocol set.
    pub fn builtin() -> Self {
        use super::*;

        let mut r = Registry::new();

        // Builtin catch-all
        r.register_scanner(ProtocolId::PAYLOAD, sll::scan_payload);

        // Datalink families
        r.register_scanner(ProtocolId::ETHERNET, ethernet::scan_ethernet);
        r.register_scanner(ProtocolId::IEEE_802DOT3, ethernet::scan_802dot3);
        r.register_scanner(ProtocolId::IEEE_802DOT2, llc::scan_llc);
        r.register_scanner(ProtocolId::IEEE_SNAP, llc::scan_snap);
        r.register_scanner(ProtocolId::IEEE_802DOT1Q, vlan::scan_vlan);
        r.register_scanner(ProtocolId::L2TP, ppp::scan_l2tp);
        r.register_scanner(ProtocolId::PPP, ppp::scan_ppp);
        r.register_scanner(ProtocolId::SLL, sll::scan_sll);
        r.register_scanner(ProtocolId::NULL_HEADER, sll::scan_null_header);

        // TCP/IP families
        r.register_scanner(ProtocolId::IP4, ipv4::scan_ip4);
        r.register_scanner(ProtocolId::IP6, ipv6::scan_ip6);
        r.register_scanner(ProtocolId::TCP, tcp::scan_tcp);
        r.register_scanner(ProtocolId::UDP, udp::scan_udp);
        r.register_scanner(ProtocolId::ICMP, icmp::scan_icmp);
        r.register_scanner(ProtocolId::ARP, arp::scan_arp);
        r.register_scanner(ProtocolId::HTTP, http::scan_http);
        r.register_scanner(ProtocolId::HTML, http::scan_html);

        // Voice and video
        r.register_scanner(ProtocolId::SIP, sip::scan_sip);
        r.register_scanner(ProtocolId::SDP, sip::scan_sdp);
        r.register_scanner(ProtocolId::RTP, rtp::scan_rtp);

        // SCTP and its chunk family: every chunk id shares one scanner.
        r.register_scanner(ProtocolId::SCTP, sctp::scan_sctp);
        for chunk_type in 0..=14u8 {
            r.register_scanner(ProtocolId::SCTP_DATA.offset_by(chunk_type), sctp::scan_sctp_chunk);
        }

        // RTCP report types likewise.
        for report in 0..=4u8 {
            r.register_scanner(
                ProtocolId::RTCP_SENDER_REPORT.offset_by(report),
                rtcp::scan_rtcp,
            );
        }

        // Direct validators, used by validate_next() from the decoders.
        r.register_validator(ProtocolId::HTTP, http::validate_http);
        r.register_validator(ProtocolId::SIP, sip::validate_sip);
        r.register_validator(ProtocolId::RTP, rtp::validate_rtp);
        r.register_validator(ProtocolId::RTCP_SENDER_REPORT, rtcp::validate_rtcp);

        // Heuristic chains consulted by the scan loop when the direct
        // port/type lookup yields nothing.
        r.register_heuristic(ProtocolId::TCP, http::validate_http);
        r.register_heuristic(ProtocolId::TCP, sip::validate_sip);
        r.register_heuristic(ProtocolId::UDP, rtp::validate_rtp);
        r.register_heuristic(ProtocolId::UDP, rtcp::validate_rtcp);
        r.register_heuristic(ProtocolId::UDP, sip::validate_sip);

        for i in 0..MAX_ID_COUNT {
            r.names[i] = ProtocolId(i as u8).name();
        }

        r
    }

    /// Install the scan function for `id`, replacing any existing one.
    pub fn register_scanner(&mut self, id: ProtocolId, f: ScanFn) {
        if id.is_valid() {
            self.scan[id.index()] = Some(f);
        }
    }

    /// Install the direct validator for `id`.
    pub fn register_validator(&mut self, id: ProtocolId, f: ValidateFn) {
        if id.is_valid() {
            self.validate[id.index()] = Some(f);
        }
    }

    /// Append a heuristic validator to `id`'s chain. Chains are tried in
    /// registration order; the first confirming validator wins. Beyond
    /// [`MAX_HEURISTICS_PER_ID`] the registration is ignored.
    pub fn register_heuristic(&mut self, id: ProtocolId, f: ValidateFn) {
        if id.is_valid() && self.heuristics[id.index()].len() < MAX_HEURISTICS_PER_ID {
            self.heuristics[id.index()].push(f);
        }
    }

    /// Override the display name for `id`.
    pub fn set_name(&mut self, id: ProtocolId, name: &'static str) {
        if id.is_valid() {
            self.names[id.index()] = name;
        }
    }

    /// Display name for `id` (empty if never registered).
    pub fn name(&self, id: ProtocolId) -> &'static str {
        if id.is_valid() {
            self.names[id.index()]
        } else {
            id.name()
        }
    }

    pub(crate) fn scan_fn(&self, id: ProtocolId) -> Option<ScanFn> {
        if id.is_valid() {
            self.scan[id.index()]
        } else {
            None
        }
    }

    pub(crate) fn validate_fn(&self, id: ProtocolId) -> Option<ValidateFn> {
        if id.is_valid() {
            self.validate[id.index()]
        } else {
            None
        }
    }

    pub(crate) fn heuristics(&self, id: ProtocolId) -> &[ValidateFn] {
        if id.is_valid() {
            &self.heuristics[id.index()]
        } else {
            &[]
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::builtin()
    }
}

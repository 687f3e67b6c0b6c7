//! HTTP and HTML text scanners and the HTTP validator.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

use super::sip::text_window;

/// Method tokens and the response prefix that identify an HTTP message.
const HTTP_TOKENS: &[&[u8]] = &[
    b"HTTP", b"CONNECT", b"OPTIONS", b"DELETE", b"TRACE", b"HEAD", b"POST", b"PUT", b"GET",
];

/// Scan an HTTP message: the header block runs to the CRLFCRLF terminator,
/// or to the end of the enclosing payload window when none is found.
pub(crate) fn scan_http(scan: &mut ScanState) {
    let buf = scan.buf();
    let offset = scan.offset;
    let size = text_window(scan);

    scan.length = size;

    if size >= 4 {
        for i in 0..size - 4 {
            let at = offset + i;
            if buf[at..at + 4] == *b"\r\n\r\n" {
                scan.length = i + 4;
                break;
            }
        }
    }
}

/// HTML (an HTTP body) runs to the end of the buffer.
pub(crate) fn scan_html(scan: &mut ScanState) {
    scan.length = scan.buf_len.saturating_sub(scan.offset);
}

/// Passive check for an HTTP request or response line at the scan offset.
pub(crate) fn validate_http(scan: &ScanState) -> Option<ProtocolId> {
    let buf = scan.buf();
    let offset = scan.offset;
    let size = text_window(scan);

    if size < 5 {
        return None;
    }
    for k in 0..3 {
        let b = wire::read_u8(buf, offset + k);
        if !(0x20..=0x7e).contains(&b) {
            return None;
        }
    }

    for token in HTTP_TOKENS {
        if size >= token.len() && buf[offset..offset + token.len()] == **token {
            return Some(ProtocolId::HTTP);
        }
    }

    None
}

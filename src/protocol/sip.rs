//! SIP and SDP text scanners and the SIP validator.

use crate::protocol::ProtocolId;
use crate::scanner::ScanState;
use crate::wire;

/// Request methods and the response prefix that identify a SIP message.
const SIP_TOKENS: &[&[u8]] = &[
    b"REGISTER ",
    b"OPTIONS ",
    b"INVITE ",
    b"CANCEL ",
    b"ACK ",
    b"BYE ",
    b"PRACK ",
    b"REFER ",
    b"UPDATE ",
    b"NOTIFY ",
    b"SUBSCRIBE ",
    b"PUBLISH ",
    b"MESSAGE ",
    b"INFO ",
    b"SIP/2.0 ",
];

const CONTENT_TYPE: &[u8] = b"Content-Type:";
const SDP_MIME: &[u8] = b"application/sdp";

/// Window the text protocol may occupy: the enclosing TCP payload when
/// there is one, otherwise whatever the buffer still holds.
pub(crate) fn text_window(scan: &ScanState) -> usize {
    let remain = scan.buf_len.saturating_sub(scan.offset);
    if scan.packet().has_header(ProtocolId::TCP) {
        if let Some(tcp) = scan.packet().headers().last() {
            return remain.min(tcp.payload);
        }
    }
    remain
}

/// Scan a SIP message: the header block ends at the first blank line
/// (CRLFCRLF, or bare LFLF from unix-minded stacks). A Content-Type of
/// application/sdp chains the body to the SDP scanner.
pub(crate) fn scan_sip(scan: &mut ScanState) {
    let buf = scan.buf();
    let offset = scan.offset;
    let size = text_window(scan);

    scan.length = size;

    let mut content_type = None;
    let mut i = 0;
    while i < size {
        let at = offset + i;
        if size - i >= CONTENT_TYPE.len() && buf[at..at + CONTENT_TYPE.len()] == *CONTENT_TYPE {
            content_type = Some(i + CONTENT_TYPE.len());
            i += CONTENT_TYPE.len();
            continue;
        }

        if size - i >= 4 && buf[at..at + 4] == *b"\r\n\r\n" {
            scan.length = i + 4;
            break;
        }
        if size - i >= 2 && buf[at..at + 2] == *b"\n\n" {
            scan.length = i + 2;
            break;
        }
        i += 1;
    }

    let Some(mut ct) = content_type else {
        scan.next_id = ProtocolId::PAYLOAD;
        return;
    };

    // Skip whitespace after the field name, staying inside the header.
    while ct < scan.length && buf[offset + ct].is_ascii_whitespace() {
        ct += 1;
    }

    if scan.length - ct >= SDP_MIME.len() && buf[offset + ct..offset + ct + SDP_MIME.len()] == *SDP_MIME
    {
        scan.next_id = scan.validate_next(ProtocolId::SDP);
    }
}

/// SDP rides in the SIP body and runs to the end of the buffer.
pub(crate) fn scan_sdp(scan: &mut ScanState) {
    scan.length = scan.buf_len.saturating_sub(scan.offset);
}

/// Passive check for a SIP request or response line at the scan offset.
pub(crate) fn validate_sip(scan: &ScanState) -> Option<ProtocolId> {
    let buf = scan.buf();
    let offset = scan.offset;
    let size = text_window(scan);

    if size < 3 {
        return None;
    }
    for k in 0..3 {
        let b = wire::read_u8(buf, offset + k);
        if !(0x20..=0x7e).contains(&b) {
            return None;
        }
    }

    for token in SIP_TOKENS {
        if size >= token.len() && buf[offset..offset + token.len()] == **token {
            return Some(ProtocolId::SIP);
        }
    }

    None
}

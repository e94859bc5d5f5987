//! Parser for the raw blob returned by the remote renderer.
//!
//! The blob is a header block (status line, `Name: value` lines, blank line)
//! followed by the rendered body. The scan keeps a cursor into the input and
//! an explicit [`ScanState`]; only the status and rate-limit headers are
//! extracted, every other line is skipped.

use lol_html::{RewriteStrSettings, element, rewrite_str};
use tracing::warn;

const CRLF: &[u8] = b"\r\n";
const STATUS_HEADER: &[u8] = b"Status: ";
const RATE_LIMIT_HEADER: &[u8] = b"X-RateLimit-Limit: ";
const RATE_REMAINING_HEADER: &[u8] = b"X-RateLimit-Remaining: ";
const STATUS_OK: u64 = 200;

/// Prefix the remote renderer adds to heading anchor ids.
pub const ANCHOR_ID_PREFIX: &str = "user-content-";

/// Metadata and body extracted from one remote response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// `Status:` header carried the value 200.
    pub status_ok: bool,
    /// Value of `X-RateLimit-Limit`, zero when absent.
    pub rate_limit: u64,
    /// Value of `X-RateLimit-Remaining`, zero when absent.
    pub rate_remaining: u64,
    /// Body with anchor ids rewritten for embedding.
    pub body: String,
    /// No line terminator was found anywhere in the response.
    pub malformed: bool,
}

impl ParsedResponse {
    /// A response is usable only with a 200 status and both rate counters present and positive.
    pub fn is_ok(&self) -> bool {
        self.status_ok && self.rate_limit > 0 && self.rate_remaining > 0
    }

    fn record_header(&mut self, line: &[u8]) {
        if let Some(value) = line.strip_prefix(STATUS_HEADER) {
            let digits = leading_digits(value);
            if !digits.is_empty() {
                self.status_ok = parse_decimal(digits) == STATUS_OK;
            }
        } else if let Some(value) = line.strip_prefix(RATE_LIMIT_HEADER) {
            if is_all_digits(value) {
                self.rate_limit = parse_decimal(value);
            }
        } else if let Some(value) = line.strip_prefix(RATE_REMAINING_HEADER)
            && is_all_digits(value)
        {
            self.rate_remaining = parse_decimal(value);
        }
    }
}

/// Position of the header scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanState {
    /// Nothing that looks like a header has been seen; blank lines are ignored.
    AwaitingHeaders,
    /// Inside the header block; the next blank line ends it.
    ReadingHeaders,
    /// Header block complete; the remainder is body.
    Finished,
}

impl ScanState {
    pub(crate) fn advance(self, line: &[u8]) -> Self {
        match self {
            ScanState::AwaitingHeaders if is_header_line(line) => ScanState::ReadingHeaders,
            ScanState::ReadingHeaders if line.trim_ascii().is_empty() => ScanState::Finished,
            state => state,
        }
    }
}

/// Split a raw response into metadata and body. Never fails: missing data
/// leaves the corresponding field at its default.
pub fn parse(raw: &[u8]) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();
    let mut state = ScanState::AwaitingHeaders;
    let mut cursor = 0;
    let mut lines = 0usize;

    while let Some(offset) = find_crlf(&raw[cursor..]) {
        let line = &raw[cursor..cursor + offset];
        cursor += offset + CRLF.len();
        lines += 1;

        state = state.advance(line);
        if state == ScanState::Finished {
            break;
        }
        parsed.record_header(line);
    }

    parsed.malformed = lines == 0;
    parsed.body = strip_anchor_prefixes(&String::from_utf8_lossy(&raw[cursor..]));
    parsed
}

/// Remove [`ANCHOR_ID_PREFIX`] from the `id` of every anchor element so
/// in-page fragment links resolve once the body is embedded locally.
pub fn strip_anchor_prefixes(html: &str) -> String {
    if !html.contains(ANCHOR_ID_PREFIX) {
        return html.to_string();
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[id]", |el| {
                if let Some(id) = el.get_attribute("id")
                    && let Some(stripped) = id.strip_prefix(ANCHOR_ID_PREFIX)
                {
                    el.set_attribute("id", stripped)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );

    match rewritten {
        Ok(html) => html,
        Err(err) => {
            warn!(
                target = "mdpreview::render::response",
                error = %err,
                "anchor rewrite failed; keeping body as received"
            );
            html.to_string()
        }
    }
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|window| window == CRLF)
}

/// `^[A-Za-z-]+:`
fn is_header_line(line: &[u8]) -> bool {
    let name_len = line
        .iter()
        .take_while(|byte| byte.is_ascii_alphabetic() || **byte == b'-')
        .count();
    name_len > 0 && line.get(name_len) == Some(&b':')
}

fn leading_digits(value: &[u8]) -> &[u8] {
    let len = value.iter().take_while(|byte| byte.is_ascii_digit()).count();
    &value[..len]
}

fn is_all_digits(value: &[u8]) -> bool {
    !value.is_empty() && value.iter().all(u8::is_ascii_digit)
}

/// Saturates at `u64::MAX` for oversized values.
fn parse_decimal(digits: &[u8]) -> u64 {
    digits.iter().fold(0u64, |acc, digit| {
        acc.saturating_mul(10)
            .saturating_add(u64::from(digit - b'0'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_response_is_ok() {
        let parsed = parse(
            b"Status: 200\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 59\r\n\r\n<p>hi</p>",
        );

        assert!(parsed.is_ok());
        assert!(parsed.status_ok);
        assert_eq!(parsed.rate_limit, 60);
        assert_eq!(parsed.rate_remaining, 59);
        assert_eq!(parsed.body, "<p>hi</p>");
        assert!(!parsed.malformed);
    }

    #[test]
    fn forbidden_without_rate_headers_is_not_ok() {
        let parsed = parse(b"Status: 403\r\n\r\nForbidden");

        assert!(!parsed.is_ok());
        assert!(!parsed.status_ok);
        assert_eq!(parsed.rate_limit, 0);
        assert_eq!(parsed.rate_remaining, 0);
        assert_eq!(parsed.body, "Forbidden");
    }

    #[test]
    fn response_without_crlf_is_malformed() {
        let parsed = parse(b"Status: 200 X-RateLimit-Limit: 60 <p>hi</p>");

        assert!(parsed.malformed);
        assert!(!parsed.is_ok());
        assert_eq!(parsed.rate_limit, 0);
        assert_eq!(parsed.rate_remaining, 0);
    }

    #[test]
    fn empty_response_is_malformed() {
        let parsed = parse(b"");
        assert!(parsed.malformed);
        assert!(!parsed.is_ok());
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn status_with_reason_phrase_is_recognised() {
        let parsed = parse(
            b"Status: 200 OK\r\nX-RateLimit-Limit: 5000\r\nX-RateLimit-Remaining: 4999\r\n\r\nbody",
        );
        assert!(parsed.is_ok());
        assert_eq!(parsed.rate_limit, 5000);
    }

    #[test]
    fn ok_status_with_zero_remaining_is_not_ok() {
        let parsed =
            parse(b"Status: 200\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 0\r\n\r\nbody");
        assert!(parsed.status_ok);
        assert!(!parsed.is_ok());
    }

    #[test]
    fn ok_status_without_rate_headers_is_not_ok() {
        let parsed = parse(b"Status: 200\r\nContent-Type: text/html\r\n\r\n<p>hi</p>");
        assert!(parsed.status_ok);
        assert!(!parsed.is_ok());
        assert_eq!(parsed.body, "<p>hi</p>");
    }

    #[test]
    fn leading_blank_line_does_not_end_headers() {
        let parsed = parse(
            b"\r\nStatus: 200\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 1\r\n\r\n<p>x</p>",
        );
        assert!(parsed.is_ok());
        assert_eq!(parsed.body, "<p>x</p>");
    }

    #[test]
    fn unknown_headers_and_status_lines_are_skipped() {
        let parsed = parse(
            b"HTTP/1.1 200 OK\r\nServer: GitHub.com\r\nStatus: 200\r\nX-GitHub-Request-Id: AB:CD\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 58\r\nX-RateLimit-Reset: 1700000000\r\n\r\n<h1>t</h1>",
        );
        assert!(parsed.is_ok());
        assert_eq!(parsed.rate_remaining, 58);
        assert_eq!(parsed.body, "<h1>t</h1>");
    }

    #[test]
    fn header_names_are_case_sensitive() {
        let parsed = parse(
            b"Status: 200\r\nx-ratelimit-limit: 60\r\nx-ratelimit-remaining: 59\r\n\r\nbody",
        );
        assert!(parsed.status_ok);
        assert_eq!(parsed.rate_limit, 0);
        assert!(!parsed.is_ok());
    }

    #[test]
    fn rate_values_must_be_digits_to_end_of_line() {
        let parsed =
            parse(b"Status: 200\r\nX-RateLimit-Limit: 60 per hour\r\nX-RateLimit-Remaining: 59\r\n\r\n");
        assert_eq!(parsed.rate_limit, 0);
        assert_eq!(parsed.rate_remaining, 59);
    }

    #[test]
    fn blank_line_inside_body_is_kept() {
        let parsed = parse(
            b"Status: 200\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 59\r\n\r\n<p>a</p>\r\n\r\n<p>b</p>",
        );
        assert_eq!(parsed.body, "<p>a</p>\r\n\r\n<p>b</p>");
    }

    #[test]
    fn headers_without_terminator_leave_tail_as_body() {
        let parsed = parse(b"Status: 200\r\nX-RateLimit-Limit: 60\r\ntrailing");
        assert!(parsed.status_ok);
        assert_eq!(parsed.rate_limit, 60);
        assert_eq!(parsed.body, "trailing");
        assert!(!parsed.malformed);
    }

    #[test]
    fn oversized_counters_saturate() {
        let parsed = parse(
            b"Status: 200\r\nX-RateLimit-Limit: 99999999999999999999999\r\nX-RateLimit-Remaining: 1\r\n\r\n",
        );
        assert_eq!(parsed.rate_limit, u64::MAX);
        assert!(parsed.is_ok());
    }

    #[test]
    fn scan_state_transitions() {
        let state = ScanState::AwaitingHeaders;
        assert_eq!(state.advance(b""), ScanState::AwaitingHeaders);
        assert_eq!(state.advance(b"garbage"), ScanState::AwaitingHeaders);
        assert_eq!(state.advance(b": no-name"), ScanState::AwaitingHeaders);

        let state = state.advance(b"Status: 200");
        assert_eq!(state, ScanState::ReadingHeaders);
        assert_eq!(state.advance(b"X-Other: 1"), ScanState::ReadingHeaders);
        assert_eq!(state.advance(b"  "), ScanState::Finished);
        assert_eq!(ScanState::Finished.advance(b"Status: 200"), ScanState::Finished);
    }

    #[test]
    fn anchor_prefix_is_stripped() {
        let html = r##"<h2><a id="user-content-foo" class="anchor" href="#foo">x</a>Foo</h2>"##;
        let rewritten = strip_anchor_prefixes(html);
        assert_eq!(
            rewritten,
            r##"<h2><a id="foo" class="anchor" href="#foo">x</a>Foo</h2>"##
        );
    }

    #[test]
    fn parse_rewrites_anchor_ids_in_body() {
        let parsed = parse(
            b"Status: 200\r\nX-RateLimit-Limit: 60\r\nX-RateLimit-Remaining: 59\r\n\r\n<a id=\"user-content-intro\" class=\"anchor\" href=\"#intro\"></a>",
        );
        assert_eq!(
            parsed.body,
            r##"<a id="intro" class="anchor" href="#intro"></a>"##
        );
    }

    #[test]
    fn other_elements_and_ids_are_untouched() {
        let html = r#"<div id="user-content-box"><a id="plain" href="/x">x</a><a href="/y">user-content-y</a></div>"#;
        assert_eq!(strip_anchor_prefixes(html), html);
    }
}

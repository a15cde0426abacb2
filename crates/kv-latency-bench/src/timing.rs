// Numan Thabit 2025
//! Extraction of server-reported timing from raw HTTP responses.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_MS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^X-KV-Write-Ms:\s*(\d+)").expect("static header timing pattern")
});

static BODY_MS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)timing is\s+(\d+)\s*ms").expect("static body timing pattern"));

/// Parses the millisecond timing reported by the service.
///
/// `raw` is the full response text (status line, headers and body). The
/// `X-KV-Write-Ms` header takes precedence over a `timing is <n> ms` phrase
/// in the body. Returns `None` when neither signal is present.
pub fn parse_timing_ms(raw: &str) -> Option<u64> {
    if let Some(caps) = HEADER_MS_RE.captures(raw) {
        return caps[1].parse().ok();
    }
    BODY_MS_RE
        .captures(raw)
        .and_then(|caps| caps[1].parse().ok())
}

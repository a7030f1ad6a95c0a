use once_cell::sync::Lazy;
use regex::Regex;

/// PII scrubber for free text, query parameters and log messages.
///
/// Regex based and best-effort. Anything that reaches a log line or an error
/// context from a user request goes through [`scrub`] first.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap()
});

static GSTIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    // 15 chars: state code, PAN, entity number, 'Z', checksum
    Regex::new(r"(?i)\b\d{2}[A-Z]{5}\d{4}[A-Z][0-9A-Z]Z[0-9A-Z]\b").unwrap()
});

static PAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[A-Z]{5}\d{4}[A-Z]\b").unwrap()
});

static CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap()
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Indian mobiles, optionally prefixed with +91
    Regex::new(r"(?:\+91[-. ]?)?\b[6-9]\d{4}[-. ]?\d{5}\b").unwrap()
});

pub fn scrub(input: &str) -> String {
    let mut scrubbed = EMAIL_REGEX.replace_all(input, "[EMAIL]").to_string();

    // GSTIN embeds a PAN, so it has to go first.
    scrubbed = GSTIN_REGEX.replace_all(&scrubbed, "[GSTIN]").to_string();
    scrubbed = PAN_REGEX.replace_all(&scrubbed, "[PAN]").to_string();
    scrubbed = CARD_REGEX.replace_all(&scrubbed, "[CARD]").to_string();
    scrubbed = PHONE_REGEX.replace_all(&scrubbed, "[PHONE]").to_string();

    scrubbed
}

/// Scrub and cut to at most `max_chars` characters, marking the cut with `...`.
pub fn scrub_truncated(input: &str, max_chars: usize) -> String {
    let scrubbed = scrub(input);
    if scrubbed.chars().count() <= max_chars {
        return scrubbed;
    }
    let mut out: String = scrubbed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

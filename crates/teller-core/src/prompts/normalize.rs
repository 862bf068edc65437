//! Text normalization and prefix fingerprinting
//!
//! Prefix caching on the inference server matches on exact tokens, so every
//! byte that reaches the static zone goes through [`normalize`] first.

use sha2::{Digest, Sha256};

/// Separates the shared static zone from the agent-specific dynamic zone
pub const STATIC_ZONE_DELIMITER: &str = "<<< END OF MANUAL >>>";

/// Separates consecutive turns in rendered history
pub const TURN_BOUNDARY: &str = "\n<<< TURN >>>\n";

/// Rendered in place of an empty history
pub const EMPTY_HISTORY: &str = "(No previous conversation)";

/// Hex characters kept from the SHA-256 digest of a static zone
pub const PREFIX_HASH_LEN: usize = 16;

const BOM: char = '\u{feff}';

/// Canonical form of a text fragment.
///
/// Strips a leading BOM, converts CRLF and lone CR to LF, removes trailing
/// whitespace from every line and drops trailing blank lines. The result never
/// ends with a newline. Idempotent.
pub fn normalize(text: &str) -> String {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<&str> = unified.split('\n').map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// First 16 hex characters of the SHA-256 digest of `static_zone`
pub fn prefix_hash(static_zone: &str) -> String {
    let digest = Sha256::digest(static_zone.as_bytes());
    let mut hex = String::with_capacity(PREFIX_HASH_LEN);
    for byte in digest.iter().take(PREFIX_HASH_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Rough token count used for diagnostics only (4 characters per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

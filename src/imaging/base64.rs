//! Base64 encoding and decoding utilities

use base64::{engine::general_purpose::STANDARD, DecodeError, Engine};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a base64 payload, accepting data URLs and line-wrapped input
pub fn decode(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let data = strip_data_url(encoded);

    if data.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(data)
    }
}

/// Drop a `data:image/...;base64,` prefix if present
fn strip_data_url(encoded: &str) -> &str {
    // ',' is not part of the base64 alphabet
    match encoded.rsplit_once(',') {
        Some((_, data)) => data,
        None => encoded,
    }
}

/// Get the image format from base64 data URL prefix
pub fn get_format_from_data_url(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:image/")?;
    let end = rest.find(';')?;
    Some(&rest[..end])
}

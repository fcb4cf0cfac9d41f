//! Escaped module path segments as stored in the Go module cache.
//!
//! The download cache cannot rely on case-sensitive file systems, so every
//! uppercase letter in a module path or version is stored as `!` followed by
//! the lowercase letter. Both directions here are pure string transforms.

/// Marker that introduces an escaped uppercase letter.
pub const ESCAPE_MARKER: char = '!';

/// Decode an escaped cache segment back into a module path or version.
///
/// A marker followed by a lowercase ASCII letter becomes that letter in
/// uppercase. A marker followed by anything else, or at the end of the
/// segment, is kept verbatim.
///
/// # Examples
///
/// ```
/// use gomodpack::module_path::decode;
///
/// assert_eq!(decode("github.com/!burnt!sushi/toml"), "github.com/BurntSushi/toml");
/// assert_eq!(decode("odd!1"), "odd!1");
/// ```
#[must_use]
pub fn decode(segment: &str) -> String {
    let mut decoded = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE_MARKER {
            if let Some(next) = chars.next_if(char::is_ascii_lowercase) {
                decoded.push(next.to_ascii_uppercase());
                continue;
            }
        }
        decoded.push(c);
    }
    decoded
}

/// Encode a module path or version into its cache segment form.
///
/// # Examples
///
/// ```
/// use gomodpack::module_path::encode;
///
/// assert_eq!(encode("github.com/Azure/azure-sdk"), "github.com/!azure/azure-sdk");
/// ```
#[must_use]
pub fn encode(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            encoded.push(ESCAPE_MARKER);
            encoded.push(c.to_ascii_lowercase());
        } else {
            encoded.push(c);
        }
    }
    encoded
}

//! Common utility functions

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a new UUID v4
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a slug from a string
///
/// ```
/// use shipyard_core::generate_slug;
///
/// assert_eq!(generate_slug("My Cool App"), "my-cool-app");
/// assert_eq!(generate_slug("  --API v2!! "), "api-v2");
/// ```
pub fn generate_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    // 63 = DNS label max length
    let limited: String = slug.trim_matches('-').chars().take(63).collect();
    limited.trim_end_matches('-').to_string()
}

/// Mask sensitive data for logging
pub fn mask_sensitive(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

/// Random alphanumeric token with a readable prefix, e.g. `sk_9fQ...`
pub fn generate_token(prefix: &str, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let random_part: String = (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect();
    format!("{}{}", prefix, random_part)
}

/// Random lowercase hex string of `bytes * 2` characters
pub fn generate_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(buf.as_mut_slice());
    hex::encode(buf)
}

/// Hex encoded SHA-256 digest
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Canonical form of an email address used for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical form of a hostname: lowercased, trimmed, no trailing dot
pub fn normalize_hostname(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_lowercase()
}

/// Loose RFC 1123 hostname check: at least two labels, each 1-63 chars of
/// `[a-z0-9-]` that neither starts nor ends with `-`. A leading `*.` wildcard
/// label is accepted.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    let name = hostname.strip_prefix("*.").unwrap_or(hostname);
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

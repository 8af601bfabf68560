//! Common type definitions.
//!
//! All entity IDs are SQLite `INTEGER PRIMARY KEY` values wrapped in type aliases so that
//! signatures say which table an id belongs to.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;

pub type AdminUserId = i64;
pub type LeadId = i64;
pub type AppointmentId = i64;
pub type ReminderId = i64;
pub type InvoiceId = i64;
pub type NotificationId = i64;

/// Generate a URL-safe random token (32 bytes of entropy, base64url without padding).
///
/// Used for lead access tokens, preference tokens and public invoice links.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Shorten a token for logs: "abcdefgh…"
pub fn abbrev_token(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) => format!("{}…", &token[..idx]),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_abbrev_token() {
        assert_eq!(abbrev_token("abcdefghijkl"), "abcdefgh…");
        assert_eq!(abbrev_token("short"), "short");
    }
}

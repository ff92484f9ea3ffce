//! # hydrolink-auth
//!
//! Bearer-credential verification for dashboard connections.
//!
//! Dashboards authenticate with an HS256 JWT issued by the account backend;
//! the broker only verifies. The `uuid` claim is the subject (the owning
//! user's uuid), matching what the account service puts in its tokens.
//! Token **issuance** is out of scope here.
//!
//! Also provides [`generate_device_token`], the 32-byte hex credential
//! assigned to devices at registration time.

#![deny(unsafe_code)]

pub mod verifier;

pub use verifier::{Claims, JwtVerifier};

/// Generate a fresh device credential: 32 random bytes, hex-encoded.
#[must_use]
pub fn generate_device_token() -> String {
    let bytes: [u8; 32] = rand::random();
    let mut out = String::with_capacity(64);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_token_is_64_hex_chars() {
        let token = generate_device_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn device_tokens_are_unique() {
        assert_ne!(generate_device_token(), generate_device_token());
    }
}

//! # Proof Key for Code Exchange (PKCE)
//!
//! Code verifier and `S256` challenge generation per RFC 7636, used by
//! the authorization-code grant to bind the code to this wallet.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a random code verifier: 32 random bytes, base64url encoded
/// (43 characters, unreserved alphabet only).
#[must_use]
pub fn code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// The `S256` code challenge for a verifier.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes()))
}

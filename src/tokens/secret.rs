//! Raw token generation and the digest used as the stored identifier.
//!
//! The digest algorithm is part of the persisted format: every stored id is
//! `hex(sha256(raw_token_hex_text))`. Changing it orphans all issued tokens.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Bytes of entropy per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded raw token.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// Source of token entropy. Production uses the OS CSPRNG.
pub trait SecretSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

pub struct OsSecretSource;

impl SecretSource for OsSecretSource {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Draw a fresh raw token from `source`.
pub fn generate_raw_token(source: &dyn SecretSource) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    source.fill(&mut bytes);
    let raw = hex::encode(bytes);
    bytes.zeroize();
    raw
}

/// Stored identifier for a raw token.
pub fn digest_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `s` could be a token we issued. Lets verification reject junk
/// without a store round trip.
pub fn looks_like_token(s: &str) -> bool {
    s.len() == TOKEN_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

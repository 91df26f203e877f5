//! HMAC-SHA256 signatures for partial-result records.
//!
//! Signatures guard against tampered resumes: the HMAC is computed over the
//! partial document minus its own `signature` field. The key comes from the
//! `CONCLAVE_SECRET` environment variable, falling back to a documented
//! default when absent. Verification is constant-time.

use conclave_application::Signer;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Environment variable holding the signing key.
pub const SECRET_ENV: &str = "CONCLAVE_SECRET";

/// Key used when `CONCLAVE_SECRET` is not set. Signatures under this key
/// detect accidental corruption, not malice.
pub const DEFAULT_SECRET: &str = "conclave-default-signing-key";

const BLOCK_SIZE: usize = 64;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // Keys longer than the block size are hashed first
    let mut block_key = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha256::digest(key);
        block_key[..digest.len()].copy_from_slice(&digest);
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    inner.update(block_key.map(|b| b ^ IPAD));
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block_key.map(|b| b ^ OPAD));
    outer.update(inner_digest);
    outer.finalize().into()
}

/// HMAC-SHA256 signer keyed from the environment.
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Key from `CONCLAVE_SECRET`, or the documented default.
    pub fn from_env() -> Self {
        let key = std::env::var(SECRET_ENV).unwrap_or_else(|_| DEFAULT_SECRET.to_string());
        Self::new(key.into_bytes())
    }
}

impl Signer for HmacSigner {
    fn sign(&self, bytes: &[u8]) -> String {
        hex::encode(hmac_sha256(&self.key, bytes))
    }

    fn verify(&self, bytes: &[u8], signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let expected = hmac_sha256(&self.key, bytes);
        provided.ct_eq(&expected).into()
    }
}

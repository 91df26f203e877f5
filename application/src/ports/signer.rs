//! Signature port for partial-result integrity.

/// Signs and verifies partial-result documents.
///
/// The production implementation is HMAC-SHA256 keyed from
/// `CONCLAVE_SECRET`; the port keeps the application layer free of
/// crypto dependencies.
pub trait Signer: Send + Sync {
    /// Hex signature over the given bytes.
    fn sign(&self, bytes: &[u8]) -> String;

    /// Constant-time check of a hex signature.
    fn verify(&self, bytes: &[u8], signature: &str) -> bool;
}

/// Signer whose signature is a fixed marker. Tests only.
pub struct NullSigner;

impl Signer for NullSigner {
    fn sign(&self, _bytes: &[u8]) -> String {
        "unsigned".to_string()
    }

    fn verify(&self, _bytes: &[u8], signature: &str) -> bool {
        signature == "unsigned"
    }
}

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// One-way digest for passwords, reset secrets and security answers.
///
/// The digest must be deterministic: reset-by-secret-digest compares the
/// caller's digest against the stored one for equality. The salting strategy,
/// if any, belongs to the implementation.
pub trait SecretDigester: Send + Sync {
    fn digest(&self, plaintext: &str) -> String;
}

/// Default digester: SHA-256, hex-encoded.
#[derive(Debug, Clone, Default)]
pub struct Sha256Digester;

impl SecretDigester for Sha256Digester {
    fn digest(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Compare two digests in constant time.
pub fn digests_match(left: &str, right: &str) -> bool {
    left.as_bytes().ct_eq(right.as_bytes()).into()
}

/// Generate a random recovery secret (hex, 256 bits).
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let secret_bytes: [u8; 32] = rng.gen();
    hex::encode(secret_bytes)
}

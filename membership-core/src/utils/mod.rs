pub mod password;

pub use password::{digests_match, generate_secret, SecretDigester, Sha256Digester};

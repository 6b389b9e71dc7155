use crate::base62;
use crate::shortcode::ShortCode;
use sha2::{Digest, Sha256};

/// Trait for deriving a candidate short code from a long URL.
///
/// Implementations are pure functions that don't interact with storage:
/// the same URL must always produce the same candidate. Uniqueness is the
/// collision resolver's job, not the encoder's.
pub trait Encoder: Send + Sync + 'static {
    fn encode(&self, long_url: &str) -> ShortCode;
}

/// Encodes the first 64 bits of the URL's SHA-256 digest in base62.
///
/// The digest prefix is read big-endian. A zero prefix encodes to `"0"`,
/// so the candidate is never empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestEncoder;

impl DigestEncoder {
    pub fn new() -> Self {
        Self
    }

    fn digest_prefix(long_url: &str) -> u64 {
        let digest = Sha256::digest(long_url.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

impl Encoder for DigestEncoder {
    fn encode(&self, long_url: &str) -> ShortCode {
        ShortCode::new_unchecked(base62::encode_u64(Self::digest_prefix(long_url)))
    }
}

impl<F> Encoder for F
where
    F: Fn(&str) -> ShortCode + Send + Sync + 'static,
{
    fn encode(&self, long_url: &str) -> ShortCode {
        self(long_url)
    }
}

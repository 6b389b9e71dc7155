use crate::error::Result;
use crate::resolver::SuffixChain;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of [`MappingBackend::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The long URL already had a live code; nothing was written.
    Reused(ShortCode),
    /// A new mapping was written under this code.
    Created(ShortCode),
    /// Every code in the suffix chain was taken.
    Exhausted { candidate: String, max_suffix: usize },
}

impl Claim {
    pub fn code(&self) -> Option<&ShortCode> {
        match self {
            Claim::Reused(code) | Claim::Created(code) => Some(code),
            Claim::Exhausted { .. } => None,
        }
    }
}

/// Bidirectional storage for code <-> long URL mappings.
///
/// The forward index maps a code to its long URL, the reverse index maps a
/// long URL to its code. Absent keys are `Ok(None)`/`Ok(false)`; errors are
/// reserved for a backend that could not answer.
#[async_trait]
pub trait MappingBackend: Send + Sync + 'static {
    /// Looks up the long URL stored under `code` (forward index).
    async fn get_by_code(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Looks up the live code for `long_url` (reverse index).
    async fn get_by_url(&self, long_url: &str) -> Result<Option<ShortCode>>;

    /// Checks whether `code` is mapped in the forward index.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Writes both directions of a mapping, expiring after `ttl` if given.
    async fn put(&self, code: &ShortCode, long_url: &str, ttl: Option<Duration>) -> Result<()>;

    /// The expiry applied to mappings created through this backend.
    fn mapping_ttl(&self) -> Option<Duration> {
        None
    }

    /// Reuses the live code for `long_url`, or writes `long_url` under the
    /// first free code of `chain`.
    ///
    /// The default implementation composes the other operations one call at
    /// a time. Two concurrent claims for the same new URL can both miss the
    /// reverse index and create two codes; implementations that can make the
    /// sequence atomic should override this.
    async fn claim(
        &self,
        long_url: &str,
        chain: SuffixChain,
        ttl: Option<Duration>,
    ) -> Result<Claim> {
        if let Some(code) = self.get_by_url(long_url).await? {
            return Ok(Claim::Reused(code));
        }

        let candidate = chain.peek().map(ToString::to_string).unwrap_or_default();
        let max_suffix = chain.max_suffix();
        for code in chain {
            if !self.exists(&code).await? {
                self.put(&code, long_url, ttl).await?;
                return Ok(Claim::Created(code));
            }
        }

        Ok(Claim::Exhausted {
            candidate,
            max_suffix,
        })
    }
}

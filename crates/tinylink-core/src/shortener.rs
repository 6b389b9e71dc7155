use crate::error::StoreError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, StoreError>;

/// The operations a transport layer (HTTP handlers, CLI) needs from a
/// short-link store.
#[async_trait]
pub trait UrlShortener: Send + Sync + 'static {
    /// Returns the code for `long_url`, creating the mapping on first use.
    ///
    /// Calling this again for the same URL while its mapping is live returns
    /// the same code.
    async fn generate_short_url(&self, long_url: &str) -> Result<ShortCode>;

    /// Resolves a code to its long URL.
    /// Returns `None` if the code does not exist or has expired.
    async fn get_long_url(&self, code: &str) -> Result<Option<String>>;
}

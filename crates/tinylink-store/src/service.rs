use async_trait::async_trait;
use std::sync::Arc;
use tinylink_core::{
    Claim, CollisionResolver, DigestEncoder, Encoder, MappingBackend, ShortCode, StoreError,
    UrlShortener,
};
use tracing::{debug, info, trace, warn};

/// The short-link store.
///
/// This service wraps a [`MappingBackend`] and an [`Encoder`] to handle:
/// - reuse of the live code for a URL that was shortened before
/// - candidate code derivation
/// - collision resolution against the backend's forward index
///
/// The check, resolve and write steps for a new URL run inside
/// [`MappingBackend::claim`], so their atomicity is whatever the backend
/// provides. Both bundled backends make it atomic.
#[derive(Debug)]
pub struct UrlStore<B, E = DigestEncoder> {
    backend: Arc<B>,
    encoder: Arc<E>,
    resolver: CollisionResolver,
}

impl<B, E> Clone for UrlStore<B, E> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            encoder: Arc::clone(&self.encoder),
            resolver: self.resolver.clone(),
        }
    }
}

impl<B: MappingBackend> UrlStore<B> {
    /// Creates a store that derives codes from the SHA-256 digest of the URL.
    pub fn new(backend: B) -> Self {
        Self::with_encoder(backend, DigestEncoder::new())
    }
}

impl<B: MappingBackend, E: Encoder> UrlStore<B, E> {
    /// Creates a store with a custom encoder.
    pub fn with_encoder(backend: B, encoder: E) -> Self {
        Self {
            backend: Arc::new(backend),
            encoder: Arc::new(encoder),
            resolver: CollisionResolver::default(),
        }
    }

    /// Replaces the collision resolver settings.
    pub fn with_resolver(mut self, resolver: CollisionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn validate_url(url: &str) -> Result<(), StoreError> {
        if url.is_empty() {
            return Err(StoreError::InvalidUrl("URL cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<B: MappingBackend, E: Encoder> UrlShortener for UrlStore<B, E> {
    async fn generate_short_url(&self, long_url: &str) -> Result<ShortCode, StoreError> {
        Self::validate_url(long_url)?;

        if let Some(code) = self.backend.get_by_url(long_url).await? {
            debug!(code = %code, "Reusing live short code");
            return Ok(code);
        }

        let candidate = self.encoder.encode(long_url);
        trace!(candidate = %candidate, "Encoded candidate code");

        let chain = self.resolver.chain(candidate);
        match self
            .backend
            .claim(long_url, chain, self.backend.mapping_ttl())
            .await?
        {
            Claim::Reused(code) => {
                debug!(code = %code, "Short code was created concurrently");
                Ok(code)
            }
            Claim::Created(code) => {
                info!(code = %code, "Created short code");
                Ok(code)
            }
            Claim::Exhausted {
                candidate,
                max_suffix,
            } => {
                warn!(candidate = %candidate, max_suffix, "No free short code");
                Err(StoreError::CollisionExhausted {
                    candidate,
                    max_suffix,
                })
            }
        }
    }

    async fn get_long_url(&self, code: &str) -> Result<Option<String>, StoreError> {
        // A code outside the alphabet can never have been issued.
        let Ok(code) = ShortCode::new(code) else {
            debug!("Rejected malformed short code");
            return Ok(None);
        };

        Ok(self.backend.get_by_code(&code).await?)
    }
}

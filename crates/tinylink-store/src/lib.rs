//! The tinylink short-link store.
//!
//! [`UrlStore`] ties an [`Encoder`](tinylink_core::Encoder), a
//! [`CollisionResolver`](tinylink_core::CollisionResolver) and a
//! [`MappingBackend`](tinylink_core::MappingBackend) together behind the
//! [`UrlShortener`](tinylink_core::UrlShortener) operations.
//!
//! # Example
//!
//! ```rust
//! use tinylink_core::UrlShortener;
//! use tinylink_storage::InMemoryBackend;
//! use tinylink_store::UrlStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UrlStore::new(InMemoryBackend::new());
//!
//! let code = store.generate_short_url("https://example.com/a").await?;
//! assert_eq!(store.generate_short_url("https://example.com/a").await?, code);
//! assert_eq!(
//!     store.get_long_url(code.as_str()).await?,
//!     Some("https://example.com/a".to_string())
//! );
//! # Ok(())
//! # }
//! ```

pub mod service;

pub use service::UrlStore;

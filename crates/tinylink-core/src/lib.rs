//! Core types and traits for the tinylink short-link store.
//!
//! This crate holds everything that does not depend on a concrete storage
//! engine: the short code type, the URL encoder, collision resolution and
//! the backend trait the storage crate implements.

pub mod backend;
pub mod base62;
pub mod encoder;
pub mod error;
pub mod resolver;
pub mod shortcode;
pub mod shortener;

pub use backend::{Claim, MappingBackend};
pub use encoder::{DigestEncoder, Encoder};
pub use error::{CoreError, StorageError, StoreError};
pub use resolver::{CollisionResolver, SuffixChain};
pub use shortcode::ShortCode;
pub use shortener::UrlShortener;

//! Storage backends for the tinylink store.
//!
//! [`InMemoryBackend`] keeps both indexes in process memory and is meant for
//! tests and single-process deployments. [`RedisBackend`] persists mappings
//! in Redis with a time-to-live.

pub mod memory;
pub mod redis;

pub use memory::InMemoryBackend;
pub use self::redis::{RedisBackend, RedisConfig};
pub use tinylink_core::MappingBackend;

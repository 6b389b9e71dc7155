//! Deterministic collision resolution.
//!
//! When a candidate code is already taken, the resolver appends a fixed
//! disambiguation character and tries again: `code`, `codex`, `codexx`, ...
//! Two URLs whose digests collide therefore get codes in the order they were
//! first shortened. Clients can observe this order, so the suffix character
//! and the append-only growth must not change.

use crate::shortcode::ShortCode;
use typed_builder::TypedBuilder;

pub const DEFAULT_SUFFIX: char = 'x';
pub const DEFAULT_MAX_SUFFIX: usize = 64;

/// Settings for walking the suffix chain of a candidate code.
///
/// # Example
///
/// ```rust
/// use tinylink_core::{CollisionResolver, ShortCode};
///
/// let resolver = CollisionResolver::builder().max_suffix(2).build();
/// let chain: Vec<_> = resolver
///     .chain(ShortCode::new_unchecked("abc"))
///     .map(|c| c.to_string())
///     .collect();
/// assert_eq!(chain, ["abc", "abcx", "abcxx"]);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct CollisionResolver {
    /// Character appended on every collision.
    #[builder(default = DEFAULT_SUFFIX)]
    suffix: char,
    /// Longest suffix tried before giving up.
    #[builder(default = DEFAULT_MAX_SUFFIX)]
    max_suffix: usize,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CollisionResolver {
    pub fn suffix(&self) -> char {
        self.suffix
    }

    pub fn max_suffix(&self) -> usize {
        self.max_suffix
    }

    /// Returns the candidates to try for `candidate`, in order.
    pub fn chain(&self, candidate: ShortCode) -> SuffixChain {
        SuffixChain {
            next: Some(candidate),
            suffix: self.suffix,
            remaining: self.max_suffix + 1,
            max_suffix: self.max_suffix,
        }
    }

    /// Returns the first code in the chain for which `exists` is false.
    ///
    /// Returns `None` when every candidate up to `max_suffix` is taken.
    pub fn resolve<F>(&self, candidate: ShortCode, exists: F) -> Option<ShortCode>
    where
        F: FnMut(&ShortCode) -> bool,
    {
        self.chain(candidate).first_free(exists)
    }
}

/// Iterator over `candidate`, `candidate + suffix`, `candidate + suffix + suffix`, ...
///
/// Yields at most `max_suffix + 1` codes.
#[derive(Debug, Clone)]
pub struct SuffixChain {
    next: Option<ShortCode>,
    suffix: char,
    remaining: usize,
    max_suffix: usize,
}

impl SuffixChain {
    /// The next code the chain will yield.
    pub fn peek(&self) -> Option<&ShortCode> {
        self.next.as_ref()
    }

    pub fn max_suffix(&self) -> usize {
        self.max_suffix
    }

    /// Consumes the chain up to the first code for which `exists` is false.
    pub fn first_free<F>(mut self, mut exists: F) -> Option<ShortCode>
    where
        F: FnMut(&ShortCode) -> bool,
    {
        self.find(|code| !exists(code))
    }
}

impl Iterator for SuffixChain {
    type Item = ShortCode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next.take()?;
        if self.remaining > 0 {
            self.next = Some(current.with_suffix(self.suffix));
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.next.is_some() { self.remaining } else { 0 };
        (left, Some(left))
    }
}

impl ExactSizeIterator for SuffixChain {}

use crate::generator::Generator;
use snip_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// A short code generator using a sequential counter.
///
/// This generator produces sequential codes like "sn000000", "sn000001", etc.
/// Codes are unique within a single instance; use a distinct prefix per
/// instance when several share one store.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    /// Creates a new sequential generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new sequential generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}

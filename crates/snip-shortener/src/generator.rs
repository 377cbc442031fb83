pub mod random;
pub mod seq;

use snip_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// A collision with an existing code is reported by storage on insert.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;
    /// Generates a value that can be converted into a short code.
    fn generate(&self) -> Self::Output;
}

use crate::generator::Generator;
use rand::distr::Alphanumeric;
use rand::Rng;
use snip_core::ShortCode;

pub const DEFAULT_LENGTH: usize = 10;

/// Mints random alphanumeric codes.
///
/// With the default length of 10 there are 62^10 possible codes, so a
/// collision is vanishingly unlikely for a single instance.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_LENGTH)
    }

    pub fn with_length(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

//! Random values for nonces and authorization `state`.
//!
//! Both must be unpredictable to anyone observing previous values, so they are drawn from the
//! operating system generator. The output is base64url without padding, which consists only of
//! unreserved characters and survives percent-encoding unchanged.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Error, Result};

/// Generates strings from random bytes.
#[derive(Debug)]
pub struct RandomGenerator {
    random: SystemRandom,
    len: usize,
}

impl RandomGenerator {
    /// Generates strings from the given number of random bytes.
    pub fn new(length: usize) -> RandomGenerator {
        RandomGenerator {
            random: SystemRandom::new(),
            len: length,
        }
    }

    /// Draw a fresh value.
    pub fn generate(&self) -> Result<String> {
        let mut result = vec![0; self.len];
        self.random
            .fill(result.as_mut_slice())
            .map_err(|_| Error::Environment("secure random generator"))?;
        Ok(URL_SAFE_NO_PAD.encode(&result))
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        RandomGenerator::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_unreserved_and_distinct() {
        let generator = RandomGenerator::default();
        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 22);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}

//! Admin key generation
//!
//! The admin key is the shared secret the supervisor passes to the child at
//! launch and presents again on the shutdown request. It lives only in memory.

use rand::Rng;
use rand::rngs::OsRng;
use std::fmt;

/// Symbols an admin key is drawn from: `A-Z`, `a-z`, `0-9`.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Draw `length` symbols uniformly from [`ALPHABET`] using `rng`.
///
/// `gen_range` samples without modulo bias, so every symbol is equally likely.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Per-launch shutdown credential.
///
/// `Debug` is redacted and there is no `Display`; read the value with
/// [`AdminKey::expose`] only where it must leave the process.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminKey(String);

impl AdminKey {
    /// Fresh key of `length` symbols from the OS CSPRNG.
    #[must_use]
    pub fn generate(length: usize) -> Self {
        Self(generate(&mut OsRng, length))
    }

    /// Fresh key from a caller-supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Self {
        Self(generate(rng, length))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminKey(<redacted, {} chars>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn in_alphabet(key: &str) -> bool {
        key.bytes().all(|b| ALPHABET.contains(&b))
    }

    #[test]
    fn test_alphabet_is_62_distinct_symbols() {
        let distinct: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(distinct.len(), 62);
        assert!(ALPHABET.iter().all(u8::is_ascii_alphanumeric));
    }

    #[test]
    fn test_ten_thousand_keys_have_expected_shape() {
        let mut previous = String::new();
        for _ in 0..10_000 {
            let key = generate(&mut OsRng, 10);
            assert_eq!(key.len(), 10);
            assert!(in_alphabet(&key), "unexpected symbol in {key}");
            assert_ne!(key, previous);
            previous = key;
        }
    }

    #[test]
    fn test_seeded_source_is_deterministic() {
        let a = generate(&mut StdRng::seed_from_u64(7), 16);
        let b = generate(&mut StdRng::seed_from_u64(7), 16);
        let c = generate(&mut StdRng::seed_from_u64(8), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_every_symbol_is_reachable() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<char> = generate(&mut rng, 20_000).chars().collect();
        assert_eq!(seen.len(), 62);
    }

    #[test]
    fn test_zero_length() {
        assert_eq!(generate(&mut OsRng, 0), "");
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = AdminKey::generate(10);
        let debug = format!("{key:?}");
        assert!(!debug.contains(key.expose()));
        assert!(debug.contains("10 chars"));
    }

    proptest! {
        #[test]
        fn prop_key_matches_length_and_alphabet(seed in any::<u64>(), length in 0usize..256) {
            let key = generate(&mut StdRng::seed_from_u64(seed), length);
            prop_assert_eq!(key.len(), length);
            prop_assert!(in_alphabet(&key));
        }
    }
}

/// Maps a request key to its cache identity.
///
/// Two keys share a resource exactly when their normalized forms are equal,
/// so the normalizer is part of the cache's contract and must be total.
pub trait KeyNormalizer<K>: Send + Sync {
    fn normalize(&self, key: K) -> K;
}

/// Lowercases string keys: `"Pikachu"` and `"pikachu"` are one entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl KeyNormalizer<String> for CaseInsensitive {
    fn normalize(&self, key: String) -> String {
        key.to_lowercase()
    }
}

/// Uses the key as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKey;

impl<K> KeyNormalizer<K> for ExactKey {
    fn normalize(&self, key: K) -> K {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        assert_eq!(CaseInsensitive.normalize("Pikachu".to_string()), "pikachu");
        assert_eq!(CaseInsensitive.normalize("MEW".to_string()), "mew");
        assert_eq!(CaseInsensitive.normalize(String::new()), "");
        assert_eq!(CaseInsensitive.normalize("Ärger".to_string()), "ärger");
    }

    #[test]
    fn test_exact_key() {
        assert_eq!(ExactKey.normalize("Pikachu".to_string()), "Pikachu");
        assert_eq!(ExactKey.normalize(42_u32), 42);
    }
}

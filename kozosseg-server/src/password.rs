use anyhow::{anyhow, Result};
use bcrypt::{hash, verify, DEFAULT_COST};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt hashing with a configurable cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        hash(password, self.cost).map_err(|e| anyhow!("Password hashing failed: {}", e))
    }

    /// Malformed stored hashes count as a mismatch
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        verify(password, password_hash).unwrap_or(false)
    }

    /// Hash on a blocking thread (bcrypt is CPU-bound)
    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::with_cost(4);
        let hashed = hasher.hash("Jelszo123").unwrap();
        assert_ne!(hashed, "Jelszo123");
        assert!(hasher.verify("Jelszo123", &hashed));
        assert!(!hasher.verify("jelszo123", &hashed));
    }

    #[test]
    fn test_invalid_hash_never_verifies() {
        let hasher = PasswordHasher::with_cost(4);
        assert!(!hasher.verify("anything", "!"));
    }

    #[tokio::test]
    async fn test_hash_blocking() {
        let hasher = PasswordHasher::with_cost(4);
        let hashed = hasher.hash_blocking("titkos-jelszo".to_string()).await.unwrap();
        assert!(hasher.verify("titkos-jelszo", &hashed));
    }
}

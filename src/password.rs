use argon2::{Config, Variant};
use rand::RngCore;

use crate::{error::AuthError, types::HashedPassword};

const SALT_LEN: usize = 16;

/// Salted, adaptive password hashing backed by Argon2id.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PASSWORD_HASH_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost: cost.max(1) }
    }

    pub fn hash(&self, password: &str) -> Result<HashedPassword, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let config = Config {
            variant: Variant::Argon2id,
            time_cost: self.cost,
            ..Config::default()
        };

        let encoded = argon2::hash_encoded(password.as_bytes(), &salt, &config)?;
        Ok(HashedPassword(encoded))
    }

    /// A malformed hash verifies as false rather than erroring.
    pub fn verify(&self, password: &str, hash: &HashedPassword) -> bool {
        argon2::verify_encoded(&hash.0, password.as_bytes()).unwrap_or(false)
    }

    /// [`hash`](Self::hash) on the blocking pool, keeping async workers free.
    pub async fn hash_blocking(&self, password: String) -> Result<HashedPassword, AuthError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// [`verify`](Self::verify) on the blocking pool, keeping async workers free.
    pub async fn verify_blocking(
        &self,
        password: String,
        hash: HashedPassword,
    ) -> Result<bool, AuthError> {
        let hasher = *self;
        let matched = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("correct horse ", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::new(1);
        let first = hasher.hash("swordfish").unwrap();
        let second = hasher.hash("swordfish").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("swordfish", &first));
        assert!(hasher.verify("swordfish", &second));
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash_blocking("tonic".into()).await.unwrap();

        assert!(hasher.verify_blocking("tonic".into(), hash.clone()).await.unwrap());
        assert!(!hasher.verify_blocking("gin".into(), hash).await.unwrap());
    }

    #[test]
    fn malformed_hash_is_rejected_without_error() {
        let hasher = PasswordHasher::default();
        assert!(!hasher.verify("anything", &HashedPassword("not-a-hash".into())));
        assert!(!hasher.verify("anything", &HashedPassword::default()));
    }
}

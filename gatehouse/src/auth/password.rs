//! Password hashing with Argon2id and a server-side pepper.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};

use super::errors::{AuthError, AuthResult};

/// One-way credential hasher
#[derive(Clone)]
pub struct CredentialHasher {
    pepper: String,
    params: Params,
}

impl CredentialHasher {
    /// Create a hasher with the given pepper and Argon2 cost.
    ///
    /// # Errors
    ///
    /// * `AuthError::HashingFailed` - Cost parameters rejected by Argon2
    pub fn new(pepper: String, memory_kib: u32, iterations: u32) -> AuthResult<Self> {
        let params =
            Params::new(memory_kib, iterations, 1, None).map_err(|_| AuthError::HashingFailed)?;
        Ok(Self { pepper, params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        self.argon2()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(pepper: &str) -> CredentialHasher {
        CredentialHasher::new(pepper.to_string(), 1024, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher("pepper_for_tests");
        let hash = hasher.hash("SecurePass123").unwrap();

        assert_ne!(hash, "SecurePass123");
        assert!(hasher.verify("SecurePass123", &hash).is_ok());
        assert!(matches!(
            hasher.verify("WrongPass123", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher("pepper_for_tests");
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_pepper_is_part_of_the_hash() {
        let hash = hasher("pepper_one").hash("SecurePass123").unwrap();
        assert!(hasher("pepper_two").verify("SecurePass123", &hash).is_err());
    }

    #[test]
    fn test_garbage_hash_is_rejected() {
        assert!(hasher("p").verify("anything", "not-a-phc-string").is_err());
    }
}

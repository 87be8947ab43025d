//! services/api/src/adapters/credentials.rs
//!
//! Argon2 password hashing and random session tokens, implementing the
//! `CredentialService` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use loan_ledger_core::ports::{CredentialService, PortError, PortResult};
use uuid::Uuid;

#[derive(Default)]
pub struct Argon2Credentials {
    argon2: Argon2<'static>,
}

impl Argon2Credentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialService for Argon2Credentials {
    fn hash_password(&self, raw_password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(raw_password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
    }

    fn verify_password(&self, raw_password: &str, hashed_password: &str) -> PortResult<bool> {
        let parsed_hash = PasswordHash::new(hashed_password)
            .map_err(|e| PortError::Unexpected(format!("Failed to parse password hash: {}", e)))?;
        Ok(self
            .argon2
            .verify_password(raw_password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// 128 random bits, rendered as 32 hex characters.
    fn issue_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_its_own_password() {
        let creds = Argon2Credentials::new();
        let hash = creds.hash_password("correct horse").unwrap();

        assert!(!hash.contains("correct horse"));
        assert!(creds.verify_password("correct horse", &hash).unwrap());
        assert!(!creds.verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let creds = Argon2Credentials::new();
        assert_ne!(
            creds.hash_password("pw").unwrap(),
            creds.hash_password("pw").unwrap()
        );
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        let creds = Argon2Credentials::new();
        assert!(matches!(
            creds.verify_password("pw", "not-a-phc-string"),
            Err(PortError::Unexpected(_))
        ));
    }

    #[test]
    fn tokens_are_32_hex_chars_and_unique() {
        let creds = Argon2Credentials::new();
        let a = creds.issue_token();
        let b = creds.issue_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}

//! Password Re-authorization
//!
//! Sweeps without single sign-on must be re-authorized with the login
//! password. The password never leaves this process in clear text: only its
//! SHA-256 hex digest is handed to an [`AuthorizationBackend`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// Lowercase hex SHA-256 digest of a password
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        Self(hex::encode(digest))
    }

    /// Accept an existing digest, e.g. from the config file
    pub fn from_hex(hex_digest: &str) -> Result<Self, AuthError> {
        let normalized = hex_digest.trim().to_ascii_lowercase();
        let bytes = hex::decode(&normalized)
            .map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(AuthError::InvalidHash(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// Outcome of a password check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized,
    Denied,
}

/// Checks a password hash against the node's login password
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    async fn check_password(&self, hash: &PasswordHash) -> Result<AuthDecision, AuthError>;
}

/// Compares against a hash configured locally
#[derive(Debug, Clone)]
pub struct StaticHashAuthorizer {
    expected: PasswordHash,
}

impl StaticHashAuthorizer {
    pub fn new(expected: PasswordHash) -> Self {
        Self { expected }
    }
}

#[async_trait]
impl AuthorizationBackend for StaticHashAuthorizer {
    async fn check_password(&self, hash: &PasswordHash) -> Result<AuthDecision, AuthError> {
        let matches: bool = self
            .expected
            .as_hex()
            .as_bytes()
            .ct_eq(hash.as_hex().as_bytes())
            .into();
        Ok(if matches {
            AuthDecision::Authorized
        } else {
            AuthDecision::Denied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD_SHA256: &str =
        "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

    #[test]
    fn test_hash_is_sha256_hex() {
        let hash = PasswordHash::from_password("password");
        assert_eq!(hash.as_hex(), PASSWORD_SHA256);
    }

    #[test]
    fn test_from_hex_normalizes_case() {
        let hash = PasswordHash::from_hex(&PASSWORD_SHA256.to_uppercase()).unwrap();
        assert_eq!(hash, PasswordHash::from_password("password"));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(PasswordHash::from_hex("not hex").is_err());
        assert!(PasswordHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let hash = PasswordHash::from_password("password");
        assert!(!format!("{:?}", hash).contains("5e88"));
    }

    #[tokio::test]
    async fn test_static_authorizer() {
        let authorizer = StaticHashAuthorizer::new(PasswordHash::from_password("hunter2"));

        assert_eq!(
            authorizer
                .check_password(&PasswordHash::from_password("hunter2"))
                .await
                .unwrap(),
            AuthDecision::Authorized
        );
        assert_eq!(
            authorizer
                .check_password(&PasswordHash::from_password("hunter3"))
                .await
                .unwrap(),
            AuthDecision::Denied
        );
    }
}

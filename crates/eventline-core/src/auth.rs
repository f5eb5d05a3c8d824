//! Shared-secret check for live requests.

use sha2::{Digest, Sha256};
use std::fmt;

/// The configured listener token, kept only as a digest.
///
/// Comparing fixed-length digests keeps the check independent of where the
/// supplied credential first differs.
#[derive(Clone)]
pub struct AuthToken {
    digest: [u8; 32],
}

impl AuthToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        }
    }

    /// True iff `credential` is present and equal to the configured token.
    pub fn verify(&self, credential: Option<&str>) -> bool {
        let Some(credential) = credential else {
            return false;
        };
        let supplied: [u8; 32] = Sha256::digest(credential.as_bytes()).into();
        supplied
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_exact_token() {
        let token = AuthToken::new("secret");
        assert!(token.verify(Some("secret")));
        assert!(!token.verify(Some("wrong")));
        assert!(!token.verify(Some("secret ")));
        assert!(!token.verify(Some("")));
        assert!(!token.verify(None));
    }

    #[test]
    fn debug_does_not_leak() {
        assert_eq!(format!("{:?}", AuthToken::new("secret")), "AuthToken([REDACTED])");
    }
}

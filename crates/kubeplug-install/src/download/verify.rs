//! SHA-256 verification of fetched bytes.

use sha2::{Digest, Sha256};

use crate::error::InstallError;

/// Compares archive bytes against an expected hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Verifier {
    expected: String,
}

impl Sha256Verifier {
    /// Creates a verifier for the given hex digest. Case is ignored.
    #[must_use]
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Lowercase hex SHA-256 of `bytes`.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Checks `bytes` against the expected digest.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ChecksumMismatch`] when the digests differ.
    pub fn verify(&self, bytes: &[u8], source_locator: &str) -> Result<(), InstallError> {
        let actual = Self::digest(bytes);
        if actual.eq_ignore_ascii_case(self.expected.trim()) {
            Ok(())
        } else {
            Err(InstallError::ChecksumMismatch {
                source_locator: source_locator.to_owned(),
                expected: self.expected.clone(),
                actual,
            })
        }
    }
}

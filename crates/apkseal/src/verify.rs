//! Verifier seam.
//!
//! Used exactly once, at registration, to decide whether the archive is
//! already signed the way the configuration asks for. A positive answer lets
//! an unchanged, previously-signed archive pass through a build session
//! byte-identical instead of being re-signed.

use crate::container::ZipContainer;
use crate::Result;

/// Outcome of verifying an archive's existing signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Whether the archive's signatures verified at all.
    pub verified: bool,
    /// Whether a v1 (JAR) signature verified.
    pub v1_verified: bool,
    /// Whether a v2 (signing block) signature verified.
    pub v2_verified: bool,
    /// DER encodings of the verified signers' certificates.
    pub signer_certificates: Vec<Vec<u8>>,
}

impl VerificationReport {
    /// A report for an archive with no valid signature.
    pub fn unverified() -> Self {
        Self {
            verified: false,
            v1_verified: false,
            v2_verified: false,
            signer_certificates: Vec::new(),
        }
    }
}

/// Verifies the existing signatures of an archive.
pub trait SignatureVerifier {
    /// Verify the archive's current bytes against the given minimum
    /// platform version.
    ///
    /// # Errors
    ///
    /// Implementations report malformed archives or verification machinery
    /// failures as errors; the caller treats those as "not correctly
    /// signed". Raw container I/O errors must surface as
    /// [`Error::Io`](crate::Error::Io) so the caller can tell an unreadable
    /// archive apart from an unsigned one.
    fn verify(
        &self,
        zip: &dyn ZipContainer,
        min_platform_version: u32,
    ) -> Result<VerificationReport>;
}

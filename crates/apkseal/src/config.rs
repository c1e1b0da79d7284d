//! Signing configuration.
//!
//! Provides a builder pattern interface for assembling the immutable
//! parameters of a signing pass: the minimum platform version the package
//! targets, which signature schemes are enabled, and the certificate chain
//! to embed.
//!
//! Private key material is deliberately absent here; keys live inside the
//! [`SignerEngine`](crate::SignerEngine) implementation, which is constructed
//! before the signing pass and fails on its own if the key is unusable.

use crate::{Error, Result};
use x509_certificate::X509Certificate;

/// Immutable configuration of a signing pass.
///
/// Fixed at construction time; the coordinator never mutates it. The first
/// certificate in the list identifies the signer, the rest are the chain
/// embedded alongside it.
///
/// # Example
///
/// ```ignore
/// use apkseal::SigningConfig;
///
/// let config = SigningConfig::builder()
///     .min_platform_version(18)
///     .v1_signing(true)
///     .v2_signing(true)
///     .certificate(signer_cert)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct SigningConfig {
    min_platform_version: u32,
    v1_signing_enabled: bool,
    v2_signing_enabled: bool,
    certificates: Vec<X509Certificate>,
}

impl SigningConfig {
    /// Creates a builder with both schemes enabled and platform version 1.
    pub fn builder() -> SigningConfigBuilder {
        SigningConfigBuilder::new()
    }

    /// Minimum platform version the signed package is supposed to run on.
    pub fn min_platform_version(&self) -> u32 {
        self.min_platform_version
    }

    /// Whether JAR signing (aka v1 signing) is enabled.
    pub fn v1_signing_enabled(&self) -> bool {
        self.v1_signing_enabled
    }

    /// Whether block signing (aka v2 signing) is enabled.
    pub fn v2_signing_enabled(&self) -> bool {
        self.v2_signing_enabled
    }

    /// Certificates to embed. The first element identifies the signer.
    pub fn certificates(&self) -> &[X509Certificate] {
        &self.certificates
    }

    /// DER encoding of the signer's certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the certificate cannot be
    /// re-encoded.
    pub fn primary_certificate_der(&self) -> Result<Vec<u8>> {
        self.certificates[0]
            .encode_der()
            .map_err(|e| Error::Certificate(format!("Failed to encode signer certificate: {}", e)))
    }
}

/// Builder for [`SigningConfig`].
///
/// Created through [`SigningConfig::builder`].
#[derive(Clone)]
pub struct SigningConfigBuilder {
    min_platform_version: u32,
    v1_signing_enabled: bool,
    v2_signing_enabled: bool,
    certificates: Vec<X509Certificate>,
}

impl SigningConfigBuilder {
    fn new() -> Self {
        Self {
            min_platform_version: 1,
            v1_signing_enabled: true,
            v2_signing_enabled: true,
            certificates: Vec::new(),
        }
    }

    /// Set the minimum platform version the package targets.
    pub fn min_platform_version(mut self, version: u32) -> Self {
        self.min_platform_version = version;
        self
    }

    /// Enable or disable JAR signing (v1).
    pub fn v1_signing(mut self, enabled: bool) -> Self {
        self.v1_signing_enabled = enabled;
        self
    }

    /// Enable or disable block signing (v2).
    pub fn v2_signing(mut self, enabled: bool) -> Self {
        self.v2_signing_enabled = enabled;
        self
    }

    /// Append a certificate. The first one added identifies the signer.
    pub fn certificate(mut self, certificate: X509Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    /// Append several certificates, in order.
    pub fn certificates(
        mut self,
        certificates: impl IntoIterator<Item = X509Certificate>,
    ) -> Self {
        self.certificates.extend(certificates);
        self
    }

    /// Validate the configuration and build it.
    ///
    /// Returns an error if:
    /// - No certificate was provided
    /// - The signer certificate cannot be encoded to DER
    pub fn build(self) -> Result<SigningConfig> {
        if self.certificates.is_empty() {
            return Err(Error::Config(
                "At least one certificate must be configured".into(),
            ));
        }

        let config = SigningConfig {
            min_platform_version: self.min_platform_version,
            v1_signing_enabled: self.v1_signing_enabled,
            v2_signing_enabled: self.v2_signing_enabled,
            certificates: self.certificates,
        };

        // Surface unusable certificate material now rather than at close.
        config.primary_certificate_der()?;

        Ok(config)
    }
}

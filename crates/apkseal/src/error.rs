//! Error types for signing-pass operations.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases
//! across configuration, container access, verification and engine-driven
//! signing work.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for signing-pass operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses
/// this error type. Match on variants to handle specific failure cases.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading entry contents or writing spliced output through
    /// the container.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid builder configuration.
    ///
    /// A configuration value is invalid or a required value is missing.
    /// See [`crate::SigningConfigBuilder::build`].
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or malformed certificate.
    ///
    /// The configured signing certificate could not be decoded or re-encoded
    /// to its DER form.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// A signing computation failed inside the engine.
    ///
    /// Engine implementations report their own cryptographic or encoding
    /// failures through this variant.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// An engine request failed while driving the signing pass.
    ///
    /// Wraps the underlying engine error with a description of the request
    /// that triggered it. Never retried; retrying without a state change
    /// would reproduce the same failure.
    #[error("{context}: {source}")]
    Engine {
        /// What the coordinator was asking the engine for.
        context: String,
        /// The engine's own failure.
        #[source]
        source: Box<Error>,
    },

    /// A container operation failed.
    ///
    /// Reported by [`crate::ZipContainer`] implementations for failures that
    /// are not plain I/O, such as an unknown entry name.
    #[error("Container error: {0}")]
    Container(String),

    /// Signature verification could not be completed.
    ///
    /// Reported by [`crate::SignatureVerifier`] implementations. Only ever
    /// observed during the registration-time idempotence check, where it is
    /// treated as "not correctly signed" rather than surfaced.
    #[error("Verification error: {0}")]
    Verification(String),

    /// The engine violated the signing protocol.
    ///
    /// For example, returning more than one manifest entry in a single
    /// signature-entry batch.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Wraps an engine failure with a description of the triggering request.
    pub(crate) fn engine(context: impl Into<String>, source: Error) -> Self {
        Error::Engine {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

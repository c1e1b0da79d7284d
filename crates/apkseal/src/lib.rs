pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod extension;
pub mod verify;

pub use config::{SigningConfig, SigningConfigBuilder};
pub use container::{ContainerExtension, ZipContainer, ZipEntry};
pub use engine::{SignatureEntry, SignerEngine, ZipSections};
pub use error::Error;
pub use extension::{SigningExtension, MANIFEST_NAME};
pub use verify::{SignatureVerifier, VerificationReport};

pub type Result<T> = std::result::Result<T, Error>;

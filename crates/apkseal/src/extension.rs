//! Signing coordinator.
//!
//! [`SigningExtension`] rides on a container engine's event feed and keeps an
//! external [`SignerEngine`]'s view of the archive synchronized with the
//! archive itself, across incremental build sessions. At finalize time it
//! embeds the engine's signature entries; once entries are on disk it splices
//! the engine's signing block between entry data and the central directory.
//!
//! The build pipeline does not reuse engine or extension instances across
//! incremental builds, which drives the two less obvious pieces here:
//!
//! * The extension receives no add events for entries already in the archive
//!   when the session opens, so [`before_finalize`] reconciles the engine's
//!   believed entry set against the archive's true entry set before asking
//!   for signatures.
//! * The pipeline expects the archive not to change when no entry changed,
//!   so [`register`] checks whether the archive is already signed exactly as
//!   configured and, if so, starts clean; the whole pass is then skipped
//!   unless an entry is added or removed afterwards.
//!
//! [`before_finalize`]: ContainerExtension::before_finalize
//! [`register`]: SigningExtension::register

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::SigningConfig;
use crate::container::{ContainerExtension, ZipContainer, ZipEntry};
use crate::engine::{SignatureEntry, SignerEngine, ZipSections};
use crate::verify::SignatureVerifier;
use crate::{Error, Result};

/// Name of the JAR manifest entry.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Container extension that signs the archive.
///
/// Construct with [`SigningExtension::new`], attach with
/// [`SigningExtension::register`], then hand it to the container engine as a
/// [`ContainerExtension`]. One instance serves exactly one container for one
/// open session and is discarded after the container closes.
pub struct SigningExtension<E, V> {
    /// Fixed signing parameters for this pass.
    config: SigningConfig,

    /// Signature producer. Exclusively owned; holds the key material.
    engine: E,

    /// Used once, at registration, for the idempotence check.
    verifier: V,

    /// Names of entries the engine has been told about.
    tracked_names: HashSet<String>,

    /// Contents of the most recently produced signing block.
    ///
    /// Valid only while no entry mutation has occurred since it was
    /// computed; [`set_dirty`](Self::set_dirty) clears it.
    cached_signing_block: Option<Vec<u8>>,

    /// Whether signatures may need to be (re)output before close.
    dirty: bool,

    /// Whether [`register`](Self::register) has run.
    registered: bool,
}

impl<E, V> SigningExtension<E, V>
where
    E: SignerEngine,
    V: SignatureVerifier,
{
    /// Creates a signing extension.
    ///
    /// The engine must already be initialized for the same configuration;
    /// unusable key material fails engine construction, before this point.
    pub fn new(config: SigningConfig, engine: E, verifier: V) -> Self {
        Self {
            config,
            engine,
            verifier,
            tracked_names: HashSet::new(),
            cached_signing_block: None,
            dirty: false,
            registered: false,
        }
    }

    /// Attaches this extension to a container.
    ///
    /// Decides the starting dirty state: if the archive is already signed
    /// exactly as configured, the pass starts clean and performs no work
    /// unless an entry changes during the session.
    ///
    /// The caller must subsequently deliver the container's lifecycle events
    /// to this extension through its [`ContainerExtension`] hooks.
    ///
    /// # Panics
    ///
    /// Panics if called a second time. Registering one extension against two
    /// containers is a programming error, not a runtime condition.
    ///
    /// # Errors
    ///
    /// Fails only if a container read during the idempotence check raises an
    /// I/O error. Everything else the check runs into (malformed archive,
    /// verifier failure, undecodable certificate) just means the pass starts
    /// dirty.
    pub fn register(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        assert!(!self.registered, "register() already invoked");
        self.registered = true;
        self.dirty = !self.signature_is_current(zip)?;
        debug!(dirty = self.dirty, "signing extension registered");
        Ok(())
    }

    /// Whether the archive's signatures already match the configuration.
    ///
    /// Four conditions, all required: the archive verifies; it verifies with
    /// exactly the configured schemes; it has exactly one signer; and that
    /// signer's certificate bytes equal the configured signer certificate's
    /// DER encoding. Verification failures count as "no"; only raw container
    /// I/O errors propagate.
    fn signature_is_current(&self, zip: &dyn ZipContainer) -> Result<bool> {
        let report = match self
            .verifier
            .verify(zip, self.config.min_platform_version())
        {
            Ok(report) => report,
            Err(Error::Io(error)) => return Err(Error::Io(error)),
            Err(error) => {
                // Malformed archive or verifier failure: treat as unsigned.
                warn!(%error, "signature verification inconclusive");
                return Ok(false);
            }
        };

        if !report.verified {
            return Ok(false);
        }

        if report.v1_verified != self.config.v1_signing_enabled()
            || report.v2_verified != self.config.v2_signing_enabled()
        {
            // Signed, but not with exactly the schemes we want.
            return Ok(false);
        }

        if report.signer_certificates.len() != 1 {
            return Ok(false);
        }

        let expected = match self.config.primary_certificate_der() {
            Ok(der) => der,
            Err(_) => return Ok(false),
        };

        Ok(report.signer_certificates[0] == expected)
    }

    /// Marks the output as needing signatures and drops the block cache.
    fn set_dirty(&mut self) {
        self.dirty = true;
        self.cached_signing_block = None;
    }

    /// Tells the engine about an entry that will be in the output.
    fn notify_entry_added(&mut self, zip: &mut dyn ZipContainer, name: &str) -> Result<()> {
        let wants_contents = self.engine.output_entry(name)?;
        self.tracked_names.insert(name.to_string());
        if wants_contents {
            let contents = zip.read_entry(name)?;
            self.engine.inspect_entry(name, &contents)?;
        }
        Ok(())
    }

    /// Tells the engine about an entry that left the output.
    fn notify_entry_removed(&mut self, name: &str) -> Result<()> {
        self.engine.output_entry_removed(name)?;
        self.tracked_names.remove(name);
        Ok(())
    }

    /// Brings the engine's believed entry set in line with the archive.
    ///
    /// Entries carried over unchanged from a prior incremental session never
    /// fire a live add event, and entries can likewise disappear without a
    /// remove event; both are discovered here.
    fn reconcile_entries(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let mut stale: HashSet<String> = self.tracked_names.clone();
        let mut discovered = 0usize;

        for entry in zip.entries() {
            if entry.deleted {
                continue;
            }
            stale.remove(&entry.name);
            if !self.tracked_names.contains(&entry.name) {
                self.notify_entry_added(zip, &entry.name)?;
                discovered += 1;
            }
        }

        for name in &stale {
            self.notify_entry_removed(name)?;
        }

        debug!(discovered, retired = stale.len(), "reconciled entry set");
        Ok(())
    }

    /// Embeds the engine's signature entries, manifest first.
    fn write_signature_entries(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let entries = self
            .engine
            .signature_entries()
            .map_err(|e| Error::engine("Failed to generate signature entries", e))?;

        let Some(mut entries) = entries else {
            return Ok(());
        };

        manifest_first(&mut entries)?;

        debug!(count = entries.len(), "writing signature entries");
        for entry in &entries {
            zip.add_entry(&entry.name, &entry.contents)?;
        }

        self.engine.signature_entries_written()
    }

    /// Splices the signing block between entry data and the central
    /// directory.
    ///
    /// The block lands exactly at the end of entry data, before any existing
    /// boundary padding, and the padding length is then set to the block's
    /// length: padding is always exactly the most recent block's size, or
    /// zero.
    fn splice_signing_block(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let entry_data_len = zip.central_directory_offset() - zip.extra_directory_offset();

        // This event may arrive a second time, after the block is already in
        // place; any entry mutation in between invalidates the cache.
        let (block, fresh_block) = if let Some(cached) = self.cached_signing_block.clone() {
            debug!(len = cached.len(), "reusing cached signing block");
            (cached, false)
        } else {
            let entry_data = zip.read_range(0, entry_data_len)?;
            let central_directory = zip.central_directory_bytes()?;
            let eocd = zip.eocd_bytes()?;
            let produced = self
                .engine
                .signing_block(ZipSections {
                    entry_data: &entry_data,
                    central_directory: &central_directory,
                    eocd: &eocd,
                })
                .map_err(|e| Error::engine("Failed to generate signing block", e))?;

            // An absent block is a valid outcome: no block-based scheme is
            // enabled. Cached all the same.
            let fresh = produced.is_some();
            let block = produced.unwrap_or_default();
            debug!(len = block.len(), produced = fresh, "signing block computed");
            self.cached_signing_block = Some(block.clone());
            (block, fresh)
        };

        zip.write_at(entry_data_len, &block)?;
        zip.set_extra_directory_offset(block.len() as u64);

        if fresh_block {
            self.engine.signing_block_written()?;
        }
        Ok(())
    }
}

impl<E, V> ContainerExtension for SigningExtension<E, V>
where
    E: SignerEngine,
    V: SignatureVerifier,
{
    fn entry_added(
        &mut self,
        zip: &mut dyn ZipContainer,
        entry: &ZipEntry,
        _replaced: Option<&ZipEntry>,
    ) -> Result<()> {
        self.set_dirty();
        // The notification can arrive after the entry was already deleted;
        // the engine must never learn about an entry absent from the final
        // output.
        if entry.deleted {
            return Ok(());
        }
        self.notify_entry_added(zip, &entry.name)
    }

    fn entry_removed(&mut self, _zip: &mut dyn ZipContainer, name: &str) -> Result<()> {
        self.set_dirty();
        self.notify_entry_removed(name)
    }

    fn before_finalize(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.reconcile_entries(zip)?;
        self.write_signature_entries(zip)
    }

    fn entries_written(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.splice_signing_block(zip)
    }

    fn closed(&mut self, _zip: &mut dyn ZipContainer) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.engine.output_done()?;
        self.dirty = false;
        Ok(())
    }
}

/// Moves the manifest entry, if present, to the front of the batch.
///
/// A later pipeline stage may independently generate a manifest; writing the
/// engine's manifest first guarantees its authoritative version is the one
/// that survives. More than one entry bearing the manifest name is an engine
/// protocol violation.
fn manifest_first(entries: &mut Vec<SignatureEntry>) -> Result<()> {
    let mut manifest_at = None;
    for (index, entry) in entries.iter().enumerate() {
        if entry.name == MANIFEST_NAME {
            if manifest_at.is_some() {
                return Err(Error::Protocol(format!(
                    "Engine returned more than one {} entry",
                    MANIFEST_NAME
                )));
            }
            manifest_at = Some(index);
        }
    }
    if let Some(index) = manifest_at {
        if index != 0 {
            let manifest = entries.remove(index);
            entries.insert(0, manifest);
        }
    }
    Ok(())
}

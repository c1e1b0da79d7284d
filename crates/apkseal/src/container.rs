//! Container-side seams.
//!
//! The signing pass does not own the archive; it rides on a container engine
//! that stores entries, encodes the ZIP records and performs the raw byte
//! I/O. This module defines the two traits that connect the pass to such an
//! engine: [`ZipContainer`], the operations the pass consumes, and
//! [`ContainerExtension`], the event hooks the container engine drives.
//!
//! The container engine is responsible for delivering each of the five
//! events exactly once per logical occurrence and in causal order: entry
//! adds/removes before [`before_finalize`](ContainerExtension::before_finalize),
//! `before_finalize` before
//! [`entries_written`](ContainerExtension::entries_written), and
//! `entries_written` before [`closed`](ContainerExtension::closed). All
//! dispatch is synchronous and single-threaded; hooks receive the container
//! by `&mut` reference for the duration of the call.

use crate::Result;

/// A snapshot of one archive entry as seen by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Entry name, as stored in the archive (e.g. `classes.dex`).
    pub name: String,

    /// Whether the entry has been marked deleted.
    ///
    /// An add notification can arrive for an entry that is already deleted
    /// when the container coalesces an add with a later remove.
    pub deleted: bool,
}

impl ZipEntry {
    /// Creates a live (non-deleted) entry snapshot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deleted: false,
        }
    }
}

/// Operations the signing pass consumes from the container engine.
///
/// Offsets follow the physical archive layout: entry data starts at offset
/// zero and runs up to the central directory, optionally separated from it
/// by padding (the "extra directory offset"). The central directory offset
/// reported here is the absolute start of the central directory region, so
/// the entry-data region ends at
/// `central_directory_offset() - extra_directory_offset()`.
pub trait ZipContainer {
    /// Snapshot of the current entry set, including deletion flags.
    fn entries(&self) -> Vec<ZipEntry>;

    /// Uncompressed contents of the named entry.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>>;

    /// Append a new entry from raw bytes, replacing any same-named entry.
    fn add_entry(&mut self, name: &str, contents: &[u8]) -> Result<()>;

    /// Write raw bytes at an absolute offset in the archive.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Current central directory record bytes, recomputed if stale.
    fn central_directory_bytes(&self) -> Result<Vec<u8>>;

    /// Current end-of-central-directory record bytes, recomputed if stale.
    fn eocd_bytes(&self) -> Result<Vec<u8>>;

    /// Absolute offset of the central directory region.
    fn central_directory_offset(&self) -> u64;

    /// Length of the padding between entry data and the central directory.
    fn extra_directory_offset(&self) -> u64;

    /// Set the padding length between entry data and the central directory.
    fn set_extra_directory_offset(&mut self, length: u64);

    /// Read an absolute byte range from the archive.
    fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>>;
}

/// Event hooks fired by the container engine.
///
/// One method per container lifecycle event; implementations override the
/// events they care about. An extension is registered with a container once
/// and receives every subsequent event for that container's session.
pub trait ContainerExtension {
    /// An entry was added to the archive, possibly replacing another.
    fn entry_added(
        &mut self,
        zip: &mut dyn ZipContainer,
        entry: &ZipEntry,
        replaced: Option<&ZipEntry>,
    ) -> Result<()> {
        let _ = (zip, entry, replaced);
        Ok(())
    }

    /// An entry was removed from the archive.
    fn entry_removed(&mut self, zip: &mut dyn ZipContainer, name: &str) -> Result<()> {
        let _ = (zip, name);
        Ok(())
    }

    /// The container is about to compute its final layout and write entries.
    ///
    /// The last point at which entries may still be added or removed.
    fn before_finalize(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let _ = zip;
        Ok(())
    }

    /// All entries have been written; the directory records are current.
    fn entries_written(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let _ = zip;
        Ok(())
    }

    /// The container session is closing.
    fn closed(&mut self, zip: &mut dyn ZipContainer) -> Result<()> {
        let _ = zip;
        Ok(())
    }
}

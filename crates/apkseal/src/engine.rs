//! Signing engine seam.
//!
//! The engine performs the actual signature computation: digesting entries,
//! producing JAR-signing metadata entries, and building the binary signing
//! block. The coordinator never sees key material or signature formats; it
//! only relays entry lifecycle facts to the engine and splices whatever the
//! engine emits back into the archive.
//!
//! An engine instance is stateful and exclusively owned by one coordinator
//! for one container session. It must be told about every entry that will be
//! present in the final output before it can emit signature artifacts.

use crate::Result;

/// One signature metadata entry the engine wants embedded in the archive.
///
/// For JAR signing these are the manifest, the signature file and the
/// signature block file under `META-INF/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Archive entry name, e.g. `META-INF/MANIFEST.MF`.
    pub name: String,
    /// Raw entry contents.
    pub contents: Vec<u8>,
}

/// The three archive sections covered by a signing block.
///
/// Borrowed views over the container's current bytes; the engine digests
/// them within the call and must not retain them.
#[derive(Debug, Clone, Copy)]
pub struct ZipSections<'a> {
    /// The entry-data region, from the start of the archive up to (but
    /// excluding) any boundary padding before the central directory.
    pub entry_data: &'a [u8],
    /// The central directory record bytes.
    pub central_directory: &'a [u8],
    /// The end-of-central-directory record bytes.
    pub eocd: &'a [u8],
}

/// A stateful signature producer driven by the signing coordinator.
///
/// Calls arrive in the order of the container lifecycle: any number of
/// [`output_entry`](SignerEngine::output_entry) /
/// [`output_entry_removed`](SignerEngine::output_entry_removed) notifications,
/// then at most one [`signature_entries`](SignerEngine::signature_entries)
/// round per finalize, then [`signing_block`](SignerEngine::signing_block),
/// then [`output_done`](SignerEngine::output_done).
pub trait SignerEngine {
    /// The named entry will appear in the final output.
    ///
    /// Returns `true` if the engine wants to inspect the entry's contents,
    /// in which case the coordinator follows up synchronously with
    /// [`inspect_entry`](SignerEngine::inspect_entry).
    fn output_entry(&mut self, name: &str) -> Result<bool>;

    /// Contents of an entry the engine asked to inspect.
    fn inspect_entry(&mut self, name: &str, contents: &[u8]) -> Result<()>;

    /// The named entry will no longer appear in the final output.
    fn output_entry_removed(&mut self, name: &str) -> Result<()>;

    /// Additional entries to embed in the archive, if any.
    ///
    /// Returns `None` when no embeddable metadata exists to add (for
    /// example, when JAR signing is disabled). When entries are returned,
    /// the coordinator writes them into the archive and confirms with
    /// [`signature_entries_written`](SignerEngine::signature_entries_written).
    fn signature_entries(&mut self) -> Result<Option<Vec<SignatureEntry>>>;

    /// The entries returned by the last
    /// [`signature_entries`](SignerEngine::signature_entries) call are in
    /// the archive.
    fn signature_entries_written(&mut self) -> Result<()>;

    /// Produce a signing block covering the given archive sections.
    ///
    /// Returns `None` when no block-based scheme is enabled. When a block is
    /// returned, the coordinator splices it in and confirms with
    /// [`signing_block_written`](SignerEngine::signing_block_written).
    fn signing_block(&mut self, sections: ZipSections<'_>) -> Result<Option<Vec<u8>>>;

    /// The block returned by the last
    /// [`signing_block`](SignerEngine::signing_block) call is in the archive.
    fn signing_block_written(&mut self) -> Result<()>;

    /// No more changes will be made; the output is complete.
    fn output_done(&mut self) -> Result<()>;
}

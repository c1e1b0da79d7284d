//! In-memory stand-ins for the three external collaborators: the container
//! engine, the signing engine and the verifier.
//!
//! The fake container keeps a flat model of the archive layout
//! (entry data, boundary padding, central directory, end-of-directory) so
//! splice offsets can be checked exactly. The fake engine produces
//! deterministic pseudo-signatures derived from SHA-256 digests of whatever
//! it was shown, so byte-identity of repeated output is meaningful.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use apkseal::{
    Error, Result, SignatureEntry, SignatureVerifier, SignerEngine, SigningConfig,
    VerificationReport, ZipContainer, ZipEntry, ZipSections, MANIFEST_NAME,
};
use sha2::{Digest, Sha256};
use x509_certificate::X509Certificate;

pub const SIGNER_DER: &[u8] = include_bytes!("../fixtures/signer.der");
pub const OTHER_SIGNER_DER: &[u8] = include_bytes!("../fixtures/other_signer.der");

pub fn signer_certificate() -> X509Certificate {
    X509Certificate::from_der(SIGNER_DER.to_vec()).unwrap()
}

pub fn other_certificate() -> X509Certificate {
    X509Certificate::from_der(OTHER_SIGNER_DER.to_vec()).unwrap()
}

pub fn test_config(v1: bool, v2: bool) -> SigningConfig {
    SigningConfig::builder()
        .min_platform_version(18)
        .v1_signing(v1)
        .v2_signing(v2)
        .certificate(signer_certificate())
        .build()
        .unwrap()
}

/// A report describing an archive signed exactly as `config` asks for.
pub fn matching_report(config: &SigningConfig) -> VerificationReport {
    VerificationReport {
        verified: true,
        v1_verified: config.v1_signing_enabled(),
        v2_verified: config.v2_signing_enabled(),
        signer_certificates: vec![config.primary_certificate_der().unwrap()],
    }
}

#[derive(Debug, Clone)]
struct FakeEntry {
    contents: Vec<u8>,
    deleted: bool,
}

/// In-memory container with a flat archive layout model.
///
/// Layout: `[entry data][padding][central directory][eocd]`. Entry data is
/// the concatenation of live entry contents in name order; the padding
/// length is the "extra directory offset".
#[derive(Default)]
pub struct FakeZip {
    entries: BTreeMap<String, FakeEntry>,
    extra_directory_offset: u64,
    /// Every `write_at` call, in order.
    pub writes: Vec<(u64, Vec<u8>)>,
    /// Every `add_entry` call, in order.
    pub added_names: Vec<String>,
}

impl FakeZip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an entry directly, without any event. Models entries already
    /// present when the archive is reopened, or mutations whose events were
    /// never delivered.
    pub fn insert(&mut self, name: &str, contents: &[u8]) {
        self.entries.insert(
            name.to_string(),
            FakeEntry {
                contents: contents.to_vec(),
                deleted: false,
            },
        );
    }

    /// Mark an entry deleted directly, without any event.
    pub fn mark_deleted(&mut self, name: &str) {
        self.entries
            .get_mut(name)
            .expect("unknown entry")
            .deleted = true;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| !e.deleted)
    }

    /// Prior padding between entry data and the central directory.
    pub fn set_padding(&mut self, length: u64) {
        self.extra_directory_offset = length;
    }

    pub fn entry_data_len(&self) -> u64 {
        self.entry_data().len() as u64
    }

    fn entry_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for entry in self.entries.values().filter(|e| !e.deleted) {
            data.extend_from_slice(&entry.contents);
        }
        data
    }
}

impl ZipContainer for FakeZip {
    fn entries(&self) -> Vec<ZipEntry> {
        self.entries
            .iter()
            .map(|(name, entry)| ZipEntry {
                name: name.clone(),
                deleted: entry.deleted,
            })
            .collect()
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        match self.entries.get(name) {
            Some(entry) if !entry.deleted => Ok(entry.contents.clone()),
            _ => Err(Error::Container(format!("no such entry: {}", name))),
        }
    }

    fn add_entry(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        self.added_names.push(name.to_string());
        self.insert(name, contents);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.writes.push((offset, bytes.to_vec()));
        Ok(())
    }

    fn central_directory_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for (name, entry) in self.entries.iter().filter(|(_, e)| !e.deleted) {
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(b':');
            bytes.extend_from_slice(&(entry.contents.len() as u32).to_le_bytes());
            bytes.push(b';');
        }
        Ok(bytes)
    }

    fn eocd_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = b"EOCD".to_vec();
        bytes.extend_from_slice(&self.central_directory_offset().to_le_bytes());
        Ok(bytes)
    }

    fn central_directory_offset(&self) -> u64 {
        self.entry_data_len() + self.extra_directory_offset
    }

    fn extra_directory_offset(&self) -> u64 {
        self.extra_directory_offset
    }

    fn set_extra_directory_offset(&mut self, length: u64) {
        self.extra_directory_offset = length;
    }

    fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let data = self.entry_data();
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= data.len() as u64)
            .ok_or_else(|| Error::Container("read past end of entry data".into()))?;
        Ok(data[offset as usize..end as usize].to_vec())
    }
}

/// Observable state of a [`FakeEngine`], shared with the test body.
#[derive(Default)]
pub struct EngineState {
    /// Entry names the engine currently believes are in the output.
    pub known: BTreeSet<String>,
    /// Contents the engine was given to inspect, by entry name.
    pub inspected: BTreeMap<String, Vec<u8>>,
    /// Every add notification, in order (duplicates preserved).
    pub added: Vec<String>,
    /// Every remove notification, in order.
    pub removed: Vec<String>,
    pub batch_requests: usize,
    pub batches_done: usize,
    pub block_requests: usize,
    pub blocks_done: usize,
    pub outputs_done: usize,
}

/// Deterministic pseudo-signing engine.
///
/// With v1 enabled it inspects every entry and emits a three-entry
/// `META-INF/` batch (manifest deliberately not first, to exercise
/// reordering). With v2 enabled it emits a block derived from a digest of
/// the three archive sections.
pub struct FakeEngine {
    v1: bool,
    v2: bool,
    pub fail_signature_entries: bool,
    state: Rc<RefCell<EngineState>>,
}

impl FakeEngine {
    pub fn new(v1: bool, v2: bool) -> (Self, Rc<RefCell<EngineState>>) {
        let state = Rc::new(RefCell::new(EngineState::default()));
        (
            Self {
                v1,
                v2,
                fail_signature_entries: false,
                state: Rc::clone(&state),
            },
            state,
        )
    }

    fn manifest_contents(&self) -> Vec<u8> {
        let state = self.state.borrow();
        let mut manifest = String::from("Pseudo-Manifest-Version: 1.0\n");
        for name in &state.known {
            let digest = state
                .inspected
                .get(name)
                .map(|contents| hex::encode(Sha256::digest(contents)))
                .unwrap_or_default();
            manifest.push_str(&format!("Name: {}\nDigest: {}\n", name, digest));
        }
        manifest.into_bytes()
    }
}

impl SignerEngine for FakeEngine {
    fn output_entry(&mut self, name: &str) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.known.insert(name.to_string());
        state.added.push(name.to_string());
        Ok(self.v1)
    }

    fn inspect_entry(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        self.state
            .borrow_mut()
            .inspected
            .insert(name.to_string(), contents.to_vec());
        Ok(())
    }

    fn output_entry_removed(&mut self, name: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.known.remove(name);
        state.removed.push(name.to_string());
        Ok(())
    }

    fn signature_entries(&mut self) -> Result<Option<Vec<SignatureEntry>>> {
        self.state.borrow_mut().batch_requests += 1;
        if self.fail_signature_entries {
            return Err(Error::Signing("digest computation rejected".into()));
        }
        if !self.v1 {
            return Ok(None);
        }
        let manifest = self.manifest_contents();
        let signature_file = Sha256::digest(&manifest).to_vec();
        let signature_block = Sha256::digest(&signature_file).to_vec();
        Ok(Some(vec![
            SignatureEntry {
                name: "META-INF/CERT.SF".into(),
                contents: signature_file,
            },
            SignatureEntry {
                name: MANIFEST_NAME.into(),
                contents: manifest,
            },
            SignatureEntry {
                name: "META-INF/CERT.RSA".into(),
                contents: signature_block,
            },
        ]))
    }

    fn signature_entries_written(&mut self) -> Result<()> {
        self.state.borrow_mut().batches_done += 1;
        Ok(())
    }

    fn signing_block(&mut self, sections: ZipSections<'_>) -> Result<Option<Vec<u8>>> {
        self.state.borrow_mut().block_requests += 1;
        if !self.v2 {
            return Ok(None);
        }
        let mut hasher = Sha256::new();
        hasher.update(sections.entry_data);
        hasher.update(sections.central_directory);
        hasher.update(sections.eocd);
        let mut block = b"FAKE SIG BLOCK ".to_vec();
        block.extend_from_slice(&hasher.finalize());
        Ok(Some(block))
    }

    fn signing_block_written(&mut self) -> Result<()> {
        self.state.borrow_mut().blocks_done += 1;
        Ok(())
    }

    fn output_done(&mut self) -> Result<()> {
        self.state.borrow_mut().outputs_done += 1;
        Ok(())
    }
}

/// Verifier with a canned answer.
pub enum FakeVerifier {
    Report(VerificationReport),
    Fail(String),
    FailIo,
}

impl FakeVerifier {
    pub fn unverified() -> Self {
        FakeVerifier::Report(VerificationReport::unverified())
    }
}

impl SignatureVerifier for FakeVerifier {
    fn verify(
        &self,
        _zip: &dyn ZipContainer,
        _min_platform_version: u32,
    ) -> Result<VerificationReport> {
        match self {
            FakeVerifier::Report(report) => Ok(report.clone()),
            FakeVerifier::Fail(message) => Err(Error::Verification(message.clone())),
            FakeVerifier::FailIo => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "archive truncated mid-read",
            ))),
        }
    }
}

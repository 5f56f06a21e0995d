//! Owned handle to an open PDF

use crate::engine::{DocumentInfo, PdfData, PdfEngine};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Read a PDF file from disk, checking the header
pub fn read_pdf_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(Error::Io)?;

    // Validate PDF header
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    Ok(data)
}

/// An open document: its bytes, the password that unlocked them, and what
/// the engine reported when it was loaded.
///
/// The handle owns the bytes exclusively. Mutations go through
/// [`DocumentHandle::replace`], which reloads the new bytes before swapping
/// them in, so a failed engine call leaves the handle as it was.
#[derive(Debug)]
pub struct DocumentHandle {
    path: PathBuf,
    bytes: Vec<u8>,
    password: Option<String>,
    info: DocumentInfo,
    modified: bool,
}

impl DocumentHandle {
    /// Open a document from bytes already in memory
    pub fn from_bytes(
        engine: &dyn PdfEngine,
        path: PathBuf,
        bytes: Vec<u8>,
        password: Option<&str>,
    ) -> Result<Self> {
        let info = engine.load(PdfData::new(&bytes, password))?;
        if info.page_count == 0 {
            return Err(Error::InvalidPdf {
                reason: "PDF has no pages".to_string(),
            });
        }

        tracing::debug!(path = %path.display(), pages = info.page_count, "document opened");

        Ok(Self {
            path,
            bytes,
            password: password.map(str::to_string),
            info,
            modified: false,
        })
    }

    pub fn data(&self) -> PdfData<'_> {
        PdfData::new(&self.bytes, self.password.as_deref())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn page_count(&self) -> usize {
        self.info.page_count
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// True once the in-memory document differs from the file it came from
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }

    /// Install engine output as the new document contents.
    pub fn replace(&mut self, engine: &dyn PdfEngine, bytes: Vec<u8>) -> Result<()> {
        let info = engine.load(PdfData::new(&bytes, self.password.as_deref()))?;
        self.bytes = bytes;
        self.info = info;
        self.modified = true;
        Ok(())
    }

    /// Record that the document now lives at `path` (after save-as). The
    /// in-memory bytes and their password stay as they are.
    pub fn mark_saved(&mut self, path: PathBuf) {
        self.path = path;
        self.modified = false;
    }

    pub(crate) fn mark_modified(&mut self) {
        self.modified = true;
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "document released");
    }
}

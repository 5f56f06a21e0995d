//! qpdf FFI wrapper for document assembly
//!
//! Page copying (extraction and reordering), merging, and serialisation with
//! optional AES-256 encryption, using the qpdf crate (vendored FFI).

use super::{PdfData, Protection};
use crate::error::{Error, Result};
use qpdf::{EncryptionParams, EncryptionParamsR6, PrintPermission, QPdf};

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Helper: open a QPdf from memory, optionally with password
fn open_qpdf(doc: PdfData<'_>) -> Result<QPdf> {
    match doc.password {
        Some(pwd) => QPdf::read_from_memory_encrypted(doc.bytes, pwd)
            .map_err(|e| map_qpdf_error(e, true)),
        None => QPdf::read_from_memory(doc.bytes).map_err(|e| map_qpdf_error(e, false)),
    }
}

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError, password_given: bool) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword if password_given => Error::IncorrectPassword,
        qpdf::QPdfErrorCode::InvalidPassword => Error::PasswordRequired,
        qpdf::QPdfErrorCode::DamagedPdf => Error::InvalidPdf {
            reason: e.to_string(),
        },
        _ => Error::QpdfError {
            reason: e.to_string(),
        },
    }
}

fn write_error(e: qpdf::QPdfError) -> Error {
    Error::QpdfError {
        reason: e.to_string(),
    }
}

impl QpdfWrapper {
    /// Copy pages into a new PDF
    ///
    /// # Arguments
    /// * `doc` - Source PDF
    /// * `pages` - 0-indexed page indices, in output order
    ///
    /// # Returns
    /// The new PDF as bytes, unencrypted
    pub fn copy_pages(doc: PdfData<'_>, pages: &[usize]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(Error::QpdfError {
                reason: "No pages selected".to_string(),
            });
        }

        let source = open_qpdf(doc)?;
        let num_pages = source.get_num_pages().map_err(write_error)?;

        let dest = QPdf::empty();

        for &idx in pages {
            let page = u32::try_from(idx)
                .ok()
                .and_then(|i| source.get_page(i))
                .ok_or(Error::PageOutOfBounds {
                    page: idx as u32 + 1,
                    total: num_pages,
                })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(write_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(write_error)
    }

    /// Merge multiple PDFs into one
    ///
    /// # Arguments
    /// * `inputs` - PDFs to merge, in output order
    ///
    /// # Returns
    /// The merged PDF as bytes
    pub fn merge(inputs: &[PdfData<'_>]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::QpdfError {
                reason: "No input PDFs provided".to_string(),
            });
        }

        let dest = QPdf::empty();

        for (i, input) in inputs.iter().enumerate() {
            let source = open_qpdf(*input).map_err(|e| match e {
                Error::QpdfError { reason } => Error::QpdfError {
                    reason: format!("Failed to read input PDF {}: {}", i, reason),
                },
                other => other,
            })?;

            let pages = source.get_pages().map_err(|e| Error::QpdfError {
                reason: format!("Failed to get pages from input PDF {}: {}", i, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(write_error)?;
            }
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(write_error)
    }

    /// Serialise a PDF, dropping any existing encryption
    ///
    /// # Arguments
    /// * `doc` - Source PDF
    /// * `protection` - Passwords for the output, if it should be encrypted
    ///
    /// # Returns
    /// The written PDF as bytes
    pub fn write(doc: PdfData<'_>, protection: Option<&Protection>) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(doc)?;

        let mut writer = qpdf.writer();
        writer.preserve_encryption(false);

        if let Some(protection) = protection {
            let owner_pwd = protection
                .owner_password
                .as_deref()
                .unwrap_or(&protection.user_password);

            let encryption = EncryptionParams::R6(EncryptionParamsR6 {
                user_password: protection.user_password.clone(),
                owner_password: owner_pwd.to_string(),
                allow_accessibility: true,
                allow_extract: true,
                allow_assemble: true,
                allow_annotate_and_form: true,
                allow_form_filling: true,
                allow_modify_other: true,
                allow_print: PrintPermission::Full,
                encrypt_metadata: true,
            });
            writer.encryption_params(encryption);
        }

        writer.write_to_memory().map_err(write_error)
    }
}

//! Error types for pdf-desk

use thiserror::Error;

/// Result type alias for pdf-desk
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pdf-desk
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid or corrupt PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Incorrect password provided
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Page order is not a permutation of the document's pages
    #[error("Invalid page order: {reason}")]
    InvalidPageOrder { reason: String },

    /// No open tab with this id
    #[error("Tab not found: {id}")]
    TabNotFound { id: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// PNG encoding error
    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// Settings file could not be read or written
    #[error("Settings error: {reason}")]
    Settings { reason: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Rendered image would exceed configured limits
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// A request is missing a value or combines values that do not fit
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A background task failed before producing a result
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to show to the user.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::IncorrectPassword => "Incorrect password".to_string(),
            Error::InvalidPageRange { range } => format!("Invalid page range: {}", range),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::InvalidPageOrder { reason } => format!("Invalid page order: {}", reason),
            Error::TabNotFound { .. } => "Tab not found".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::QpdfError { .. } => "PDF processing error".to_string(),
            Error::ImageEncode(_) => "Image encoding error".to_string(),
            Error::Settings { .. } => "Settings could not be loaded or saved".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
            Error::InvalidArgument { reason } => format!("Invalid argument: {}", reason),
            Error::Internal { .. } => "Internal error".to_string(),
        }
    }
}

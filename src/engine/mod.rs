//! PDF engine layer
//!
//! Every real PDF operation (parsing, rasterisation, text search, annotation,
//! page copying, encryption) goes through the [`PdfEngine`] trait. The
//! production binding, [`PdfiumEngine`], uses PDFium for page-level work and
//! qpdf for document assembly and encrypted output.

mod pdfium;
mod qpdf;
#[cfg(test)]
pub(crate) mod testing;

pub use pdfium::PdfiumEngine;
pub use qpdf::QpdfWrapper;

use crate::error::Result;
use image::RgbaImage;
use serde::Serialize;

/// PDF bytes plus the password that unlocks them
#[derive(Debug, Clone, Copy)]
pub struct PdfData<'a> {
    pub bytes: &'a [u8],
    pub password: Option<&'a str>,
}

impl<'a> PdfData<'a> {
    pub fn new(bytes: &'a [u8], password: Option<&'a str>) -> Self {
        Self { bytes, password }
    }
}

/// Document information read when a PDF is opened
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

/// PDF metadata dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

/// Rectangle in page space, in PDF points (origin bottom-left, unrotated)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitRect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl HitRect {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// Page size in PDF points, before rotation is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Page rotation, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Rotation {
    #[default]
    None,
    Degrees90,
    Degrees180,
    Degrees270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Degrees90 => 90,
            Rotation::Degrees180 => 180,
            Rotation::Degrees270 => 270,
        }
    }

    /// Normalises any multiple of 90 degrees; other angles round down.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => Rotation::Degrees90,
            2 => Rotation::Degrees180,
            3 => Rotation::Degrees270,
            _ => Rotation::None,
        }
    }

    /// Next quarter turn clockwise
    pub fn quarter_turn(self) -> Self {
        Self::from_degrees(self.degrees() as i32 + 90)
    }
}

/// How large a rasterised page should be
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderTarget {
    /// Pixels per PDF point
    Scale(f32),
    /// Fixed output width in pixels, height follows the aspect ratio
    Width(u32),
}

/// A rasterised page
#[derive(Debug, Clone)]
pub struct RenderedBitmap {
    pub image: RgbaImage,
    /// Unrotated page size the bitmap was produced from
    pub page_size: PageSize,
    pub rotation: Rotation,
}

/// Password protection for written PDFs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Protection {
    /// Password required to open the PDF
    pub user_password: String,
    /// Password required to change permissions (defaults to the user password)
    pub owner_password: Option<String>,
}

/// Operations the viewer needs from a PDF library.
///
/// Implementations are stateless between calls: every call receives the
/// document bytes and returns new bytes for mutating operations. The caller
/// decides whether to install the result, so a failed call never leaves a
/// half-modified document behind.
pub trait PdfEngine: Send + Sync {
    /// Open the document and read its page count and metadata.
    fn load(&self, doc: PdfData<'_>) -> Result<DocumentInfo>;

    /// Size of a page in points (0-indexed)
    fn page_size(&self, doc: PdfData<'_>, page: usize) -> Result<PageSize>;

    /// Rasterise a page (0-indexed), annotations included
    fn render_page(
        &self,
        doc: PdfData<'_>,
        page: usize,
        target: RenderTarget,
    ) -> Result<RenderedBitmap>;

    fn page_rotation(&self, doc: PdfData<'_>, page: usize) -> Result<Rotation>;

    /// Set a page's rotation and return the modified document
    fn set_page_rotation(&self, doc: PdfData<'_>, page: usize, rotation: Rotation)
        -> Result<Vec<u8>>;

    /// Find every occurrence of `query` on a page
    fn search_page(&self, doc: PdfData<'_>, page: usize, query: &str) -> Result<Vec<HitRect>>;

    /// Add one highlight annotation per rectangle and return the modified document
    fn add_highlights(&self, doc: PdfData<'_>, page: usize, rects: &[HitRect]) -> Result<Vec<u8>>;

    /// Add a text note at a point (PDF points) and return the modified document
    fn add_text_note(
        &self,
        doc: PdfData<'_>,
        page: usize,
        x: f32,
        y: f32,
        text: &str,
    ) -> Result<Vec<u8>>;

    /// Copy the given pages (0-indexed, in order, repeats allowed) into a new document
    fn copy_pages(&self, doc: PdfData<'_>, pages: &[usize]) -> Result<Vec<u8>>;

    /// Concatenate documents in order
    fn merge(&self, docs: &[PdfData<'_>]) -> Result<Vec<u8>>;

    /// Serialise the document without encryption, or with the given protection
    fn write(&self, doc: PdfData<'_>, protection: Option<&Protection>) -> Result<Vec<u8>>;
}

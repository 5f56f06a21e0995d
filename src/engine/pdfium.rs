//! PDFium-backed engine
//!
//! Page-level operations (rasterisation, text search, annotations, rotation,
//! metadata) run on PDFium; document assembly and encrypted output are
//! handed to [`QpdfWrapper`].

use super::{
    DocumentInfo, DocumentMetadata, HitRect, PageSize, PdfData, PdfEngine, Protection,
    QpdfWrapper, RenderTarget, RenderedBitmap, Rotation,
};
use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to a bundled library first, then the system one
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Map PDFium errors to our error type
fn map_pdfium_error(err: PdfiumError, password_given: bool) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            if password_given {
                Error::IncorrectPassword
            } else {
                Error::PasswordRequired
            }
        }
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError) => {
            Error::InvalidPdf {
                reason: format!("{}", err),
            }
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

fn pdfium_failure(action: &str, page: usize) -> impl FnOnce(PdfiumError) -> Error + '_ {
    move |e| Error::Pdfium {
        reason: format!("Failed to {} on page {}: {}", action, page + 1, e),
    }
}

fn check_header(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 4 || &bytes[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

fn to_engine_rotation(rotation: PdfPageRenderRotation) -> Rotation {
    match rotation {
        PdfPageRenderRotation::None => Rotation::None,
        PdfPageRenderRotation::Degrees90 => Rotation::Degrees90,
        PdfPageRenderRotation::Degrees180 => Rotation::Degrees180,
        PdfPageRenderRotation::Degrees270 => Rotation::Degrees270,
    }
}

fn to_pdfium_rotation(rotation: Rotation) -> PdfPageRenderRotation {
    match rotation {
        Rotation::None => PdfPageRenderRotation::None,
        Rotation::Degrees90 => PdfPageRenderRotation::Degrees90,
        Rotation::Degrees180 => PdfPageRenderRotation::Degrees180,
        Rotation::Degrees270 => PdfPageRenderRotation::Degrees270,
    }
}

fn to_pdf_rect(rect: &HitRect) -> PdfRect {
    PdfRect::new_from_values(rect.bottom, rect.left, rect.top, rect.right)
}

/// PDF engine using PDFium and qpdf
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumEngine;

impl PdfiumEngine {
    pub fn new() -> Self {
        Self
    }

    /// Load the document and run `f` against it. The PDFium binding and the
    /// document live only for the duration of the call.
    fn with_document<T>(
        doc: PdfData<'_>,
        f: impl FnOnce(&mut PdfDocument<'_>) -> Result<T>,
    ) -> Result<T> {
        check_header(doc.bytes)?;

        let pdfium = create_pdfium()?;
        let mut document = pdfium
            .load_pdf_from_byte_slice(doc.bytes, doc.password)
            .map_err(|e| map_pdfium_error(e, doc.password.is_some()))?;

        f(&mut document)
    }

    fn get_page<'a>(document: &PdfDocument<'a>, page: usize) -> Result<PdfPage<'a>> {
        let total = document.pages().len();
        let index = u16::try_from(page)
            .ok()
            .filter(|&i| i < total)
            .ok_or(Error::PageOutOfBounds {
                page: page as u32 + 1,
                total: total as u32,
            })?;

        document
            .pages()
            .get(index)
            .map_err(pdfium_failure("load page", page))
    }

    fn save(document: &PdfDocument<'_>) -> Result<Vec<u8>> {
        document.save_to_bytes().map_err(|e| Error::Pdfium {
            reason: format!("Failed to save modified PDF: {}", e),
        })
    }

    fn extract_metadata(document: &PdfDocument) -> DocumentMetadata {
        let meta = document.metadata();
        let tag = |tag_type| meta.get(tag_type).map(|t| t.value().to_string());
        DocumentMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords: tag(PdfDocumentMetadataTagType::Keywords),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    /// PDFium reports page dimensions with /Rotate applied; undo it so
    /// callers always see the unrotated size.
    fn unrotated_size(page: &PdfPage, rotation: Rotation) -> PageSize {
        let width = page.width().value;
        let height = page.height().value;
        match rotation {
            Rotation::Degrees90 | Rotation::Degrees270 => PageSize {
                width: height,
                height: width,
            },
            _ => PageSize { width, height },
        }
    }

    fn read_rotation(page: &PdfPage, index: usize) -> Result<Rotation> {
        page.rotation()
            .map(to_engine_rotation)
            .map_err(pdfium_failure("read rotation", index))
    }
}

impl PdfEngine for PdfiumEngine {
    fn load(&self, doc: PdfData<'_>) -> Result<DocumentInfo> {
        Self::with_document(doc, |document| {
            Ok(DocumentInfo {
                page_count: document.pages().len() as usize,
                metadata: Self::extract_metadata(document),
            })
        })
    }

    fn page_size(&self, doc: PdfData<'_>, page: usize) -> Result<PageSize> {
        Self::with_document(doc, |document| {
            let pdf_page = Self::get_page(document, page)?;
            let rotation = Self::read_rotation(&pdf_page, page)?;
            Ok(Self::unrotated_size(&pdf_page, rotation))
        })
    }

    fn render_page(
        &self,
        doc: PdfData<'_>,
        page: usize,
        target: RenderTarget,
    ) -> Result<RenderedBitmap> {
        Self::with_document(doc, |document| {
            let pdf_page = Self::get_page(document, page)?;
            let rotation = Self::read_rotation(&pdf_page, page)?;
            let page_size = Self::unrotated_size(&pdf_page, rotation);

            let config = match target {
                RenderTarget::Scale(s) => PdfRenderConfig::new().scale_page_by_factor(s),
                RenderTarget::Width(w) => PdfRenderConfig::new().set_target_width(w as i32),
            };
            let config = config.render_form_data(true).render_annotations(true);

            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(pdfium_failure("render", page))?;

            Ok(RenderedBitmap {
                image: bitmap.as_image().into_rgba8(),
                page_size,
                rotation,
            })
        })
    }

    fn page_rotation(&self, doc: PdfData<'_>, page: usize) -> Result<Rotation> {
        Self::with_document(doc, |document| {
            let pdf_page = Self::get_page(document, page)?;
            Self::read_rotation(&pdf_page, page)
        })
    }

    fn set_page_rotation(
        &self,
        doc: PdfData<'_>,
        page: usize,
        rotation: Rotation,
    ) -> Result<Vec<u8>> {
        Self::with_document(doc, |document| {
            {
                let mut pdf_page = Self::get_page(document, page)?;
                pdf_page.set_rotation(to_pdfium_rotation(rotation));
            }
            Self::save(document)
        })
    }

    fn search_page(&self, doc: PdfData<'_>, page: usize, query: &str) -> Result<Vec<HitRect>> {
        Self::with_document(doc, |document| {
            let pdf_page = Self::get_page(document, page)?;
            let text = pdf_page.text().map_err(pdfium_failure("read text", page))?;
            let search = text
                .search(query, &PdfSearchOptions::new())
                .map_err(pdfium_failure("search", page))?;

            let mut hits = Vec::new();
            // An occurrence that wraps across lines yields one segment per line
            for segments in search.iter(PdfSearchDirection::SearchForward) {
                for segment in segments.iter() {
                    let bounds = segment.bounds();
                    hits.push(HitRect::new(
                        bounds.left().value,
                        bounds.bottom().value,
                        bounds.right().value,
                        bounds.top().value,
                    ));
                }
            }
            Ok(hits)
        })
    }

    fn add_highlights(&self, doc: PdfData<'_>, page: usize, rects: &[HitRect]) -> Result<Vec<u8>> {
        Self::with_document(doc, |document| {
            {
                let mut pdf_page = Self::get_page(document, page)?;
                for rect in rects {
                    let pdf_rect = to_pdf_rect(rect);
                    let mut annotation = pdf_page
                        .annotations_mut()
                        .create_highlight_annotation()
                        .map_err(pdfium_failure("create highlight", page))?;
                    annotation
                        .set_bounds(pdf_rect)
                        .map_err(pdfium_failure("position highlight", page))?;
                    annotation
                        .attachment_points_mut()
                        .create_attachment_point_at_end(PdfQuadPoints::from_rect(&pdf_rect))
                        .map_err(pdfium_failure("position highlight", page))?;
                    annotation
                        .set_fill_color(PdfColor::YELLOW)
                        .map_err(pdfium_failure("color highlight", page))?;
                }
            }
            Self::save(document)
        })
    }

    fn add_text_note(
        &self,
        doc: PdfData<'_>,
        page: usize,
        x: f32,
        y: f32,
        text: &str,
    ) -> Result<Vec<u8>> {
        Self::with_document(doc, |document| {
            {
                let mut pdf_page = Self::get_page(document, page)?;
                let mut annotation = pdf_page
                    .annotations_mut()
                    .create_text_annotation(text)
                    .map_err(pdfium_failure("create note", page))?;
                annotation
                    .set_position(PdfPoints::new(x), PdfPoints::new(y))
                    .map_err(pdfium_failure("position note", page))?;
            }
            Self::save(document)
        })
    }

    fn copy_pages(&self, doc: PdfData<'_>, pages: &[usize]) -> Result<Vec<u8>> {
        QpdfWrapper::copy_pages(doc, pages)
    }

    fn merge(&self, docs: &[PdfData<'_>]) -> Result<Vec<u8>> {
        QpdfWrapper::merge(docs)
    }

    fn write(&self, doc: PdfData<'_>, protection: Option<&Protection>) -> Result<Vec<u8>> {
        QpdfWrapper::write(doc, protection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_detection() {
        let engine = PdfiumEngine::new();
        let result = engine.load(PdfData::new(b"not a pdf", None));
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_rotation_mapping_is_symmetric() {
        for rotation in [
            Rotation::None,
            Rotation::Degrees90,
            Rotation::Degrees180,
            Rotation::Degrees270,
        ] {
            assert_eq!(to_engine_rotation(to_pdfium_rotation(rotation)), rotation);
        }
    }

    #[test]
    fn test_pdf_rect_conversion_keeps_edges() {
        let rect = to_pdf_rect(&HitRect::new(10.0, 20.0, 110.0, 32.0));
        assert_eq!(rect.left().value, 10.0);
        assert_eq!(rect.bottom().value, 20.0);
        assert_eq!(rect.right().value, 110.0);
        assert_eq!(rect.top().value, 32.0);
    }
}

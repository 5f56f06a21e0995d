//! In-memory engine for unit tests
//!
//! Documents are JSON behind a `%PDF-FAKE` header, so tests can build them
//! from page texts and inspect what mutating operations produced.

use super::{
    DocumentInfo, DocumentMetadata, HitRect, PageSize, PdfData, PdfEngine, Protection,
    RenderTarget, RenderedBitmap, Rotation,
};
use crate::error::{Error, Result};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

const HEADER: &[u8] = b"%PDF-FAKE\n";
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
const CHAR_WIDTH: f32 = 6.0;
const LINE_TOP: f32 = 700.0;
const LINE_HEIGHT: f32 = 12.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FakePage {
    pub text: String,
    pub rotation: u16,
    pub highlights: Vec<(f32, f32, f32, f32)>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FakeDoc {
    pub title: Option<String>,
    pub password: Option<String>,
    pub pages: Vec<FakePage>,
}

impl FakeDoc {
    pub fn with_pages(texts: &[&str]) -> Self {
        Self {
            title: None,
            password: None,
            pages: texts
                .iter()
                .map(|t| FakePage {
                    text: t.to_string(),
                    ..FakePage::default()
                })
                .collect(),
        }
    }

    pub fn encrypted(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        bytes.extend(serde_json::to_vec(self).unwrap_or_default());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = bytes.strip_prefix(HEADER).ok_or_else(|| Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        })?;
        serde_json::from_slice(body).map_err(|e| Error::InvalidPdf {
            reason: e.to_string(),
        })
    }
}

/// Engine over [`FakeDoc`] bytes. Setting `fail_writes` makes every
/// operation that produces new bytes fail.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub fail_writes: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn open(doc: PdfData<'_>) -> Result<FakeDoc> {
        let fake = FakeDoc::from_bytes(doc.bytes)?;
        match (&fake.password, doc.password) {
            (Some(_), None) => Err(Error::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => Err(Error::IncorrectPassword),
            _ => Ok(fake),
        }
    }

    fn page<'a>(fake: &'a mut FakeDoc, page: usize) -> Result<&'a mut FakePage> {
        let total = fake.pages.len() as u32;
        fake.pages.get_mut(page).ok_or(Error::PageOutOfBounds {
            page: page as u32 + 1,
            total,
        })
    }

    fn emit(&self, fake: &FakeDoc) -> Result<Vec<u8>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::QpdfError {
                reason: "write failed".to_string(),
            });
        }
        Ok(fake.to_bytes())
    }
}

impl PdfEngine for FakeEngine {
    fn load(&self, doc: PdfData<'_>) -> Result<DocumentInfo> {
        let fake = Self::open(doc)?;
        Ok(DocumentInfo {
            page_count: fake.pages.len(),
            metadata: DocumentMetadata {
                title: fake.title.clone(),
                ..DocumentMetadata::default()
            },
        })
    }

    fn page_size(&self, doc: PdfData<'_>, page: usize) -> Result<PageSize> {
        let mut fake = Self::open(doc)?;
        Self::page(&mut fake, page)?;
        Ok(PageSize {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
        })
    }

    fn render_page(
        &self,
        doc: PdfData<'_>,
        page: usize,
        target: RenderTarget,
    ) -> Result<RenderedBitmap> {
        let mut fake = Self::open(doc)?;
        let rotation = Rotation::from_degrees(Self::page(&mut fake, page)?.rotation as i32);
        let scale = match target {
            RenderTarget::Scale(s) => s,
            RenderTarget::Width(w) => w as f32 / PAGE_WIDTH,
        };
        let (w, h) = match rotation {
            Rotation::Degrees90 | Rotation::Degrees270 => (PAGE_HEIGHT, PAGE_WIDTH),
            _ => (PAGE_WIDTH, PAGE_HEIGHT),
        };
        let width = ((w * scale).round() as u32).max(1);
        let height = ((h * scale).round() as u32).max(1);
        Ok(RenderedBitmap {
            image: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            page_size: PageSize {
                width: PAGE_WIDTH,
                height: PAGE_HEIGHT,
            },
            rotation,
        })
    }

    fn page_rotation(&self, doc: PdfData<'_>, page: usize) -> Result<Rotation> {
        let mut fake = Self::open(doc)?;
        Ok(Rotation::from_degrees(
            Self::page(&mut fake, page)?.rotation as i32,
        ))
    }

    fn set_page_rotation(
        &self,
        doc: PdfData<'_>,
        page: usize,
        rotation: Rotation,
    ) -> Result<Vec<u8>> {
        let mut fake = Self::open(doc)?;
        Self::page(&mut fake, page)?.rotation = rotation.degrees();
        self.emit(&fake)
    }

    fn search_page(&self, doc: PdfData<'_>, page: usize, query: &str) -> Result<Vec<HitRect>> {
        let mut fake = Self::open(doc)?;
        let text = Self::page(&mut fake, page)?.text.to_lowercase();
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(text
            .match_indices(&needle)
            .map(|(offset, m)| {
                let left = offset as f32 * CHAR_WIDTH;
                HitRect::new(
                    left,
                    LINE_TOP,
                    left + m.len() as f32 * CHAR_WIDTH,
                    LINE_TOP + LINE_HEIGHT,
                )
            })
            .collect())
    }

    fn add_highlights(&self, doc: PdfData<'_>, page: usize, rects: &[HitRect]) -> Result<Vec<u8>> {
        let mut fake = Self::open(doc)?;
        let target = Self::page(&mut fake, page)?;
        target.highlights.extend(
            rects
                .iter()
                .map(|r| (r.left, r.bottom, r.right, r.top)),
        );
        self.emit(&fake)
    }

    fn add_text_note(
        &self,
        doc: PdfData<'_>,
        page: usize,
        _x: f32,
        _y: f32,
        text: &str,
    ) -> Result<Vec<u8>> {
        let mut fake = Self::open(doc)?;
        Self::page(&mut fake, page)?.notes.push(text.to_string());
        self.emit(&fake)
    }

    fn copy_pages(&self, doc: PdfData<'_>, pages: &[usize]) -> Result<Vec<u8>> {
        let mut fake = Self::open(doc)?;
        let mut copied = Vec::with_capacity(pages.len());
        for &idx in pages {
            copied.push(Self::page(&mut fake, idx)?.clone());
        }
        self.emit(&FakeDoc {
            title: fake.title,
            password: None,
            pages: copied,
        })
    }

    fn merge(&self, docs: &[PdfData<'_>]) -> Result<Vec<u8>> {
        let mut merged = FakeDoc::default();
        for doc in docs {
            merged.pages.extend(Self::open(*doc)?.pages);
        }
        self.emit(&merged)
    }

    fn write(&self, doc: PdfData<'_>, protection: Option<&Protection>) -> Result<Vec<u8>> {
        let mut fake = Self::open(doc)?;
        fake.password = protection.map(|p| p.user_password.clone());
        self.emit(&fake)
    }
}

//! Integration tests for pdf-desk
//!
//! These drive the public viewer API through a minimal engine implemented
//! here, so they do not need the PDFium library at runtime.

use image::{Rgba, RgbaImage};
use pdf_desk::engine::{
    DocumentInfo, HitRect, PageSize, PdfData, PdfEngine, Protection, RenderTarget,
    RenderedBitmap, Rotation,
};
use pdf_desk::viewer::{read_pdf_file, NoPassword, PresetPassword};
use pdf_desk::{
    parse_page_range, to_page_indices, Error, Settings, SettingsStore, Window,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::PathBuf;
use std::sync::Arc;

const PAGE: PageSize = PageSize {
    width: 200.0,
    height: 100.0,
};

/// Documents are `%PDF-STUB <pages> [password]`; each page's text is
/// "page N".
struct StubEngine;

impl StubEngine {
    fn parse(doc: PdfData<'_>) -> pdf_desk::Result<usize> {
        let text = std::str::from_utf8(doc.bytes).unwrap_or_default();
        let mut fields = text
            .strip_prefix("%PDF-STUB ")
            .ok_or_else(|| Error::InvalidPdf {
                reason: "not a stub".to_string(),
            })?
            .split_whitespace();
        let pages = fields
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| Error::InvalidPdf {
                reason: "bad page count".to_string(),
            })?;
        match (fields.next(), doc.password) {
            (Some(_), None) => Err(Error::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => Err(Error::IncorrectPassword),
            _ => Ok(pages),
        }
    }

    fn unsupported<T>() -> pdf_desk::Result<T> {
        Err(Error::Pdfium {
            reason: "unsupported".to_string(),
        })
    }
}

impl PdfEngine for StubEngine {
    fn load(&self, doc: PdfData<'_>) -> pdf_desk::Result<DocumentInfo> {
        Ok(DocumentInfo {
            page_count: Self::parse(doc)?,
            ..DocumentInfo::default()
        })
    }

    fn page_size(&self, _doc: PdfData<'_>, _page: usize) -> pdf_desk::Result<PageSize> {
        Ok(PAGE)
    }

    fn render_page(
        &self,
        _doc: PdfData<'_>,
        _page: usize,
        target: RenderTarget,
    ) -> pdf_desk::Result<RenderedBitmap> {
        let scale = match target {
            RenderTarget::Scale(s) => s,
            RenderTarget::Width(w) => w as f32 / PAGE.width,
        };
        Ok(RenderedBitmap {
            image: RgbaImage::from_pixel(
                (PAGE.width * scale) as u32,
                (PAGE.height * scale) as u32,
                Rgba([255, 255, 255, 255]),
            ),
            page_size: PAGE,
            rotation: Rotation::None,
        })
    }

    fn page_rotation(&self, _doc: PdfData<'_>, _page: usize) -> pdf_desk::Result<Rotation> {
        Ok(Rotation::None)
    }

    fn set_page_rotation(
        &self,
        _doc: PdfData<'_>,
        _page: usize,
        _rotation: Rotation,
    ) -> pdf_desk::Result<Vec<u8>> {
        Self::unsupported()
    }

    fn search_page(
        &self,
        _doc: PdfData<'_>,
        page: usize,
        query: &str,
    ) -> pdf_desk::Result<Vec<HitRect>> {
        let text = format!("page {}", page + 1);
        Ok(if !query.is_empty() && text.contains(query) {
            vec![HitRect::new(10.0, 40.0, 60.0, 60.0)]
        } else {
            Vec::new()
        })
    }

    fn add_highlights(
        &self,
        _doc: PdfData<'_>,
        _page: usize,
        _rects: &[HitRect],
    ) -> pdf_desk::Result<Vec<u8>> {
        Self::unsupported()
    }

    fn add_text_note(
        &self,
        _doc: PdfData<'_>,
        _page: usize,
        _x: f32,
        _y: f32,
        _text: &str,
    ) -> pdf_desk::Result<Vec<u8>> {
        Self::unsupported()
    }

    fn copy_pages(&self, _doc: PdfData<'_>, pages: &[usize]) -> pdf_desk::Result<Vec<u8>> {
        Ok(format!("%PDF-STUB {}", pages.len()).into_bytes())
    }

    fn merge(&self, docs: &[PdfData<'_>]) -> pdf_desk::Result<Vec<u8>> {
        let mut total = 0;
        for doc in docs {
            total += Self::parse(*doc)?;
        }
        Ok(format!("%PDF-STUB {}", total).into_bytes())
    }

    fn write(
        &self,
        doc: PdfData<'_>,
        protection: Option<&Protection>,
    ) -> pdf_desk::Result<Vec<u8>> {
        let pages = Self::parse(doc)?;
        Ok(match protection {
            Some(p) => format!("%PDF-STUB {} {}", pages, p.user_password),
            None => format!("%PDF-STUB {}", pages),
        }
        .into_bytes())
    }
}

fn window() -> Window {
    Window::new(Arc::new(StubEngine), Settings::default())
}

fn stub_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[rstest]
#[case("1-3,6,9-10", vec![1, 2, 3, 6, 9, 10])]
#[case(" 4 , 2 ", vec![4, 2])]
#[case("2,2,1-2", vec![2, 2, 1, 2])]
fn test_parse_page_range(#[case] input: &str, #[case] expected: Vec<u32>) {
    assert_eq!(parse_page_range(input, 10).unwrap(), expected);
}

#[test]
fn test_parse_page_range_bounded_by_document() {
    assert_eq!(parse_page_range("1-4000000000", 3).unwrap(), vec![1, 2, 3]);
}

#[rstest]
#[case("")]
#[case("abc")]
#[case("0")]
#[case("5-2")]
fn test_parse_page_range_rejects(#[case] input: &str) {
    assert!(matches!(
        parse_page_range(input, 10),
        Err(Error::InvalidPageRange { .. })
    ));
}

#[test]
fn test_page_indices_are_clamped() {
    assert_eq!(to_page_indices(&[1, 5, 99], 5), vec![0, 4, 4]);
}

#[test]
fn test_read_pdf_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_pdf_file(dir.path().join("nope.pdf")),
        Err(Error::PdfNotFound { .. })
    ));
    let text = stub_file(&dir, "text.pdf", "plain text");
    assert!(matches!(read_pdf_file(text), Err(Error::InvalidPdf { .. })));
}

#[test]
fn test_session_across_tabs() {
    let dir = tempfile::tempdir().unwrap();
    let short = stub_file(&dir, "short.pdf", "%PDF-STUB 2");
    let long = stub_file(&dir, "long.pdf", "%PDF-STUB 12");
    let mut window = window();

    let outcomes = window.open_files(&[short, long], &mut NoPassword);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    window
        .with_active(|tab, engine| {
            tab.last_page();
            tab.zoom_out();
            tab.run_search(engine, "page 1")
        })
        .unwrap();

    // "page 1", "page 10", "page 11", "page 12"
    let status = window.status();
    assert_eq!(status.search.as_ref().unwrap().total, 4);
    assert_eq!(
        status.to_string(),
        "long.pdf | Page 1/12 | 80% | \"page 1\" 1/4"
    );

    let hit = window
        .with_active(|tab, _| Ok(tab.find_prev()))
        .unwrap()
        .flatten()
        .unwrap();
    assert_eq!(hit.page, 11);

    let bitmap = window
        .with_active_settings(|tab, engine, settings| tab.render(engine, settings.dark_mode))
        .unwrap()
        .unwrap();
    assert_eq!(bitmap.image.width(), 160);

    window.close_active().unwrap();
    assert_eq!(window.status().to_string(), "short.pdf | Page 1/2 | 100%");
    window.close_active().unwrap();
    assert!(window.tabs().is_empty());
    assert_eq!(window.with_active(|tab, _| Ok(tab.next_page())).unwrap(), None);
}

#[test]
fn test_encrypted_open_and_protected_save() {
    let dir = tempfile::tempdir().unwrap();
    let locked = stub_file(&dir, "locked.pdf", "%PDF-STUB 3 secret");
    let mut window = window();

    assert!(matches!(
        window.open_file(&locked, &mut PresetPassword(Some("guess".to_string()))),
        Err(Error::IncorrectPassword)
    ));
    window
        .open_file(&locked, &mut PresetPassword(Some("secret".to_string())))
        .unwrap();

    let out = dir.path().join("copy.pdf");
    let protection = Protection {
        user_password: "new".to_string(),
        owner_password: None,
    };
    window
        .with_active(|tab, engine| tab.save_as(engine, &out, Some(&protection)))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "%PDF-STUB 3 new");

    let extracted = dir.path().join("first.pdf");
    let written = window
        .with_active(|tab, engine| tab.extract_pages(engine, &extracted, "1,3"))
        .unwrap();
    assert_eq!(written, Some(2));
}

#[test]
fn test_merge_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = stub_file(&dir, "a.pdf", "%PDF-STUB 2");
    let b = stub_file(&dir, "b.pdf", "%PDF-STUB 5");
    let out = dir.path().join("merged.pdf");

    assert_eq!(window().merge_files(&[a, b], &out, None).unwrap(), 7);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "%PDF-STUB 7");
}

#[test]
fn test_settings_persist_dark_mode() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("pdf-desk").join("settings.json"));
    assert!(!store.load().unwrap().dark_mode);

    let mut window = window();
    window.set_dark_mode(true);
    store.save(window.settings()).unwrap();

    let restored = Window::new(Arc::new(StubEngine), store.load().unwrap());
    assert!(restored.status().dark_mode);
}

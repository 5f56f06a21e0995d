//! Per-document view controller

use super::document::DocumentHandle;
use super::page_range::{parse_page_range, to_page_indices};
use super::render::{apply_dark_mode, draw_hits, encode_png};
use super::search::{Hit, SearchState};
use crate::engine::{DocumentInfo, PdfEngine, Protection, RenderTarget, RenderedBitmap};
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 8.0;
pub const ZOOM_STEP: f32 = 1.25;

/// Stable identifier of an open tab
pub type TabId = String;

/// Current page and zoom of a tab
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    /// 0-indexed page
    pub page: usize,
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 0,
            zoom: 1.0,
        }
    }
}

/// Summary of a tab for listings and the status line
#[derive(Debug, Clone, Serialize)]
pub struct TabSummary {
    pub id: TabId,
    pub name: String,
    pub path: String,
    /// 1-indexed
    pub page: usize,
    pub page_count: usize,
    pub zoom: f32,
    pub modified: bool,
}

/// A rendered page preview
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// 0-indexed
    pub page: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One open document plus its view and search state.
pub struct Tab {
    id: TabId,
    document: DocumentHandle,
    view: ViewState,
    search: SearchState,
}

impl Tab {
    pub fn new(document: DocumentHandle) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document,
            view: ViewState::default(),
            search: SearchState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn current_page(&self) -> usize {
        self.view.page
    }

    pub fn zoom(&self) -> f32 {
        self.view.zoom
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    pub fn summary(&self) -> TabSummary {
        TabSummary {
            id: self.id.clone(),
            name: self.document.file_name(),
            path: self.document.path().display().to_string(),
            page: self.view.page + 1,
            page_count: self.page_count(),
            zoom: self.view.zoom,
            modified: self.document.is_modified(),
        }
    }

    // ------------------------------------------------------------------
    // Navigation and zoom
    // ------------------------------------------------------------------

    /// Move to a page (0-indexed), clamped to the document. Returns whether
    /// the page changed.
    pub fn set_page(&mut self, index: usize) -> bool {
        let clamped = index.min(self.page_count().saturating_sub(1));
        if clamped == self.view.page {
            return false;
        }
        self.view.page = clamped;
        tracing::debug!(tab = %self.id, page = clamped, "page changed");
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.view.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.view.page.saturating_sub(1))
    }

    pub fn first_page(&mut self) -> bool {
        self.set_page(0)
    }

    pub fn last_page(&mut self) -> bool {
        self.set_page(usize::MAX)
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.view.zoom * ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.view.zoom / ZOOM_STEP)
    }

    pub fn reset_zoom(&mut self) -> f32 {
        self.set_zoom(1.0)
    }

    fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.view.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        self.view.zoom
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search the whole document. An empty query clears the search. Jumps
    /// to the first hit's page and returns the hit count.
    pub fn run_search(&mut self, engine: &dyn PdfEngine, query: &str) -> Result<usize> {
        if query.is_empty() {
            self.search.clear();
            return Ok(0);
        }

        let data = self.document.data();
        let mut pages = Vec::with_capacity(self.page_count());
        for page in 0..self.page_count() {
            pages.push((page, engine.search_page(data, page, query)?));
        }

        self.search = SearchState::from_pages(query, pages);
        tracing::debug!(
            tab = %self.id,
            query,
            hits = self.search.hit_count(),
            "search finished"
        );

        if let Some(page) = self.search.current().map(|h| h.page) {
            self.set_page(page);
        }
        Ok(self.search.hit_count())
    }

    pub fn find_next(&mut self) -> Option<Hit> {
        let hit = self.search.next().copied()?;
        self.set_page(hit.page);
        Some(hit)
    }

    pub fn find_prev(&mut self) -> Option<Hit> {
        let hit = self.search.prev().copied()?;
        self.set_page(hit.page);
        Some(hit)
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Rasterise the current page at the current zoom with search hits
    /// drawn on top, inverted when `dark_mode` is set.
    pub fn render(&self, engine: &dyn PdfEngine, dark_mode: bool) -> Result<RenderedBitmap> {
        let mut bitmap = engine.render_page(
            self.document.data(),
            self.view.page,
            RenderTarget::Scale(self.view.zoom),
        )?;

        let hits = self.search.hits_on_page(self.view.page);
        if !hits.is_empty() {
            let current = self
                .search
                .current()
                .filter(|h| h.page == self.view.page)
                .map(|h| &h.rect);
            draw_hits(&mut bitmap, hits, current);
        }

        if dark_mode {
            apply_dark_mode(&mut bitmap.image);
        }
        Ok(bitmap)
    }

    /// Pixel area of the current page rendered at the current zoom
    pub fn render_area(&self, engine: &dyn PdfEngine) -> Result<u64> {
        let size = engine.page_size(self.document.data(), self.view.page)?;
        let width = (size.width * self.view.zoom).round() as u64;
        let height = (size.height * self.view.zoom).round() as u64;
        Ok(width * height)
    }

    /// Rasterise every page at a fixed width, as PNG. Nothing is rendered
    /// if any page at that width would exceed `max_pixels`.
    pub fn thumbnails(
        &self,
        engine: &dyn PdfEngine,
        width: u32,
        max_pixels: u64,
    ) -> Result<Vec<Thumbnail>> {
        let data = self.document.data();
        for page in 0..self.page_count() {
            let size = engine.page_size(data, page)?;
            // Rotation can swap the sides, so bound by the longer one
            let aspect = size.width.max(size.height) / size.width.min(size.height).max(1.0);
            let height = (width as f32 * aspect).round() as u64;
            let area = u64::from(width) * height;
            if area > max_pixels {
                return Err(Error::ImageDimensionExceeded {
                    detail: format!(
                        "thumbnail of page {} at width {} is {} pixels, maximum is {}",
                        page + 1,
                        width,
                        area,
                        max_pixels
                    ),
                });
            }
        }

        (0..self.page_count())
            .map(|page| {
                let bitmap = engine.render_page(data, page, RenderTarget::Width(width))?;
                Ok(Thumbnail {
                    page,
                    width: bitmap.image.width(),
                    height: bitmap.image.height(),
                    png: encode_png(&bitmap.image)?,
                })
            })
            .collect()
    }

    /// Write the current page as a PNG at the current zoom
    pub fn export_page_png(&self, engine: &dyn PdfEngine, path: &Path) -> Result<()> {
        let bitmap = engine.render_page(
            self.document.data(),
            self.view.page,
            RenderTarget::Scale(self.view.zoom),
        )?;
        let png = encode_png(&bitmap.image)?;
        std::fs::write(path, png)?;
        tracing::info!(tab = %self.id, path = %path.display(), "page exported");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Document output
    // ------------------------------------------------------------------

    /// Write the document, optionally password protected. The tab then
    /// refers to the saved file.
    pub fn save_as(
        &mut self,
        engine: &dyn PdfEngine,
        path: &Path,
        protection: Option<&Protection>,
    ) -> Result<()> {
        let output = engine.write(self.document.data(), protection)?;
        std::fs::write(path, &output)?;
        self.document.mark_saved(path.to_path_buf());
        tracing::info!(tab = %self.id, path = %path.display(), "document saved");
        Ok(())
    }

    /// Write the pages named by `range` (1-indexed, e.g. "1-3,6") to a
    /// new PDF. Out-of-range pages are clamped. Returns the written page count.
    pub fn extract_pages(
        &self,
        engine: &dyn PdfEngine,
        path: &Path,
        range: &str,
    ) -> Result<usize> {
        let pages = parse_page_range(range, self.page_count())?;
        let indices = to_page_indices(&pages, self.page_count());
        let output = engine.copy_pages(self.document.data(), &indices)?;
        std::fs::write(path, &output)?;
        tracing::info!(tab = %self.id, path = %path.display(), pages = indices.len(), "pages extracted");
        Ok(indices.len())
    }

    /// Replace the document with one whose pages follow `order` (0-indexed).
    /// `order` must be a permutation of every page.
    pub fn reorder_pages(&mut self, engine: &dyn PdfEngine, order: &[usize]) -> Result<()> {
        validate_permutation(order, self.page_count())?;

        let output = engine.copy_pages(self.document.data(), order)?;
        // Copies are written unencrypted
        let mut replacement = DocumentHandle::from_bytes(
            engine,
            self.document.path().to_path_buf(),
            output,
            None,
        )?;
        replacement.mark_modified();

        self.document = replacement;
        self.search.clear();
        self.set_page(self.view.page);
        tracing::info!(tab = %self.id, "pages reordered");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Turn the current page's search hits into highlight annotations.
    /// Returns false when the current page has no hits.
    pub fn add_highlight_for_current_hits(&mut self, engine: &dyn PdfEngine) -> Result<bool> {
        let hits = self.search.hits_on_page(self.view.page);
        if hits.is_empty() {
            return Ok(false);
        }
        let output = engine.add_highlights(self.document.data(), self.view.page, hits)?;
        self.document.replace(engine, output)?;
        tracing::debug!(tab = %self.id, page = self.view.page, "hits highlighted");
        Ok(true)
    }

    /// Add a text note at (x, y) in points on the current page
    pub fn add_text_note(
        &mut self,
        engine: &dyn PdfEngine,
        x: f32,
        y: f32,
        text: &str,
    ) -> Result<()> {
        let output = engine.add_text_note(self.document.data(), self.view.page, x, y, text)?;
        self.document.replace(engine, output)
    }

    /// Rotate the current page a quarter turn clockwise; returns the new
    /// rotation in degrees.
    pub fn rotate90(&mut self, engine: &dyn PdfEngine) -> Result<u16> {
        let data = self.document.data();
        let rotation = engine.page_rotation(data, self.view.page)?.quarter_turn();
        let output = engine.set_page_rotation(data, self.view.page, rotation)?;
        self.document.replace(engine, output)?;
        Ok(rotation.degrees())
    }

    pub fn info(&self) -> &DocumentInfo {
        self.document.info()
    }

    pub fn path(&self) -> PathBuf {
        self.document.path().to_path_buf()
    }
}

fn validate_permutation(order: &[usize], page_count: usize) -> Result<()> {
    if order.len() != page_count {
        return Err(Error::InvalidPageOrder {
            reason: format!("expected {} pages, got {}", page_count, order.len()),
        });
    }
    let mut seen = vec![false; page_count];
    for &idx in order {
        match seen.get_mut(idx) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(Error::InvalidPageOrder {
                    reason: format!("page {} listed twice", idx + 1),
                })
            }
            None => {
                return Err(Error::PageOutOfBounds {
                    page: idx as u32 + 1,
                    total: page_count as u32,
                })
            }
        }
    }
    Ok(())
}

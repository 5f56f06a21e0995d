//! Search hit bookkeeping for a tab

use crate::engine::HitRect;
use serde::Serialize;
use std::collections::BTreeMap;

/// One located occurrence of the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    /// 0-indexed page
    pub page: usize,
    pub rect: HitRect,
}

/// Result of the most recent search in a tab.
///
/// Hits are kept both grouped by page (for drawing and highlighting) and as
/// one flat list in document order (for next/previous traversal).
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: String,
    by_page: BTreeMap<usize, Vec<HitRect>>,
    flat: Vec<Hit>,
    current: Option<usize>,
}

impl SearchState {
    /// Build the state from per-page results; pages must be given in
    /// document order. The first hit becomes current.
    pub fn from_pages(query: &str, pages: impl IntoIterator<Item = (usize, Vec<HitRect>)>) -> Self {
        let mut by_page = BTreeMap::new();
        let mut flat = Vec::new();

        for (page, rects) in pages {
            if rects.is_empty() {
                continue;
            }
            flat.extend(rects.iter().map(|&rect| Hit { page, rect }));
            by_page.insert(page, rects);
        }

        let current = if flat.is_empty() { None } else { Some(0) };

        Self {
            query: query.to_string(),
            by_page,
            flat,
            current,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn hit_count(&self) -> usize {
        self.flat.len()
    }

    /// Index of the current hit in document order
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Hit> {
        self.current.and_then(|i| self.flat.get(i))
    }

    pub fn hits_on_page(&self, page: usize) -> &[HitRect] {
        self.by_page.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of pages with at least one hit
    pub fn page_count(&self) -> usize {
        self.by_page.len()
    }

    /// Advance to the next hit, wrapping after the last one.
    pub fn next(&mut self) -> Option<&Hit> {
        self.step(1)
    }

    /// Step back to the previous hit, wrapping before the first one.
    pub fn prev(&mut self) -> Option<&Hit> {
        self.step(-1)
    }

    fn step(&mut self, offset: isize) -> Option<&Hit> {
        if self.flat.is_empty() {
            return None;
        }
        let len = self.flat.len() as isize;
        let from = self.current.unwrap_or(0) as isize;
        let next = (from + offset).rem_euclid(len) as usize;
        self.current = Some(next);
        self.flat.get(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rect(x: f32) -> HitRect {
        HitRect::new(x, 0.0, x + 10.0, 10.0)
    }

    fn sample() -> SearchState {
        SearchState::from_pages(
            "foo",
            vec![
                (0, vec![rect(0.0), rect(20.0)]),
                (1, vec![]),
                (3, vec![rect(5.0)]),
            ],
        )
    }

    #[test]
    fn test_from_pages_flattens_in_order() {
        let state = sample();
        assert_eq!(state.hit_count(), 3);
        assert_eq!(state.page_count(), 2);
        assert_eq!(state.current_index(), Some(0));
        assert_eq!(state.hits_on_page(0).len(), 2);
        assert!(state.hits_on_page(1).is_empty());
        assert_eq!(state.current().map(|h| h.page), Some(0));
    }

    #[test]
    fn test_next_wraps_after_full_cycle() {
        let mut state = sample();
        let start = state.current_index();
        let pages: Vec<usize> = (0..state.hit_count())
            .filter_map(|_| state.next().map(|h| h.page))
            .collect();
        assert_eq!(pages, vec![0, 3, 0]);
        assert_eq!(state.current_index(), start);
    }

    #[test]
    fn test_prev_wraps_to_last() {
        let mut state = sample();
        let hit = state.prev().copied();
        assert_eq!(hit.map(|h| h.page), Some(3));
        assert_eq!(state.current_index(), Some(2));
    }

    #[test]
    fn test_traversal_without_hits_is_noop() {
        let mut state = SearchState::from_pages("none", vec![(0, vec![])]);
        assert!(state.is_empty());
        assert!(state.next().is_none());
        assert!(state.prev().is_none());
        assert_eq!(state.current_index(), None);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut state = sample();
        state.clear();
        assert!(state.is_empty());
        assert_eq!(state.query(), "");
        assert_eq!(state.current_index(), None);
    }
}

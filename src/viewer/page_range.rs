//! Page range parsing ("1-3,6,9-10")

use crate::error::{Error, Result};

/// Parse a page range string into 1-indexed page numbers.
///
/// Tokens are comma-separated, each either `N` or an inclusive range `A-B`.
/// Order and duplicates are kept as written, so `"3,1-2,3"` yields
/// `[3, 1, 2, 3]`. Page numbers past `page_count` are clamped to the last
/// page, and range ends are clamped before the range is expanded, so
/// `"1-4000000000"` on a 3-page document yields `[1, 2, 3]`.
pub fn parse_page_range(range: &str, page_count: usize) -> Result<Vec<u32>> {
    let invalid = || Error::InvalidPageRange {
        range: range.to_string(),
    };
    let parse_page = |s: &str| -> Result<u32> {
        match s.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(page) => Ok(page),
        }
    };

    let last = u32::try_from(page_count).unwrap_or(u32::MAX).max(1);
    let mut pages = Vec::new();

    for part in range.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_page(start)?;
            let end = parse_page(end)?;
            if start > end {
                return Err(invalid());
            }
            pages.extend(start.min(last)..=end.min(last));
        } else {
            pages.push(parse_page(part)?.min(last));
        }
    }

    if pages.is_empty() {
        return Err(invalid());
    }

    Ok(pages)
}

/// Convert 1-indexed page numbers to 0-indexed page indices, clamping each to
/// the document's last page.
pub fn to_page_indices(pages: &[u32], page_count: usize) -> Vec<usize> {
    let last = page_count.saturating_sub(1);
    pages
        .iter()
        .map(|&p| (p.saturating_sub(1) as usize).min(last))
        .collect()
}

//! Viewer state: open documents, their tabs, and the window holding them

mod document;
mod page_range;
mod render;
mod search;
mod tab;
mod window;

pub use document::{read_pdf_file, DocumentHandle};
pub use page_range::{parse_page_range, to_page_indices};
pub use render::{apply_dark_mode, draw_hits, encode_png, page_rect_to_pixels, PixelRect};
pub use search::{Hit, SearchState};
pub use tab::{Tab, TabId, Thumbnail, TabSummary, ViewState, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
pub use window::{
    NoPassword, OpenOutcome, PasswordPrompt, PresetPassword, SearchStatus, Window, WindowStatus,
};

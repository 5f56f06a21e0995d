//! pdf-desk library
//!
//! A multi-document PDF viewer session: a window of tabs, each holding one
//! open PDF with its own page, zoom and search state. The session is served
//! over MCP with tools to:
//! - open, switch and close tabs
//! - navigate, zoom, search and render the active page
//! - highlight hits, add notes and rotate pages
//! - save (optionally encrypted), extract, reorder and merge pages

pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod viewer;

pub use config::{ServerConfig, Settings, SettingsStore};
pub use engine::{PdfEngine, PdfiumEngine};
pub use error::{Error, Result};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, ListPdfsParams, ListPdfsResult,
    PdfDeskServer, PdfFileInfo,
};
pub use viewer::{parse_page_range, to_page_indices, Tab, Window, WindowStatus};

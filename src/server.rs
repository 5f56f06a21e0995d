//! MCP server exposing the viewer session as tools, using rmcp

use crate::config::{ServerConfig, Settings};
use crate::engine::{DocumentMetadata, HitRect, PdfEngine, PdfiumEngine, Protection};
use crate::error::Error;
use crate::viewer::{encode_png, PresetPassword, Tab, TabSummary, Window, WindowStatus};
use anyhow::Result;
use base64::Engine;
use parking_lot::Mutex;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDF viewer session server
#[derive(Clone)]
pub struct PdfDeskServer {
    window: Arc<Mutex<Window>>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Response envelope
// ============================================================================

/// Every tool except `list_pdfs` answers with the command's own fields, the
/// window status line after the command, and an error if it failed. A
/// command sent with no document open returns only the status line.
#[derive(Serialize)]
struct ToolResponse<T> {
    #[serde(flatten)]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond<T: Serialize>(
    tool: &str,
    result: crate::error::Result<Option<T>>,
    status: Option<String>,
) -> String {
    let response = match result {
        Ok(result) => ToolResponse {
            result,
            status,
            error: None,
        },
        Err(e) => {
            tracing::warn!(tool, error = %e, "tool failed");
            ToolResponse {
                result: None,
                status,
                error: Some(e.client_message()),
            }
        }
    };
    serde_json::to_string_pretty(&response).unwrap_or_default()
}

// ============================================================================
// Request/Response types for list_pdfs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPdfsParams {
    /// Directory to search for PDF files
    pub directory: String,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "report*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PdfFileInfo {
    /// Full path to the PDF file
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListPdfsResult {
    /// Directory that was searched
    pub directory: String,
    /// List of PDF files found
    pub files: Vec<PdfFileInfo>,
    /// Total number of files found
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for tabs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OpenPdfsParams {
    /// Paths of the PDF files to open, each in its own tab
    pub paths: Vec<String>,
    /// Password tried for files that turn out to be encrypted
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OpenFileResult {
    /// Path as given
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenPdfsResult {
    results: Vec<OpenFileResult>,
}

#[derive(Debug, Serialize)]
struct TabsResult {
    tabs: Vec<TabSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SwitchTabParams {
    /// Id of the tab to activate, as returned by open_pdfs or list_tabs
    pub tab_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CloseTabParams {
    /// Id of the tab to close; the active tab when omitted
    #[serde(default)]
    pub tab_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClosedResult {
    closed: String,
}

// ============================================================================
// Request/Response types for navigation and zoom
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NavigateAction {
    Next,
    Prev,
    First,
    Last,
    /// Jump to `page`
    Goto,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NavigateParams {
    /// One of "next", "prev", "first", "last", "goto"
    pub action: NavigateAction,
    /// Target page for "goto" (1-indexed, clamped to the document)
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ZoomAction {
    In,
    Out,
    Reset,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ZoomParams {
    /// One of "in", "out", "reset"
    pub action: ZoomAction,
}

#[derive(Debug, Serialize)]
struct ViewResult {
    /// 1-indexed
    page: usize,
    page_count: usize,
    zoom: f32,
    changed: bool,
}

#[derive(Debug, Serialize)]
struct RotateResult {
    page: usize,
    rotation: u16,
}

// ============================================================================
// Request/Response types for search
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Text to find (case-insensitive). An empty query clears the search.
    pub query: String,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FindDirection {
    Next,
    Prev,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindParams {
    /// "next" or "prev"; traversal wraps around the document
    pub direction: FindDirection,
}

#[derive(Debug, Serialize)]
struct HitInfo {
    /// 1-indexed page of the hit
    page: usize,
    /// 1-indexed position among all hits
    index: usize,
    total: usize,
    rect: HitRect,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    query: String,
    total_hits: usize,
    pages_with_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<HitInfo>,
}

#[derive(Debug, Serialize)]
struct FindResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    hit: Option<HitInfo>,
}

// ============================================================================
// Request/Response types for editing
// ============================================================================

#[derive(Debug, Serialize)]
struct HighlightResult {
    highlighted: bool,
    page: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddNoteParams {
    /// Horizontal position in points from the left page edge
    pub x: f32,
    /// Vertical position in points from the bottom page edge
    pub y: f32,
    /// Note contents
    pub text: String,
}

#[derive(Debug, Serialize)]
struct EditResult {
    page: usize,
    modified: bool,
}

// ============================================================================
// Request/Response types for rendering
// ============================================================================

#[derive(Debug, Serialize, JsonSchema)]
pub struct RenderedPageInfo {
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Base64-encoded PNG image data
    pub data_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ThumbnailsParams {
    /// Thumbnail width in pixels (default from server configuration)
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ThumbnailsResult {
    pages: Vec<RenderedPageInfo>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExportPageImageParams {
    /// Where to write the PNG
    pub output_path: String,
}

// ============================================================================
// Request/Response types for document output
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveAsParams {
    /// Output file path
    pub output_path: String,
    /// Password required to open the saved file (enables AES-256 encryption)
    #[serde(default)]
    pub user_password: Option<String>,
    /// Owner password (defaults to the user password)
    #[serde(default)]
    pub owner_password: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractPagesParams {
    /// Pages to extract, e.g. "1-3,5,7-9" (1-indexed, order and repeats kept)
    pub pages: String,
    /// Output file path
    pub output_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReorderPagesParams {
    /// New page order as 1-indexed page numbers; must list every page once
    pub order: Vec<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// Files to concatenate, in order
    pub paths: Vec<String>,
    /// Output file path
    pub output_path: String,
    /// Protect the merged file with this password
    #[serde(default)]
    pub user_password: Option<String>,
    /// Owner password (defaults to the user password)
    #[serde(default)]
    pub owner_password: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputResult {
    output_path: String,
    page_count: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    encrypted: bool,
}

#[derive(Debug, Serialize)]
struct DocumentInfoResult {
    tab: TabSummary,
    metadata: DocumentMetadata,
    encrypted: bool,
}

// ============================================================================
// Request/Response types for settings
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetDarkModeParams {
    /// Render pages with inverted colors
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
struct DarkModeResult {
    dark_mode: bool,
    changed: bool,
}

fn protection_from(user: Option<String>, owner: Option<String>) -> Option<Protection> {
    user.map(|user_password| Protection {
        user_password,
        owner_password: owner,
    })
}

fn hit_info(window: &Window) -> Option<HitInfo> {
    let search = window.active_tab()?.search();
    let hit = search.current()?;
    Some(HitInfo {
        page: hit.page + 1,
        index: search.current_index()? + 1,
        total: search.hit_count(),
        rect: hit.rect,
    })
}

fn check_render_area(tab: &Tab, engine: &dyn PdfEngine, max_pixels: u64) -> crate::error::Result<()> {
    let area = tab.render_area(engine)?;
    if area > max_pixels {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "page at {:.0}% is {} pixels, maximum is {}",
                tab.zoom() * 100.0,
                area,
                max_pixels
            ),
        });
    }
    Ok(())
}

fn open_file_result(
    window: &Window,
    path: String,
    outcome: crate::error::Result<String>,
) -> OpenFileResult {
    match outcome {
        Ok(id) => OpenFileResult {
            path,
            page_count: window
                .tabs()
                .iter()
                .find(|t| t.id() == id)
                .map(|t| t.page_count()),
            tab_id: Some(id),
            error: None,
        },
        Err(e) => OpenFileResult {
            path,
            tab_id: None,
            page_count: None,
            error: Some(e.client_message()),
        },
    }
}

fn rendered_page_info(page: usize, png: Vec<u8>, width: u32, height: u32) -> RenderedPageInfo {
    RenderedPageInfo {
        page: page as u32 + 1,
        width,
        height,
        data_base64: base64::engine::general_purpose::STANDARD.encode(&png),
        mime_type: "image/png".to_string(),
    }
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfDeskServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a server backed by PDFium, loading persisted settings
    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_engine(Arc::new(PdfiumEngine::default()), config)
    }

    /// Create a server over any engine
    pub fn with_engine(engine: Arc<dyn PdfEngine>, config: ServerConfig) -> Self {
        let settings = match &config.settings_store {
            Some(store) => store.load().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "using default settings");
                Settings::default()
            }),
            None => Settings::default(),
        };
        Self {
            window: Arc::new(Mutex::new(Window::new(engine, settings))),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    #[tool(
        description = "List PDF files in a directory. Useful for finding documents before opening them.

Returns for each file:
- Full path (can be passed to open_pdfs)
- Filename
- File size in bytes
- Last modified time

Supports recursive search and glob pattern filtering."
    )]
    async fn list_pdfs(&self, Parameters(params): Parameters<ListPdfsParams>) -> String {
        let result = self.process_list_pdfs(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_pdfs failed");
            ListPdfsResult {
                directory: params.directory.clone(),
                files: vec![],
                total_count: 0,
                error: Some(e.client_message()),
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    #[tool(
        description = "Open one or more PDF files, each in a new tab. The last file opened becomes the active tab. Each file reports its own result, so one bad file does not stop the others.

Encrypted files are retried once with `password`; the error distinguishes a missing password from a wrong one."
    )]
    async fn open_pdfs(&self, Parameters(params): Parameters<OpenPdfsParams>) -> String {
        // Denied paths keep their slot so results line up with the request
        let requests: Vec<std::result::Result<(String, PathBuf), OpenFileResult>> = params
            .paths
            .iter()
            .map(|path| match self.validate_path_access(path) {
                Ok(resolved) => Ok((path.clone(), resolved)),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "open denied");
                    Err(OpenFileResult {
                        path: path.clone(),
                        tab_id: None,
                        page_count: None,
                        error: Some(e.client_message()),
                    })
                }
            })
            .collect();

        let password = params.password;
        self.command("open_pdfs", move |window| {
            let resolved: Vec<PathBuf> = requests
                .iter()
                .filter_map(|r| r.as_ref().ok().map(|(_, p)| p.clone()))
                .collect();
            let mut outcomes = window
                .open_files(&resolved, &mut PresetPassword(password))
                .into_iter()
                .map(|o| o.result);

            let results = requests
                .into_iter()
                .map(|request| match request {
                    Err(denied) => denied,
                    Ok((given, _)) => {
                        let outcome = outcomes.next().unwrap_or_else(|| {
                            Err(Error::Internal {
                                reason: "open outcome missing".to_string(),
                            })
                        });
                        open_file_result(window, given, outcome)
                    }
                })
                .collect();
            Ok(Some(OpenPdfsResult { results }))
        })
        .await
    }

    #[tool(description = "List open tabs in order, with the active tab's id.")]
    async fn list_tabs(&self) -> String {
        self.command("list_tabs", |window| {
            Ok(Some(TabsResult {
                tabs: window.tab_summaries(),
                active: window.active_id().map(str::to_string),
            }))
        })
        .await
    }

    #[tool(description = "Make another open tab the active one.")]
    async fn switch_tab(&self, Parameters(params): Parameters<SwitchTabParams>) -> String {
        self.command("switch_tab", move |window| {
            window.switch_to(&params.tab_id)?;
            Ok(window.active_tab().map(|t| t.summary()))
        })
        .await
    }

    #[tool(
        description = "Close a tab and release its document. Closing the active tab activates its left neighbour (or the new first tab when it was leftmost)."
    )]
    async fn close_tab(&self, Parameters(params): Parameters<CloseTabParams>) -> String {
        self.command("close_tab", move |window| match params.tab_id {
            Some(id) => {
                window.close_tab(&id)?;
                Ok(Some(ClosedResult { closed: id }))
            }
            None => Ok(window.close_active()?.map(|closed| ClosedResult { closed })),
        })
        .await
    }

    #[tool(
        description = "Move the active tab to another page: \"next\", \"prev\", \"first\", \"last\", or \"goto\" with a 1-indexed `page`. Targets past either end are clamped."
    )]
    async fn navigate(&self, Parameters(params): Parameters<NavigateParams>) -> String {
        self.command("navigate", move |window| {
            window.with_active(|tab, _| {
                let changed = match params.action {
                    NavigateAction::Next => tab.next_page(),
                    NavigateAction::Prev => tab.prev_page(),
                    NavigateAction::First => tab.first_page(),
                    NavigateAction::Last => tab.last_page(),
                    NavigateAction::Goto => {
                        let page = params.page.ok_or_else(|| Error::InvalidArgument {
                            reason: "goto needs a page".to_string(),
                        })?;
                        tab.set_page((page as usize).saturating_sub(1))
                    }
                };
                Ok(ViewResult {
                    page: tab.current_page() + 1,
                    page_count: tab.page_count(),
                    zoom: tab.zoom(),
                    changed,
                })
            })
        })
        .await
    }

    #[tool(
        description = "Zoom the active tab \"in\" or \"out\" by a factor of 1.25, or \"reset\" to 100%. Zoom stays between 10% and 800%."
    )]
    async fn zoom(&self, Parameters(params): Parameters<ZoomParams>) -> String {
        self.command("zoom", move |window| {
            window.with_active(|tab, _| {
                let before = tab.zoom();
                let zoom = match params.action {
                    ZoomAction::In => tab.zoom_in(),
                    ZoomAction::Out => tab.zoom_out(),
                    ZoomAction::Reset => tab.reset_zoom(),
                };
                Ok(ViewResult {
                    page: tab.current_page() + 1,
                    page_count: tab.page_count(),
                    zoom,
                    changed: zoom != before,
                })
            })
        })
        .await
    }

    #[tool(description = "Rotate the active tab's current page 90 degrees clockwise.")]
    async fn rotate_page(&self) -> String {
        self.command("rotate_page", |window| {
            window.with_active(|tab, engine| {
                let rotation = tab.rotate90(engine)?;
                Ok(RotateResult {
                    page: tab.current_page() + 1,
                    rotation,
                })
            })
        })
        .await
    }

    #[tool(
        description = "Search the active document for text (case-insensitive) and jump to the first hit. Replaces any previous search; an empty query clears it."
    )]
    async fn search(&self, Parameters(params): Parameters<SearchParams>) -> String {
        self.command("search", move |window| {
            let Some(total_hits) =
                window.with_active(|tab, engine| tab.run_search(engine, &params.query))?
            else {
                return Ok(None);
            };
            let pages_with_hits = window
                .active_tab()
                .map(|t| t.search().page_count())
                .unwrap_or(0);
            Ok(Some(SearchResult {
                query: params.query,
                total_hits,
                pages_with_hits,
                current: hit_info(window),
            }))
        })
        .await
    }

    #[tool(
        description = "Go to the \"next\" or \"prev\" search hit in the active document, wrapping around at either end."
    )]
    async fn find(&self, Parameters(params): Parameters<FindParams>) -> String {
        self.command("find", move |window| {
            let moved = window.with_active(|tab, _| {
                Ok(match params.direction {
                    FindDirection::Next => tab.find_next(),
                    FindDirection::Prev => tab.find_prev(),
                })
            })?;
            Ok(moved.map(|hit| FindResult {
                hit: hit.and(hit_info(window)),
            }))
        })
        .await
    }

    #[tool(
        description = "Add highlight annotations over every search hit on the active tab's current page."
    )]
    async fn highlight_hits(&self) -> String {
        self.command("highlight_hits", |window| {
            window.with_active(|tab, engine| {
                Ok(HighlightResult {
                    highlighted: tab.add_highlight_for_current_hits(engine)?,
                    page: tab.current_page() + 1,
                })
            })
        })
        .await
    }

    #[tool(
        description = "Add a text note annotation to the active tab's current page at (x, y) in PDF points."
    )]
    async fn add_note(&self, Parameters(params): Parameters<AddNoteParams>) -> String {
        self.command("add_note", move |window| {
            window.with_active(|tab, engine| {
                tab.add_text_note(engine, params.x, params.y, &params.text)?;
                Ok(EditResult {
                    page: tab.current_page() + 1,
                    modified: tab.summary().modified,
                })
            })
        })
        .await
    }

    #[tool(
        description = "Render the active tab's current page at its zoom level as a base64 PNG. Search hits are highlighted and dark mode is applied when enabled."
    )]
    async fn render_page(&self) -> String {
        let max_pixels = self.config.max_render_pixels;
        self.command("render_page", move |window| {
            window.with_active_settings(|tab, engine, settings| {
                check_render_area(tab, engine, max_pixels)?;
                let bitmap = tab.render(engine, settings.dark_mode)?;
                let (width, height) = bitmap.image.dimensions();
                let png = encode_png(&bitmap.image)?;
                Ok(rendered_page_info(tab.current_page(), png, width, height))
            })
        })
        .await
    }

    #[tool(description = "Render small previews of every page of the active document.")]
    async fn thumbnails(&self, Parameters(params): Parameters<ThumbnailsParams>) -> String {
        let width = params.width.unwrap_or(self.config.thumbnail_width).max(1);
        let max_pixels = self.config.max_render_pixels;
        self.command("thumbnails", move |window| {
            window.with_active(|tab, engine| {
                let pages = tab
                    .thumbnails(engine, width, max_pixels)?
                    .into_iter()
                    .map(|thumb| rendered_page_info(thumb.page, thumb.png, thumb.width, thumb.height))
                    .collect();
                Ok(ThumbnailsResult { pages })
            })
        })
        .await
    }

    #[tool(description = "Write the active tab's current page to a PNG file.")]
    async fn export_page_image(
        &self,
        Parameters(params): Parameters<ExportPageImageParams>,
    ) -> String {
        let output = match self.prepare_output(&params.output_path) {
            Ok(path) => path,
            Err(e) => return respond::<()>("export_page_image", Err(e), None),
        };
        let max_pixels = self.config.max_render_pixels;
        self.command("export_page_image", move |window| {
            window.with_active(|tab, engine| {
                check_render_area(tab, engine, max_pixels)?;
                tab.export_page_png(engine, &output)?;
                Ok(serde_json::json!({
                    "output_path": params.output_path,
                    "page": tab.current_page() + 1,
                }))
            })
        })
        .await
    }

    #[tool(
        description = "Save the active document to a new file, optionally encrypted with AES-256 (user_password to open, owner_password for permissions). The tab then refers to the saved file."
    )]
    async fn save_as(&self, Parameters(params): Parameters<SaveAsParams>) -> String {
        let output = match self.prepare_output(&params.output_path) {
            Ok(path) => path,
            Err(e) => return respond::<()>("save_as", Err(e), None),
        };
        let protection = protection_from(params.user_password, params.owner_password);
        self.command("save_as", move |window| {
            window.with_active(|tab, engine| {
                tab.save_as(engine, &output, protection.as_ref())?;
                Ok(OutputResult {
                    output_path: params.output_path,
                    page_count: tab.page_count(),
                    encrypted: protection.is_some(),
                })
            })
        })
        .await
    }

    #[tool(
        description = "Write selected pages of the active document to a new PDF. Page ranges look like \"1-3,5,7-9\"; order and repeats are kept, and pages past the end are clamped to the last page."
    )]
    async fn extract_pages(&self, Parameters(params): Parameters<ExtractPagesParams>) -> String {
        let output = match self.prepare_output(&params.output_path) {
            Ok(path) => path,
            Err(e) => return respond::<()>("extract_pages", Err(e), None),
        };
        self.command("extract_pages", move |window| {
            window.with_active(|tab, engine| {
                let page_count = tab.extract_pages(engine, &output, &params.pages)?;
                Ok(OutputResult {
                    output_path: params.output_path,
                    page_count,
                    encrypted: false,
                })
            })
        })
        .await
    }

    #[tool(
        description = "Reorder the pages of the active document. `order` lists every page number exactly once, e.g. [3, 1, 2]. The change stays in memory until save_as."
    )]
    async fn reorder_pages(&self, Parameters(params): Parameters<ReorderPagesParams>) -> String {
        self.command("reorder_pages", move |window| {
            window.with_active(|tab, engine| {
                let order = params
                    .order
                    .iter()
                    .map(|&p| {
                        (p as usize).checked_sub(1).ok_or(Error::PageOutOfBounds {
                            page: p,
                            total: tab.page_count() as u32,
                        })
                    })
                    .collect::<crate::error::Result<Vec<_>>>()?;
                tab.reorder_pages(engine, &order)?;
                Ok(tab.summary())
            })
        })
        .await
    }

    #[tool(
        description = "Concatenate PDF files into one new file, optionally password protected. Open tabs are not affected."
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let inputs = match params
            .paths
            .iter()
            .map(|p| self.validate_path_access(p))
            .collect::<crate::error::Result<Vec<_>>>()
        {
            Ok(inputs) => inputs,
            Err(e) => return respond::<()>("merge_pdfs", Err(e), None),
        };
        let output = match self.prepare_output(&params.output_path) {
            Ok(path) => path,
            Err(e) => return respond::<()>("merge_pdfs", Err(e), None),
        };
        if inputs.is_empty() {
            return respond::<()>(
                "merge_pdfs",
                Err(Error::InvalidArgument {
                    reason: "no input files".to_string(),
                }),
                None,
            );
        }

        let protection = protection_from(params.user_password, params.owner_password);
        self.command("merge_pdfs", move |window| {
            let page_count = window.merge_files(&inputs, &output, protection.as_ref())?;
            Ok(Some(OutputResult {
                output_path: params.output_path,
                page_count,
                encrypted: protection.is_some(),
            }))
        })
        .await
    }

    #[tool(description = "Show metadata and page count of the active document.")]
    async fn document_info(&self) -> String {
        self.command("document_info", |window| {
            window.with_active(|tab, _| {
                Ok(DocumentInfoResult {
                    tab: tab.summary(),
                    metadata: tab.info().metadata.clone(),
                    encrypted: tab.document().is_encrypted(),
                })
            })
        })
        .await
    }

    #[tool(description = "Turn dark mode (inverted page colors) on or off. The setting is saved.")]
    async fn set_dark_mode(&self, Parameters(params): Parameters<SetDarkModeParams>) -> String {
        let config = Arc::clone(&self.config);
        self.command("set_dark_mode", move |window| {
            let changed = window.settings().dark_mode != params.enabled;
            if changed {
                // Persist first so a failed save leaves the session unchanged
                if let Some(store) = &config.settings_store {
                    let mut updated = window.settings().clone();
                    updated.dark_mode = params.enabled;
                    store.save(&updated)?;
                }
                window.set_dark_mode(params.enabled);
            }
            Ok(Some(DarkModeResult {
                dark_mode: window.settings().dark_mode,
                changed,
            }))
        })
        .await
    }

    #[tool(description = "Show the status line: active document, page, zoom, and search position.")]
    async fn status(&self) -> String {
        self.command("status", |window| Ok(Some::<WindowStatus>(window.status())))
            .await
    }
}

impl PdfDeskServer {
    /// Run a command against the window on the blocking pool and answer
    /// with its result plus the resulting status line.
    async fn command<T, F>(&self, tool: &'static str, f: F) -> String
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&mut Window) -> crate::error::Result<Option<T>> + Send + 'static,
    {
        let window = Arc::clone(&self.window);
        let joined = tokio::task::spawn_blocking(move || {
            let mut window = window.lock();
            let result = f(&mut window);
            (result, window.status().to_string())
        })
        .await;

        match joined {
            Ok((result, status)) => respond(tool, result, Some(status)),
            Err(e) => respond::<T>(
                tool,
                Err(Error::Internal {
                    reason: format!("Task join error: {}", e),
                }),
                None,
            ),
        }
    }

    /// Current settings, for saving at shutdown
    pub fn settings(&self) -> Settings {
        self.window.lock().settings().clone()
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = path_obj.parent().unwrap_or(Path::new("."));

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate an output path and create its parent directories
    fn prepare_output(&self, path: &str) -> crate::error::Result<PathBuf> {
        let resolved = self.validate_output_path_access(path)?;
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(resolved)
    }

    fn process_list_pdfs(&self, params: &ListPdfsParams) -> crate::error::Result<ListPdfsResult> {
        // Sandbox check: if resource_dirs are configured, directory must be within them
        if !self.config.resource_dirs.is_empty() {
            self.validate_path_access(&params.directory)?;
        }

        let dir_path = Path::new(&params.directory);

        if !dir_path.exists() {
            return Err(Error::PdfNotFound {
                path: params.directory.clone(),
            });
        }

        if !dir_path.is_dir() {
            return Err(Error::InvalidPdf {
                reason: format!("{} is not a directory", params.directory),
            });
        }

        let mut files = Vec::new();

        let pattern = params
            .pattern
            .as_ref()
            .and_then(|p| glob::Pattern::new(p).ok());

        Self::collect_pdfs(dir_path, params.recursive, &pattern, &mut files)?;

        // Sort by path for consistent ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let total_count = files.len() as u32;

        Ok(ListPdfsResult {
            directory: params.directory.clone(),
            files,
            total_count,
            error: None,
        })
    }

    fn collect_pdfs(
        dir: &Path,
        recursive: bool,
        pattern: &Option<glob::Pattern>,
        files: &mut Vec<PdfFileInfo>,
    ) -> crate::error::Result<()> {
        let entries = std::fs::read_dir(dir).map_err(Error::Io)?;

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                if recursive {
                    // Unreadable subdirectories are skipped
                    let _ = Self::collect_pdfs(&path, recursive, pattern, files);
                }
                continue;
            }

            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !path.is_file() || !is_pdf {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if let Some(ref pat) = pattern {
                if !pat.matches(&name) {
                    continue;
                }
            }

            let metadata = std::fs::metadata(&path).ok();
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| {
                    chrono::DateTime::from_timestamp(d.as_secs() as i64, 0)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_default()
                });

            files.push(PdfFileInfo {
                path: path.to_string_lossy().to_string(),
                name,
                size,
                modified,
            });
        }

        Ok(())
    }
}

impl Default for PdfDeskServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfDeskServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "pdf-desk keeps a window of open PDF tabs. Open files with open_pdfs, then \
                 navigate, zoom, search and edit the active tab; render_page returns the \
                 current view as a PNG."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration. Settings are saved again
/// when the client disconnects.
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let store = config.settings_store.clone();
    let server = PdfDeskServer::with_config(config);
    let handle = server.clone();

    tracing::info!("pdf-desk ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    if let Some(store) = store {
        store.save(&handle.settings())?;
    }
    tracing::info!("pdf-desk shut down");

    Ok(())
}

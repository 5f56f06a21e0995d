//! Window-level coordinator: the open tabs and which one is active

use super::document::{read_pdf_file, DocumentHandle};
use super::tab::{Tab, TabId, TabSummary};
use crate::config::Settings;
use crate::engine::{PdfData, PdfEngine, Protection};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supplies a password when an opened file turns out to be encrypted
pub trait PasswordPrompt {
    /// Ask for the password of `path`; `None` cancels the open
    fn request_password(&mut self, path: &Path) -> Option<String>;
}

/// Prompt that never has a password
pub struct NoPassword;

impl PasswordPrompt for NoPassword {
    fn request_password(&mut self, _path: &Path) -> Option<String> {
        None
    }
}

/// Prompt answered up front: every encrypted file in a batch is tried with
/// the same password.
pub struct PresetPassword(pub Option<String>);

impl PasswordPrompt for PresetPassword {
    fn request_password(&mut self, _path: &Path) -> Option<String> {
        self.0.clone()
    }
}

/// Outcome of opening one file of a batch
#[derive(Debug)]
pub struct OpenOutcome {
    pub path: PathBuf,
    pub result: Result<TabId>,
}

/// Search position shown in the status line
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatus {
    pub query: String,
    /// 1-indexed, 0 when there are no hits
    pub current: usize,
    pub total: usize,
}

/// Snapshot of the window for the status line
#[derive(Debug, Clone, Serialize)]
pub struct WindowStatus {
    pub tab_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<TabSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchStatus>,
    pub dark_mode: bool,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(tab) = &self.active else {
            return write!(f, "No document open");
        };
        write!(
            f,
            "{}{} | Page {}/{} | {:.0}%",
            tab.name,
            if tab.modified { " *" } else { "" },
            tab.page,
            tab.page_count,
            tab.zoom * 100.0
        )?;
        if let Some(search) = &self.search {
            write!(
                f,
                " | \"{}\" {}/{}",
                search.query, search.current, search.total
            )?;
        }
        Ok(())
    }
}

/// Ordered tabs plus the active-tab pointer.
///
/// Commands aimed at "the document" go to the active tab; with no tab open
/// they do nothing and return `Ok(None)`.
pub struct Window {
    engine: Arc<dyn PdfEngine>,
    settings: Settings,
    tabs: Vec<Tab>,
    active: Option<usize>,
}

impl Window {
    pub fn new(engine: Arc<dyn PdfEngine>, settings: Settings) -> Self {
        Self {
            engine,
            settings,
            tabs: Vec::new(),
            active: None,
        }
    }

    pub fn engine(&self) -> &dyn PdfEngine {
        self.engine.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns whether the setting changed
    pub fn set_dark_mode(&mut self, enabled: bool) -> bool {
        let changed = self.settings.dark_mode != enabled;
        self.settings.dark_mode = enabled;
        changed
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_summaries(&self) -> Vec<TabSummary> {
        self.tabs.iter().map(Tab::summary).collect()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.and_then(|i| self.tabs.get(i))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_tab().map(Tab::id)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.tabs
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| Error::TabNotFound { id: id.to_string() })
    }

    // ------------------------------------------------------------------
    // Opening and closing
    // ------------------------------------------------------------------

    /// Open every file in `paths`. Failures are reported per file and do not
    /// stop the rest of the batch. The last file opened becomes active.
    pub fn open_files(
        &mut self,
        paths: &[PathBuf],
        prompt: &mut dyn PasswordPrompt,
    ) -> Vec<OpenOutcome> {
        paths
            .iter()
            .map(|path| {
                let result = self.open_file(path, prompt);
                if let Err(e) = &result {
                    tracing::warn!(path = %path.display(), error = %e, "open failed");
                }
                OpenOutcome {
                    path: path.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Open one file in a new, active tab. An encrypted file triggers a
    /// single password request and one retry.
    pub fn open_file(&mut self, path: &Path, prompt: &mut dyn PasswordPrompt) -> Result<TabId> {
        let bytes = read_pdf_file(path)?;
        let engine = self.engine.as_ref();

        let document = match DocumentHandle::from_bytes(engine, path.to_path_buf(), bytes.clone(), None)
        {
            Err(Error::PasswordRequired) => {
                tracing::debug!(path = %path.display(), "password required");
                let password = prompt
                    .request_password(path)
                    .ok_or(Error::PasswordRequired)?;
                DocumentHandle::from_bytes(engine, path.to_path_buf(), bytes, Some(&password))
                    .map_err(|e| match e {
                        // A second refusal is always the password's fault
                        Error::PasswordRequired => Error::IncorrectPassword,
                        other => other,
                    })?
            }
            other => other?,
        };

        let tab = Tab::new(document);
        let id = tab.id().to_string();
        self.tabs.push(tab);
        self.active = Some(self.tabs.len() - 1);
        tracing::info!(path = %path.display(), tab = %id, "tab opened");
        Ok(id)
    }

    /// Make the tab with `id` active
    pub fn switch_to(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        self.active = Some(index);
        Ok(())
    }

    /// Close a tab and release its document.
    ///
    /// If the closed tab was active, its left neighbour becomes active; the
    /// leftmost tab hands over to the tab that takes its place. Closing the
    /// last tab leaves no active tab.
    pub fn close_tab(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        self.tabs.remove(index);

        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if active == index => Some(index.saturating_sub(1)),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        tracing::info!(tab = %id, remaining = self.tabs.len(), "tab closed");
        Ok(())
    }

    /// Close the active tab, if any; returns the closed tab's id
    pub fn close_active(&mut self) -> Result<Option<TabId>> {
        let Some(id) = self.active_id().map(str::to_string) else {
            return Ok(None);
        };
        self.close_tab(&id)?;
        Ok(Some(id))
    }

    // ------------------------------------------------------------------
    // Command routing
    // ------------------------------------------------------------------

    /// Run a command against the active tab. No active tab is a no-op.
    pub fn with_active<T>(
        &mut self,
        f: impl FnOnce(&mut Tab, &dyn PdfEngine) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(tab) = self.active.and_then(|i| self.tabs.get_mut(i)) else {
            return Ok(None);
        };
        f(tab, self.engine.as_ref()).map(Some)
    }

    /// Like [`Window::with_active`], also handing over the settings
    pub fn with_active_settings<T>(
        &mut self,
        f: impl FnOnce(&mut Tab, &dyn PdfEngine, &Settings) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(tab) = self.active.and_then(|i| self.tabs.get_mut(i)) else {
            return Ok(None);
        };
        f(tab, self.engine.as_ref(), &self.settings).map(Some)
    }

    pub fn status(&self) -> WindowStatus {
        let active = self.active_tab();
        WindowStatus {
            tab_count: self.tabs.len(),
            active: active.map(Tab::summary),
            search: active
                .map(Tab::search)
                .filter(|s| !s.query().is_empty())
                .map(|s| SearchStatus {
                    query: s.query().to_string(),
                    current: s.current_index().map(|i| i + 1).unwrap_or(0),
                    total: s.hit_count(),
                }),
            dark_mode: self.settings.dark_mode,
        }
    }

    // ------------------------------------------------------------------
    // Multi-document operations
    // ------------------------------------------------------------------

    /// Concatenate files into `output`, optionally password protected.
    /// Returns the page count of the result.
    pub fn merge_files(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        protection: Option<&Protection>,
    ) -> Result<usize> {
        let contents = inputs
            .iter()
            .map(read_pdf_file)
            .collect::<Result<Vec<_>>>()?;
        let docs: Vec<PdfData<'_>> = contents.iter().map(|b| PdfData::new(b, None)).collect();

        let engine = self.engine.as_ref();
        let mut merged = engine.merge(&docs)?;
        if let Some(protection) = protection {
            merged = engine.write(PdfData::new(&merged, None), Some(protection))?;
        }

        let password = protection.map(|p| p.user_password.as_str());
        let page_count = engine.load(PdfData::new(&merged, password))?.page_count;

        std::fs::write(output, &merged)?;
        tracing::info!(inputs = inputs.len(), output = %output.display(), "files merged");
        Ok(page_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeDoc, FakeEngine};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        window: Window,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                window: Window::new(Arc::new(FakeEngine::new()), Settings::default()),
            }
        }

        fn write(&self, name: &str, doc: &FakeDoc) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, doc.to_bytes()).unwrap();
            path
        }

        fn open(&mut self, name: &str, texts: &[&str]) -> TabId {
            let path = self.write(name, &FakeDoc::with_pages(texts));
            self.window.open_file(&path, &mut NoPassword).unwrap()
        }
    }

    /// Counts how often it was asked
    struct CountingPrompt {
        password: Option<String>,
        asked: usize,
    }

    impl PasswordPrompt for CountingPrompt {
        fn request_password(&mut self, _path: &Path) -> Option<String> {
            self.asked += 1;
            self.password.clone()
        }
    }

    #[test]
    fn test_commands_without_tabs_are_noops() {
        let mut fx = Fixture::new();
        let result = fx.window.with_active(|tab, _| Ok(tab.next_page())).unwrap();
        assert_eq!(result, None);
        assert_eq!(fx.window.close_active().unwrap(), None);
        assert_eq!(fx.window.status().to_string(), "No document open");
    }

    #[test]
    fn test_open_makes_tab_active() {
        let mut fx = Fixture::new();
        let first = fx.open("a.pdf", &["a"]);
        let second = fx.open("b.pdf", &["b", "b"]);
        assert_eq!(fx.window.tabs().len(), 2);
        assert_eq!(fx.window.active_id(), Some(second.as_str()));

        fx.window.switch_to(&first).unwrap();
        assert_eq!(fx.window.active_id(), Some(first.as_str()));
        assert!(matches!(
            fx.window.switch_to("missing"),
            Err(Error::TabNotFound { .. })
        ));
    }

    #[test]
    fn test_commands_route_to_active_tab_only() {
        let mut fx = Fixture::new();
        let first = fx.open("a.pdf", &["1", "2", "3"]);
        fx.open("b.pdf", &["1", "2", "3"]);

        fx.window.with_active(|tab, _| Ok(tab.last_page())).unwrap();

        let pages: Vec<usize> = fx.window.tabs().iter().map(Tab::current_page).collect();
        assert_eq!(pages, vec![0, 2]);

        fx.window.switch_to(&first).unwrap();
        assert_eq!(fx.window.status().active.unwrap().page, 1);
    }

    #[test]
    fn test_batch_open_reports_each_file() {
        let mut fx = Fixture::new();
        let good = fx.write("good.pdf", &FakeDoc::with_pages(&["x"]));
        let corrupt = fx.dir.path().join("corrupt.pdf");
        std::fs::write(&corrupt, b"%PDF-1.7 truncated").unwrap();
        let missing = fx.dir.path().join("missing.pdf");

        let outcomes = fx
            .window
            .open_files(&[corrupt, good, missing], &mut NoPassword);

        assert!(matches!(outcomes[0].result, Err(Error::InvalidPdf { .. })));
        assert!(outcomes[1].result.is_ok());
        assert!(matches!(outcomes[2].result, Err(Error::PdfNotFound { .. })));
        assert_eq!(fx.window.tabs().len(), 1);
    }

    #[test]
    fn test_password_prompted_once_and_retried() {
        let mut fx = Fixture::new();
        let path = fx.write(
            "locked.pdf",
            &FakeDoc::with_pages(&["secret"]).encrypted("hunter2"),
        );

        let mut prompt = CountingPrompt {
            password: Some("hunter2".to_string()),
            asked: 0,
        };
        fx.window.open_file(&path, &mut prompt).unwrap();
        assert_eq!(prompt.asked, 1);
        assert_eq!(fx.window.tabs().len(), 1);
    }

    #[test]
    fn test_password_failures_are_distinct() {
        let mut fx = Fixture::new();
        fx.open("other.pdf", &["keep me"]);
        let path = fx.write("locked.pdf", &FakeDoc::with_pages(&["s"]).encrypted("right"));

        let mut cancel = CountingPrompt {
            password: None,
            asked: 0,
        };
        assert!(matches!(
            fx.window.open_file(&path, &mut cancel),
            Err(Error::PasswordRequired)
        ));

        let mut wrong = CountingPrompt {
            password: Some("wrong".to_string()),
            asked: 0,
        };
        assert!(matches!(
            fx.window.open_file(&path, &mut wrong),
            Err(Error::IncorrectPassword)
        ));
        assert_eq!(wrong.asked, 1);

        // Failed opens leave the existing tab alone
        assert_eq!(fx.window.tabs().len(), 1);
        assert_eq!(fx.window.status().active.unwrap().name, "other.pdf");
    }

    #[test]
    fn test_close_active_selects_left_neighbour() {
        let mut fx = Fixture::new();
        let a = fx.open("a.pdf", &["a"]);
        let b = fx.open("b.pdf", &["b"]);
        let c = fx.open("c.pdf", &["c"]);

        fx.window.switch_to(&b).unwrap();
        fx.window.close_tab(&b).unwrap();
        assert_eq!(fx.window.active_id(), Some(a.as_str()));

        fx.window.close_tab(&a).unwrap();
        assert_eq!(fx.window.active_id(), Some(c.as_str()));

        fx.window.close_tab(&c).unwrap();
        assert_eq!(fx.window.active_id(), None);
    }

    #[test]
    fn test_close_leftmost_active_selects_next() {
        let mut fx = Fixture::new();
        let a = fx.open("a.pdf", &["a"]);
        let b = fx.open("b.pdf", &["b"]);
        fx.window.switch_to(&a).unwrap();
        fx.window.close_tab(&a).unwrap();
        assert_eq!(fx.window.active_id(), Some(b.as_str()));
    }

    #[test]
    fn test_close_inactive_keeps_active() {
        let mut fx = Fixture::new();
        let a = fx.open("a.pdf", &["a"]);
        let b = fx.open("b.pdf", &["b"]);
        let c = fx.open("c.pdf", &["c"]);

        fx.window.close_tab(&a).unwrap();
        assert_eq!(fx.window.active_id(), Some(c.as_str()));

        fx.window.switch_to(&b).unwrap();
        fx.window.close_tab(&c).unwrap();
        assert_eq!(fx.window.active_id(), Some(b.as_str()));
    }

    #[test]
    fn test_status_line() {
        let mut fx = Fixture::new();
        fx.open("report.pdf", &["alpha beta", "beta"]);
        fx.window
            .with_active(|tab, engine| {
                tab.zoom_in();
                tab.run_search(engine, "beta")
            })
            .unwrap();

        let status = fx.window.status();
        assert_eq!(status.to_string(), "report.pdf | Page 1/2 | 125% | \"beta\" 1/2");
        assert!(!status.dark_mode);
    }

    #[test]
    fn test_dark_mode_toggle() {
        let mut fx = Fixture::new();
        assert!(fx.window.set_dark_mode(true));
        assert!(!fx.window.set_dark_mode(true));
        assert!(fx.window.settings().dark_mode);
        assert!(fx.window.status().dark_mode);
    }

    #[test]
    fn test_merge_files_with_protection() {
        let fx = Fixture::new();
        let a = fx.write("a.pdf", &FakeDoc::with_pages(&["a1", "a2"]));
        let b = fx.write("b.pdf", &FakeDoc::with_pages(&["b1"]));
        let out = fx.dir.path().join("merged.pdf");
        let protection = Protection {
            user_password: "pw".to_string(),
            owner_password: None,
        };

        let pages = fx.window.merge_files(&[a, b], &out, Some(&protection)).unwrap();
        assert_eq!(pages, 3);

        let merged = FakeDoc::from_bytes(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(merged.password.as_deref(), Some("pw"));
        let texts: Vec<&str> = merged.pages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a1", "a2", "b1"]);
    }
}

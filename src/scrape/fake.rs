//! In-memory browser serving fixture pages, for tests that exercise the
//! extraction engine and the runner without a WebDriver endpoint.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::scrape::page::{Browser, BrowserPage};

/// Serves one fixed play-view page and an ordered list of battle-log pages.
/// Every navigation and screenshot is recorded so tests can assert ordering.
pub struct FakeBrowser {
    play_html: String,
    log_pages: Vec<String>,
    has_performance_tab: bool,
    fail_on_battle_log: bool,
    visited: Arc<Mutex<Vec<String>>>,
    screenshots: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeBrowser {
    pub fn new(play_html: impl Into<String>, log_pages: Vec<String>) -> Self {
        Self {
            play_html: play_html.into(),
            log_pages,
            has_performance_tab: true,
            fail_on_battle_log: false,
            visited: Arc::new(Mutex::new(Vec::new())),
            screenshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate markup drift that removed the achievements tab.
    pub fn without_performance_tab(mut self) -> Self {
        self.has_performance_tab = false;
        self
    }

    /// Fail navigation to the battle log, for exercising run failure paths.
    pub fn failing_on_battle_log(mut self) -> Self {
        self.fail_on_battle_log = true;
        self
    }

    /// URLs navigated to, in order, across all pages this browser opened.
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.screenshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, ScrapeError> {
        Ok(Box::new(FakePage {
            play_html: self.play_html.clone(),
            log_pages: self.log_pages.clone(),
            has_performance_tab: self.has_performance_tab,
            fail_on_battle_log: self.fail_on_battle_log,
            on_battle_log: false,
            current_page: 0,
            visited: Arc::clone(&self.visited),
            screenshots: Arc::clone(&self.screenshots),
        }))
    }
}

struct FakePage {
    play_html: String,
    log_pages: Vec<String>,
    has_performance_tab: bool,
    fail_on_battle_log: bool,
    on_battle_log: bool,
    current_page: usize,
    visited: Arc<Mutex<Vec<String>>>,
    screenshots: Arc<Mutex<Vec<PathBuf>>>,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.visited.lock().unwrap().push(url.to_string());
        if self.fail_on_battle_log && url.contains("battlelog") {
            return Err(ScrapeError::Session(format!("{url} unreachable")));
        }
        self.on_battle_log = url.contains("battlelog");
        self.current_page = 0;
        Ok(())
    }

    async fn clear_obstructions(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn click_text(&mut self, _text: &str) -> Result<bool, ScrapeError> {
        Ok(self.has_performance_tab)
    }

    async fn click_next(&mut self) -> Result<bool, ScrapeError> {
        if self.on_battle_log && self.current_page + 1 < self.log_pages.len() {
            self.current_page += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        if self.on_battle_log {
            Ok(self
                .log_pages
                .get(self.current_page)
                .cloned()
                .unwrap_or_default())
        } else {
            Ok(self.play_html.clone())
        }
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), ScrapeError> {
        self.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn close(self: Box<Self>) {}
}

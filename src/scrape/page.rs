use std::path::Path;

use async_trait::async_trait;

use crate::error::ScrapeError;

/// Opens authenticated browser pages. The WebDriver implementation lives in
/// [`crate::scrape::webdriver`]; tests drive the engine through
/// [`crate::scrape::fake::FakeBrowser`] instead.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, ScrapeError>;
}

/// One browser tab with the named interactions the extraction engine needs.
/// Methods that look for an element report absence as `Ok(false)` so that
/// markup drift degrades the run instead of aborting it.
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigate and wait for the document to load.
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Remove cookie-consent and promo overlays that intercept clicks.
    async fn clear_obstructions(&mut self) -> Result<(), ScrapeError>;

    /// Click the first visible element containing `text`. Returns false when
    /// no such element exists.
    async fn click_text(&mut self, text: &str) -> Result<bool, ScrapeError>;

    /// Click the battle log's "next page" control. Returns false when the
    /// control is absent or disabled.
    async fn click_next(&mut self) -> Result<bool, ScrapeError>;

    /// Rendered HTML of the current page.
    async fn content(&mut self) -> Result<String, ScrapeError>;

    /// Screenshot of the current viewport written to `path`.
    async fn screenshot(&mut self, path: &Path) -> Result<(), ScrapeError>;

    /// Best-effort teardown of the tab and its session.
    async fn close(self: Box<Self>);
}

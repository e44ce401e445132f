//! WebDriver-backed implementation of the browser traits.
//!
//! Each run opens a fresh session against the configured WebDriver endpoint,
//! installs the persisted cookies, and tears the session down afterwards.
//! The cookie file is read-only here; it is refreshed out of band.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ScrapeError;
use crate::scrape::page::{Browser, BrowserPage};

/// Upper bound on a single navigation. The target sometimes never fires the
/// load event; without a bound one stuck page parks the whole trigger loop.
const NAV_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0 Safari/537.36";

const CLEAR_OBSTRUCTIONS_JS: &str = r#"
    document.querySelectorAll('#CybotCookiebotDialog, [class*="praise_"]')
        .forEach(el => el.remove());
"#;

/// Playwright-style storage state: a cookie jar persisted as JSON.
#[derive(Deserialize)]
struct StorageState {
    #[serde(default)]
    cookies: Vec<StoredCookie>,
}

#[derive(Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(rename = "httpOnly", default)]
    http_only: bool,
}

pub struct WebDriverBrowser {
    webdriver_url: String,
    session_path: PathBuf,
    /// Origin visited before installing cookies; WebDriver only accepts
    /// cookies for the current document's domain.
    origin: String,
}

impl WebDriverBrowser {
    pub fn new(
        webdriver_url: impl Into<String>,
        session_path: impl Into<PathBuf>,
        profile_base: &str,
    ) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            session_path: session_path.into(),
            origin: origin_of(profile_base),
        }
    }

    fn load_session_state(&self) -> Result<StorageState, ScrapeError> {
        let raw = std::fs::read_to_string(&self.session_path).map_err(|e| {
            ScrapeError::SessionState(format!("{}: {e}", self.session_path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ScrapeError::SessionState(format!("{}: {e}", self.session_path.display()))
        })
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, ScrapeError> {
        let state = self.load_session_state()?;

        let mut caps = serde_json::map::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": [
                    "--headless=new",
                    "--no-sandbox",
                    "--disable-blink-features=AutomationControlled",
                    "--window-size=1280,1200",
                    "--lang=ja-JP",
                    format!("--user-agent={USER_AGENT}"),
                ]
            }),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| ScrapeError::Session(e.to_string()))?;

        // Land on the target origin first so the cookies are accepted.
        bounded_goto(client.goto(&self.origin), &self.origin).await?;
        for stored in state.cookies {
            let mut cookie = Cookie::new(stored.name.clone(), stored.value);
            if !stored.domain.is_empty() {
                cookie.set_domain(stored.domain.trim_start_matches('.').to_string());
            }
            if !stored.path.is_empty() {
                cookie.set_path(stored.path);
            }
            cookie.set_secure(stored.secure);
            cookie.set_http_only(stored.http_only);
            if let Err(e) = client.add_cookie(cookie).await {
                debug!("cookie '{}' rejected: {e}", stored.name);
            }
        }

        Ok(Box::new(WebDriverPage { client }))
    }
}

struct WebDriverPage {
    client: Client,
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        bounded_goto(self.client.goto(url), url).await
    }

    async fn clear_obstructions(&mut self) -> Result<(), ScrapeError> {
        self.client.execute(CLEAR_OBSTRUCTIONS_JS, vec![]).await?;
        Ok(())
    }

    async fn click_text(&mut self, text: &str) -> Result<bool, ScrapeError> {
        let xpath = format!(
            "//li[contains(normalize-space(.), '{text}')] | \
             //button[contains(normalize-space(.), '{text}')]"
        );
        click_if_present(&self.client, Locator::XPath(&xpath)).await
    }

    async fn click_next(&mut self) -> Result<bool, ScrapeError> {
        click_if_present(&self.client, Locator::Css("li.next:not(.disabled)")).await
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        Ok(self.client.source().await?)
    }

    /// WebDriver screenshots cover the viewport only, not the full document;
    /// the window is opened 1280x1200 so the panels of interest fit in view.
    async fn screenshot(&mut self, path: &Path) -> Result<(), ScrapeError> {
        let png = self.client.screenshot().await?;
        std::fs::write(path, png)?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let _ = self.client.close().await;
    }
}

async fn bounded_goto<F>(nav: F, url: &str) -> Result<(), ScrapeError>
where
    F: Future<Output = Result<(), CmdError>>,
{
    match tokio::time::timeout(NAV_TIMEOUT, nav).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ScrapeError::Session(format!(
            "navigation to {url} timed out after {}s",
            NAV_TIMEOUT.as_secs()
        ))),
    }
}

async fn click_if_present(client: &Client, locator: Locator<'_>) -> Result<bool, ScrapeError> {
    match client.find(locator).await {
        Ok(element) => {
            if !element.is_displayed().await.unwrap_or(false) {
                return Ok(false);
            }
            element.click().await?;
            Ok(true)
        }
        Err(e) if e.is_no_such_element() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// `scheme://host` part of a URL, used as the cookie-install landing page.
fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => url[..scheme_end + 3 + path_start].to_string(),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}

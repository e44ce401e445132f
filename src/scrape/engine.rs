use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{MatchRecord, PerformanceStats, Subject};
use crate::scrape::page::{Browser, BrowserPage};
use crate::scrape::parse;

/// Pacing and artifact paths for a scrape run. The defaults mirror the
/// target's observed rendering behavior; tests zero the delays.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base profile URL, `{base}/{user_code}/play` etc.
    pub profile_base: String,
    /// Fixed settle after navigation; the target renders asynchronously
    /// after the load event fires.
    pub settle: Duration,
    /// Randomized wait after opening the achievements tab.
    pub tab_settle: (Duration, Duration),
    /// Extra wait before scanning each battle-log page.
    pub scan_settle: Duration,
    /// Randomized wait after paginating, to break up automation cadence.
    pub page_settle: (Duration, Duration),
    pub screenshot_path: PathBuf,
    pub error_screenshot_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile_base: "https://www.streetfighter.com/6/buckler/ja-jp/profile".to_string(),
            settle: Duration::from_secs(5),
            tab_settle: (Duration::from_secs(4), Duration::from_secs(6)),
            scan_settle: Duration::from_secs(2),
            page_settle: (Duration::from_secs(3), Duration::from_secs(5)),
            screenshot_path: PathBuf::from("./debug_full_screen.png"),
            error_screenshot_path: PathBuf::from("./debug_error_screen.png"),
        }
    }
}

impl EngineConfig {
    /// Zero-delay config for fixture-driven tests.
    pub fn instant(profile_base: impl Into<String>) -> Self {
        Self {
            profile_base: profile_base.into(),
            settle: Duration::ZERO,
            tab_settle: (Duration::ZERO, Duration::ZERO),
            scan_settle: Duration::ZERO,
            page_settle: (Duration::ZERO, Duration::ZERO),
            ..Self::default()
        }
    }
}

/// Everything one run accumulated. `snapshot` stays `None` when the
/// achievements tab could not be located.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub snapshot: Option<PerformanceStats>,
    pub matches: Vec<MatchRecord>,
}

/// Drives one browser tab through a subject's play view and paginated
/// battle log. Failures inside a run are returned as a single `ScrapeError`;
/// the accumulated data is discarded and the caller logs the outcome.
pub struct ScrapeEngine {
    browser: Arc<dyn Browser>,
    cfg: EngineConfig,
}

impl ScrapeEngine {
    pub fn new(browser: Arc<dyn Browser>, cfg: EngineConfig) -> Self {
        Self { browser, cfg }
    }

    pub async fn scrape(
        &self,
        subject: &Subject,
        max_pages: u32,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let mut page = self.browser.open_page().await?;
        let result = self.scrape_with(page.as_mut(), subject, max_pages).await;
        if result.is_err() {
            if let Err(e) = page.screenshot(&self.cfg.error_screenshot_path).await {
                warn!("error screenshot failed: {e}");
            }
        }
        page.close().await;
        result
    }

    async fn scrape_with(
        &self,
        page: &mut dyn BrowserPage,
        subject: &Subject,
        max_pages: u32,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let play_url = format!("{}/{}/play", self.cfg.profile_base, subject.user_code);
        page.goto(&play_url).await?;
        tokio::time::sleep(self.cfg.settle).await;
        page.clear_obstructions().await?;

        let snapshot = if page.click_text(parse::PERFORMANCE_TAB_LABEL).await? {
            sleep_range(self.cfg.tab_settle).await;
            let html = page.content().await?;
            Some(parse::parse_performance(&html))
        } else {
            warn!(
                user_code = %subject.user_code,
                "achievements tab not found, skipping snapshot"
            );
            None
        };

        let log_url = format!(
            "{}/{}/battlelog/rank#profile_nav",
            self.cfg.profile_base, subject.user_code
        );
        page.goto(&log_url).await?;
        tokio::time::sleep(self.cfg.settle).await;

        let mut matches = Vec::new();
        for page_no in 1..=max_pages {
            info!(page = page_no, "scanning battle log");
            tokio::time::sleep(self.cfg.scan_settle).await;
            let html = page.content().await?;
            matches.extend(parse::parse_battle_rows(&html));

            if page_no < max_pages {
                if page.click_next().await? {
                    sleep_range(self.cfg.page_settle).await;
                } else {
                    break;
                }
            }
        }

        if let Err(e) = page.screenshot(&self.cfg.screenshot_path).await {
            warn!("screenshot failed: {e}");
        }

        Ok(ScrapeOutcome { snapshot, matches })
    }
}

async fn sleep_range((lo, hi): (Duration, Duration)) {
    let wait = if hi > lo {
        rand::thread_rng().gen_range(lo..=hi)
    } else {
        lo
    };
    tokio::time::sleep(wait).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::fake::FakeBrowser;

    fn log_page(date: &str, p1: &str, p2: &str) -> String {
        format!(
            r#"<html><body><ul><li data-index="0">
               <div class="battle_data_date__x">{date}</div>
               <span class="battle_data_name_p1__x">{p1}</span>
               <span class="battle_data_name_p2__x">{p2}</span>
               </li></ul></body></html>"#
        )
    }

    fn engine_for(browser: &Arc<FakeBrowser>) -> ScrapeEngine {
        let browser = Arc::clone(browser) as Arc<dyn crate::scrape::page::Browser>;
        ScrapeEngine::new(browser, EngineConfig::instant("https://fixture.test/profile"))
    }

    fn subject() -> Subject {
        Subject::unregistered("1111111111")
    }

    #[tokio::test]
    async fn pagination_stops_when_next_control_disappears() {
        let pages = vec![
            log_page("2024/05/12 21:00", "A1", "B1"),
            log_page("2024/05/12 21:10", "A2", "B2"),
            log_page("2024/05/12 21:20", "A3", "B3"),
        ];
        let browser = Arc::new(FakeBrowser::new("<html></html>", pages));
        let engine = engine_for(&browser);

        let outcome = engine.scrape(&subject(), 10).await.unwrap();
        assert_eq!(outcome.matches.len(), 3);
        assert_eq!(outcome.matches[0].p1.name, "A1");
        assert_eq!(outcome.matches[2].p1.name, "A3");
    }

    #[tokio::test]
    async fn pagination_respects_max_pages() {
        let pages = vec![
            log_page("2024/05/12 21:00", "A1", "B1"),
            log_page("2024/05/12 21:10", "A2", "B2"),
            log_page("2024/05/12 21:20", "A3", "B3"),
        ];
        let browser = Arc::new(FakeBrowser::new("<html></html>", pages));
        let engine = engine_for(&browser);

        let outcome = engine.scrape(&subject(), 2).await.unwrap();
        assert_eq!(outcome.matches.len(), 2);
    }

    #[tokio::test]
    async fn missing_achievements_tab_skips_snapshot_only() {
        let pages = vec![log_page("2024/05/12 21:00", "A1", "B1")];
        let browser =
            Arc::new(FakeBrowser::new("<html></html>", pages).without_performance_tab());
        let engine = engine_for(&browser);

        let outcome = engine.scrape(&subject(), 1).await.unwrap();
        assert!(outcome.snapshot.is_none());
        assert_eq!(outcome.matches.len(), 1);
    }

    #[tokio::test]
    async fn failed_run_returns_the_error_and_captures_an_error_screenshot() {
        let pages = vec![log_page("2024/05/12 21:00", "A1", "B1")];
        let browser =
            Arc::new(FakeBrowser::new("<html></html>", pages).failing_on_battle_log());
        let engine = engine_for(&browser);

        let result = engine.scrape(&subject(), 1).await;
        assert!(result.is_err());

        let shots = browser.screenshots();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0], PathBuf::from("./debug_error_screen.png"));
    }

    #[tokio::test]
    async fn visits_play_view_then_battle_log() {
        let browser = Arc::new(FakeBrowser::new("<html></html>", vec![]));
        let engine = engine_for(&browser);

        engine.scrape(&subject(), 1).await.unwrap();
        let visited = browser.visited();
        assert_eq!(visited.len(), 2);
        assert!(visited[0].ends_with("/1111111111/play"));
        assert!(visited[1].contains("/1111111111/battlelog/rank"));
        assert_eq!(browser.screenshots().len(), 1);
    }
}

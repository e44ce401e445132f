pub mod engine;
pub mod fake;
pub mod page;
pub mod parse;
pub mod webdriver;

pub use engine::{EngineConfig, ScrapeEngine, ScrapeOutcome};
pub use page::{Browser, BrowserPage};
pub use webdriver::WebDriverBrowser;

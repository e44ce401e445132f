use thiserror::Error;

/// Errors raised inside a scrape run. Everything is caught and logged at the
/// run boundary; nothing here crashes the scheduler loop or the API.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("failed to open browser session: {0}")]
    Session(String),

    #[error("browser command failed: {0}")]
    Driver(#[from] fantoccini::error::CmdError),

    #[error("session state unreadable: {0}")]
    SessionState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

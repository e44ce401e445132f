use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sf6_tracker::config::Config;
use sf6_tracker::models::Subject;
use sf6_tracker::runlog::RunLog;
use sf6_tracker::scheduler::Runner;
use sf6_tracker::scrape::{Browser, EngineConfig, ScrapeEngine, WebDriverBrowser};
use sf6_tracker::store::{PgStore, Store};
use sf6_tracker::tunnel::TunnelWatcher;
use sf6_tracker::{create_app, AppState, DEFAULT_MAX_PAGES};

#[derive(Parser, Debug)]
#[command(author, version, about = "SF6 Buckler match-history scraper and stats tracker", long_about = None)]
struct Args {
    /// Address the control surface listens on
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// Scrape one subject immediately and exit instead of serving
    #[arg(long)]
    run_once: Option<String>,

    /// Page budget for --run-once
    #[arg(short, long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let pg_store = PgStore::new(pool);
    pg_store
        .init_schema()
        .await
        .context("Failed to initialize schema")?;
    let store: Arc<dyn Store> = Arc::new(pg_store);

    let log = Arc::new(RunLog::open(&config.log_path).context("Failed to open run log")?);
    let tunnel = Arc::new(TunnelWatcher::new(
        config.metrics_url.clone(),
        config.webhook_url.clone(),
    ));

    let runner = match &config.webdriver_url {
        Some(webdriver_url) => {
            let browser: Arc<dyn Browser> = Arc::new(WebDriverBrowser::new(
                webdriver_url.clone(),
                config.session_path.clone(),
                &config.profile_base,
            ));
            let engine = ScrapeEngine::new(
                browser,
                EngineConfig {
                    profile_base: config.profile_base.clone(),
                    screenshot_path: config.screenshot_path.clone(),
                    ..EngineConfig::default()
                },
            );
            Some(Arc::new(Runner::new(store.clone(), engine, log.clone())))
        }
        None => {
            warn!("WEBDRIVER_URL not set - scraping disabled, control surface is read-only");
            None
        }
    };

    if let Some(user_code) = args.run_once {
        let runner = runner.context("scraping is not configured, cannot --run-once")?;
        let subject = store
            .subject(&user_code)
            .await?
            .unwrap_or_else(|| Subject::unregistered(&user_code));
        let report = runner.run_subject(&subject, args.max_pages).await;
        info!(
            "run finished: ok={} new_matches={} snapshot_saved={}",
            report.ok, report.new_matches, report.snapshot_saved
        );
        return Ok(());
    }

    // Pick up the tunnel URL in the background while the server comes up.
    {
        let tunnel = tunnel.clone();
        let store = store.clone();
        let log = log.clone();
        tokio::spawn(async move {
            tunnel.refresh(store.as_ref(), &log).await;
        });
    }

    if let Some(runner) = &runner {
        runner.start();
        info!("Scheduler loop started");
    }

    let app = create_app(AppState {
        store,
        runner,
        tunnel,
        log,
    });

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("Listening on {}", args.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

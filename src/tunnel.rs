//! Reconciles the tunnel's public URL: polls the local cloudflared metrics
//! endpoint until a hostname shows up, persists it, and pings the webhook.

use std::time::Duration;

use regex::Regex;
use serde_json::json;
use tracing::warn;

use crate::runlog::RunLog;
use crate::store::Store;

const DEFAULT_ATTEMPTS: u32 = 6;
const DEFAULT_POLL_GAP: Duration = Duration::from_secs(10);
const HOSTNAME_COUNTER: &str = "cloudflared_tunnel_user_hostnames_counts";

pub struct TunnelWatcher {
    client: reqwest::Client,
    metrics_url: String,
    webhook_url: Option<String>,
    attempts: u32,
    poll_gap: Duration,
}

impl TunnelWatcher {
    pub fn new(metrics_url: impl Into<String>, webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            metrics_url: metrics_url.into(),
            webhook_url,
            attempts: DEFAULT_ATTEMPTS,
            poll_gap: DEFAULT_POLL_GAP,
        }
    }

    /// Override retry count and gap. Tests poll once with no gap.
    pub fn with_polling(mut self, attempts: u32, poll_gap: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.poll_gap = poll_gap;
        self
    }

    /// Poll until the metrics expose a public hostname, then store it and
    /// notify the webhook. Returns false when every attempt came up empty.
    pub async fn refresh(&self, store: &dyn Store, log: &RunLog) -> bool {
        for attempt in 1..=self.attempts {
            log.append(&format!(
                "checking public url (attempt {attempt}/{})",
                self.attempts
            ));
            match self.client.get(&self.metrics_url).send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.unwrap_or_default();
                    if let Some(url) = extract_public_url(&body) {
                        match store.set_public_url(&url).await {
                            Ok(()) => {
                                log.append(&format!("public url updated: {url}"));
                                self.notify(&url).await;
                                return true;
                            }
                            Err(e) => {
                                log.append(&format!("failed to store public url: {e}"));
                            }
                        }
                    } else {
                        log.append("tunnel not ready, waiting for hostname");
                    }
                }
                Ok(response) => {
                    log.append(&format!("metrics http error: {}", response.status()));
                }
                Err(e) => {
                    log.append(&format!("metrics connection error: {e}"));
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.poll_gap).await;
            }
        }
        log.append("timed out waiting for public url");
        false
    }

    /// Fire-and-forget webhook ping. Failures are swallowed.
    async fn notify(&self, url: &str) {
        let Some(webhook) = &self.webhook_url else {
            return;
        };
        let payload = json!({
            "content": format!("📢 **外部公開URLが更新されました！**\n{url}"),
        });
        if let Err(e) = self.client.post(webhook).json(&payload).send().await {
            warn!("webhook notification failed: {e}");
        }
    }
}

/// Pull the quoted public hostname out of a cloudflared metrics dump.
pub fn extract_public_url(body: &str) -> Option<String> {
    if !body.contains(HOSTNAME_COUNTER) {
        return None;
    }
    let re = Regex::new(r#"userHostname="(https://[^"]+)""#).expect("Invalid regex");
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;
    use axum::routing::get;
    use axum::Router;
    use std::path::PathBuf;

    const READY_METRICS: &str = concat!(
        "# HELP cloudflared_tunnel_user_hostnames_counts Counts per hostname\n",
        "cloudflared_tunnel_user_hostnames_counts",
        "{userHostname=\"https://abc.trycloudflare.com\"} 3\n",
    );

    #[test]
    fn extracts_hostname_from_counter() {
        assert_eq!(
            extract_public_url(READY_METRICS).as_deref(),
            Some("https://abc.trycloudflare.com")
        );
    }

    #[test]
    fn ignores_metrics_without_counter() {
        let body = "some_other_metric{userHostname=\"https://abc.trycloudflare.com\"} 1\n";
        assert_eq!(extract_public_url(body), None);
    }

    #[test]
    fn counter_without_hostname_is_not_ready() {
        let body = "cloudflared_tunnel_user_hostnames_counts 0\n";
        assert_eq!(extract_public_url(body), None);
    }

    fn test_log(name: &str) -> RunLog {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "sf6-tracker-tunnel-{name}-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        RunLog::open(path).unwrap()
    }

    async fn serve_metrics(body: &'static str) -> String {
        let app = Router::new().route("/metrics", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/metrics")
    }

    #[tokio::test]
    async fn refresh_stores_url_on_first_match() {
        let metrics_url = serve_metrics(READY_METRICS).await;
        let watcher = TunnelWatcher::new(metrics_url, None).with_polling(1, Duration::ZERO);
        let store = FakeStore::new();
        let log = test_log("ready");

        assert!(watcher.refresh(&store, &log).await);
        assert_eq!(
            store.fake_public_url().as_deref(),
            Some("https://abc.trycloudflare.com")
        );
    }

    #[tokio::test]
    async fn refresh_fails_without_storing_when_never_ready() {
        let metrics_url = serve_metrics("tunnel warming up\n").await;
        let watcher = TunnelWatcher::new(metrics_url, None).with_polling(3, Duration::ZERO);
        let store = FakeStore::new();
        let log = test_log("not-ready");

        assert!(!watcher.refresh(&store, &log).await);
        assert_eq!(store.fake_public_url(), None);
    }
}

//! Decides when and for whom the extraction engine runs: manual runs from
//! the control surface, fan-out over the active subject set, and the
//! recurring time-of-day trigger loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use rand::Rng;
use tracing::warn;

use crate::models::{PerformanceSnapshot, Subject};
use crate::runlog::RunLog;
use crate::scrape::ScrapeEngine;
use crate::store::{Store, DEFAULT_RUN_TIMES};

/// Page budget for scheduled runs; manual runs pass their own.
pub const SCHEDULED_MAX_PAGES: u32 = 2;

const TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub ok: bool,
    pub new_matches: u64,
    pub snapshot_saved: bool,
}

/// Owns the scrape/persist pair for a process. One background loop at most;
/// manual runs are not mutually excluded against it, which is tolerated
/// because every write is an idempotent upsert.
pub struct Runner {
    store: Arc<dyn Store>,
    engine: ScrapeEngine,
    log: Arc<RunLog>,
    pause_secs: (u64, u64),
    loop_started: AtomicBool,
}

impl Runner {
    pub fn new(store: Arc<dyn Store>, engine: ScrapeEngine, log: Arc<RunLog>) -> Self {
        Self {
            store,
            engine,
            log,
            pause_secs: (15, 30),
            loop_started: AtomicBool::new(false),
        }
    }

    /// Override the inter-subject courtesy pause. Tests set (0, 0).
    pub fn with_pause(mut self, lo: u64, hi: u64) -> Self {
        self.pause_secs = (lo, hi);
        self
    }

    /// Scrape one subject and reconcile the results. Engine failures are
    /// logged and reported, never propagated.
    pub async fn run_subject(&self, subject: &Subject, max_pages: u32) -> RunReport {
        self.log.append(&format!(
            "scrape start (id: {}, name: {})",
            subject.user_code, subject.player_name
        ));

        let outcome = match self.engine.scrape(subject, max_pages).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.log
                    .append(&format!("scrape failed (id: {}): {e}", subject.user_code));
                return RunReport {
                    ok: false,
                    new_matches: 0,
                    snapshot_saved: false,
                };
            }
        };

        let mut snapshot_saved = false;
        if let Some(stats) = outcome.snapshot {
            let snapshot = PerformanceSnapshot {
                user_code: subject.user_code.clone(),
                player_name: subject.player_name.clone(),
                recorded_at: Local::now().date_naive(),
                stats,
            };
            match self.store.upsert_snapshot(&snapshot).await {
                Ok(()) => {
                    snapshot_saved = true;
                    self.log.append("performance snapshot saved");
                }
                Err(e) => self.log.append(&format!("snapshot save failed: {e}")),
            }
        }

        let new_matches = match self.store.insert_matches(&outcome.matches).await {
            Ok(n) => n,
            Err(e) => {
                self.log.append(&format!("match insert failed: {e}"));
                0
            }
        };

        self.log.append(&format!(
            "scrape finished (id: {}): {new_matches} new matches",
            subject.user_code
        ));
        RunReport {
            ok: true,
            new_matches,
            snapshot_saved,
        }
    }

    /// Run every active subject in listed order, pausing a randomized
    /// interval strictly between consecutive subjects.
    pub async fn run_all(&self, max_pages: u32) -> Vec<RunReport> {
        let subjects = match self.store.active_subjects().await {
            Ok(subjects) => subjects,
            Err(e) => {
                self.log.append(&format!("could not load subjects: {e}"));
                return Vec::new();
            }
        };
        if subjects.is_empty() {
            self.log.append("no active subjects, nothing to do");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(subjects.len());
        let last = subjects.len() - 1;
        for (i, subject) in subjects.iter().enumerate() {
            reports.push(self.run_subject(subject, max_pages).await);
            if i < last {
                let (lo, hi) = self.pause_secs;
                let pause = if hi > lo {
                    rand::thread_rng().gen_range(lo..=hi)
                } else {
                    lo
                };
                tokio::time::sleep(Duration::from_secs(pause)).await;
            }
        }
        reports
    }

    /// Start the background trigger loop. Returns false if it was already
    /// started; the loop runs for the life of the process.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.loop_started.swap(true, Ordering::SeqCst) {
            return false;
        }
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.trigger_loop().await;
        });
        true
    }

    async fn trigger_loop(&self) {
        let mut last_consumed = String::new();
        loop {
            // Re-read the schedule every tick so edits apply without restart.
            let csv = match self.store.run_times().await {
                Ok(csv) => csv,
                Err(e) => {
                    warn!("could not read run_times, using default: {e}");
                    DEFAULT_RUN_TIMES.to_string()
                }
            };
            let times: Vec<String> = csv.split(',').filter_map(normalize_run_time).collect();

            let now = Local::now().naive_local();
            if let Some((trigger, key)) = due_trigger(&now, &times, &last_consumed) {
                self.log
                    .append(&format!("scheduled run start (trigger: {trigger})"));
                last_consumed = key;
                self.run_all(SCHEDULED_MAX_PAGES).await;
            }

            tokio::time::sleep(TICK).await;
        }
    }
}

/// Normalize a configured trigger time to zero-padded "HH:MM". Malformed
/// entries are skipped, not fatal.
pub fn normalize_run_time(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let padded = if trimmed.len() == 4 && trimmed.contains(':') {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    };
    if padded.len() != 5 {
        return None;
    }
    let (h, m) = padded.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(format!("{h:02}:{m:02}"))
}

/// First trigger time whose `[T, T+60min)` window contains `now` and whose
/// date-stamped key was not consumed yet. The key carries today's date, so
/// consumption resets implicitly at midnight.
pub fn due_trigger(
    now: &NaiveDateTime,
    times: &[String],
    last_consumed: &str,
) -> Option<(String, String)> {
    let current = now.hour() * 60 + now.minute();
    let today = now.date().format("%Y-%m-%d").to_string();
    for time in times {
        let Some((h, m)) = time.split_once(':') else {
            continue;
        };
        let (Ok(h), Ok(m)) = (h.parse::<u32>(), m.parse::<u32>()) else {
            continue;
        };
        let target = h * 60 + m;
        if target <= current && current < target + 60 {
            let key = format!("{today}{time}");
            if key != last_consumed {
                return Some((time.clone(), key));
            }
        }
    }
    None
}

//! In-memory implementation of the [`Store`] trait for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::models::{MatchRecord, PerformanceSnapshot, Subject};
use crate::store::{Store, StoreError, DEFAULT_RUN_TIMES};

#[derive(Default)]
struct Inner {
    matches: HashMap<String, MatchRecord>,
    snapshots: HashMap<(String, String), PerformanceSnapshot>,
    // Vec, not a map: active_subjects must preserve listed order.
    subjects: Vec<Subject>,
    run_times: Option<String>,
    public_url: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<RwLock<Inner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fake_add_subject(&self, subject: Subject) {
        self.inner.write().unwrap().subjects.push(subject);
    }

    pub fn fake_match_count(&self) -> usize {
        self.inner.read().unwrap().matches.len()
    }

    pub fn fake_snapshot(&self, user_code: &str, date: &str) -> Option<PerformanceSnapshot> {
        self.inner
            .read()
            .unwrap()
            .snapshots
            .get(&(user_code.to_string(), date.to_string()))
            .cloned()
    }

    pub fn fake_public_url(&self) -> Option<String> {
        self.inner.read().unwrap().public_url.clone()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn insert_matches(&self, matches: &[MatchRecord]) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let mut inserted = 0;
        for record in matches {
            if !inner.matches.contains_key(&record.battle_id) {
                inner
                    .matches
                    .insert(record.battle_id.clone(), record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn upsert_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<(), StoreError> {
        let key = (
            snapshot.user_code.clone(),
            snapshot.recorded_at.to_string(),
        );
        self.inner
            .write()
            .unwrap()
            .snapshots
            .insert(key, snapshot.clone());
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError> {
        Ok(self.inner.read().unwrap().subjects.clone())
    }

    async fn active_subjects(&self) -> Result<Vec<Subject>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .subjects
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn subject(&self, user_code: &str) -> Result<Option<Subject>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .subjects
            .iter()
            .find(|s| s.user_code == user_code)
            .cloned())
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        match inner
            .subjects
            .iter_mut()
            .find(|s| s.user_code == subject.user_code)
        {
            Some(existing) => *existing = subject.clone(),
            None => inner.subjects.push(subject.clone()),
        }
        Ok(())
    }

    async fn run_times(&self) -> Result<String, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .run_times
            .clone()
            .unwrap_or_else(|| DEFAULT_RUN_TIMES.to_string()))
    }

    async fn set_run_times(&self, csv: &str) -> Result<(), StoreError> {
        self.inner.write().unwrap().run_times = Some(csv.to_string());
        Ok(())
    }

    async fn set_public_url(&self, url: &str) -> Result<(), StoreError> {
        self.inner.write().unwrap().public_url = Some(url.to_string());
        Ok(())
    }
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use course_offline_core::{
    CourseSnapshot, Database, DownloadError, DownloadOrchestrator, JobKey, ModuleSnapshot,
    ProgressSource, ResourceSnapshot, SimulatedProgress, Store,
};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Upper bound for any wait in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a file-backed store in a temp dir. Keep the `TempDir` alive.
pub async fn setup_test_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("offline.db");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (Store::new(db), temp_dir)
}

/// Course 1 with two modules and two resources.
pub fn sample_course() -> CourseSnapshot {
    CourseSnapshot {
        id: 1,
        title: "Intro to Rust".to_string(),
        description: Some("Ownership, borrowing and lifetimes".to_string()),
        modules: vec![
            ModuleSnapshot {
                id: 10,
                title: "Ownership".to_string(),
                position: 0,
            },
            ModuleSnapshot {
                id: 11,
                title: "Borrowing".to_string(),
                position: 1,
            },
        ],
        resources: vec![
            ResourceSnapshot {
                id: 100,
                module_id: Some(10),
                title: "Ownership slides".to_string(),
                url: "https://cdn.example.com/ownership.pdf".to_string(),
                media_type: Some("application/pdf".to_string()),
                size_bytes: Some(2_400_000),
            },
            ResourceSnapshot {
                id: 101,
                module_id: None,
                title: "Syllabus".to_string(),
                url: "https://cdn.example.com/syllabus.pdf".to_string(),
                media_type: Some("application/pdf".to_string()),
                size_bytes: None,
            },
        ],
    }
}

/// Orchestrator with a fast simulated source.
pub fn fast_orchestrator(store: Store) -> DownloadOrchestrator {
    DownloadOrchestrator::new(
        store,
        Arc::new(SimulatedProgress::new(Duration::from_millis(2), 25)),
    )
}

/// One scripted progress report.
#[derive(Debug, Clone)]
pub enum Step {
    Report(u8),
    Fail(&'static str),
}

/// Progress source that hands out scripted steps, one per released permit.
///
/// Once the script runs out it reports 100.
#[derive(Debug)]
pub struct GatedProgress {
    steps: Mutex<VecDeque<Step>>,
    gate: Semaphore,
}

impl GatedProgress {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            gate: Semaphore::new(0),
        })
    }

    /// Lets `n` more progress reports through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl ProgressSource for GatedProgress {
    async fn next_progress(&self, key: &JobKey, _current: u8) -> Result<u8, DownloadError> {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Report(progress)) => Ok(progress),
            Some(Step::Fail(reason)) => Err(DownloadError::transfer(*key, reason)),
            None => Ok(100),
        }
    }
}

/// Polls `check` until it returns true or the test timeout passes.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached before timeout");
}

//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::PipelineSettings;
use crate::error::{AcquisitionError, PersistenceError};
use crate::models::{Feed, Reading, Snapshot};
use crate::source::SnapshotSource;
use crate::store::{self, SnapshotStore};

/// Snapshot on 2024-01-`day` at `hour:minute` with one `current_wl` per station.
pub fn create_test_snapshot(day: u32, hour: u32, minute: u32, rows: &[(&str, &str)]) -> Snapshot {
    // ---
    let captured_at = NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    let readings = rows
        .iter()
        .map(|(station, level)| Reading::new(*station).with("current_wl", *level))
        .collect();
    Snapshot::new(readings, captured_at)
}

/// Production timing, exercised under tokio's paused clock.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings::default()
}

/// One scripted response of [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum Step {
    Ok(Snapshot),
    Err,
    Slow(Duration, Snapshot),
}

/// Source that replays a script, then fails. `repeating` never runs out.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            repeat: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn repeating(step: Step) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(step),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(&self, _feed: Feed) -> Result<Snapshot, AcquisitionError> {
        // ---
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone());

        match step {
            Some(Step::Ok(snapshot)) => Ok(snapshot),
            Some(Step::Slow(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            Some(Step::Err) => Err(AcquisitionError::Request("scripted failure".into())),
            None => Err(AcquisitionError::Request("script exhausted".into())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Store whose every call fails.
#[derive(Debug)]
pub struct FailingStore;

fn unavailable() -> PersistenceError {
    PersistenceError::Malformed("store unavailable".into())
}

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn put_latest(&self, _: Feed, _: &Snapshot) -> store::Result<()> {
        Err(unavailable())
    }

    async fn put_dated(&self, _: Feed, _: &str, _: &Snapshot) -> store::Result<()> {
        Err(unavailable())
    }

    async fn add_date(&self, _: Feed, _: &str) -> store::Result<()> {
        Err(unavailable())
    }

    async fn get_dated(&self, _: Feed, _: &str) -> store::Result<Option<Snapshot>> {
        Err(unavailable())
    }

    async fn list_known_dates(&self, _: Feed) -> store::Result<Vec<String>> {
        Err(unavailable())
    }
}

//! Data models for the acquisition pipeline: feeds, readings and snapshots.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format of the feed-reported capture time and of `last_updated` in responses.
pub const CAPTURE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format of date partitions and DateIndex entries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---

/// One independent data series with its own worker and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feed {
    WaterLevel,
    Rainfall,
}

impl Feed {
    /// Every feed the service acquires, in startup order.
    pub const ALL: [Feed; 2] = [Feed::WaterLevel, Feed::Rainfall];

    /// URL path segment and log label.
    pub fn slug(self) -> &'static str {
        // ---
        match self {
            Feed::WaterLevel => "water-level",
            Feed::Rainfall => "rainfall",
        }
    }

    /// Storage collection name used as the feed key in the document store.
    pub fn collection(self) -> &'static str {
        // ---
        match self {
            Feed::WaterLevel => "water_levels",
            Feed::Rainfall => "rainfall_data",
        }
    }

    /// Value columns following the station column, in table order.
    pub fn columns(self) -> &'static [&'static str] {
        // ---
        match self {
            Feed::WaterLevel => &[
                "current_wl",
                "wl_30min",
                "wl_1hr",
                "alert_level",
                "alarm_level",
                "critical_level",
            ],
            Feed::Rainfall => &[
                "current_rf",
                "rf_30min",
                "rf_1hr",
                "rf_3hr",
                "rf_6hr",
                "rf_12hr",
                "rf_24hr",
            ],
        }
    }

    /// Human label used in "not available yet" messages.
    pub fn label(self) -> &'static str {
        // ---
        match self {
            Feed::WaterLevel => "Water level",
            Feed::Rainfall => "Rainfall",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One station row within a snapshot.
///
/// Serialized flat, e.g. `{"station": "Sto Nino", "current_wl": "12.10", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub station: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

impl Reading {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter used by the table parser and tests.
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }
}

/// One full table capture for a feed.
///
/// `captured_at` is the feed-reported time in the source's local clock, or
/// the wall-clock fallback when the page did not report one. It is never part
/// of the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    // ---
    pub readings: Vec<Reading>,
    pub captured_at: NaiveDateTime,
}

impl Snapshot {
    pub fn new(readings: Vec<Reading>, captured_at: NaiveDateTime) -> Self {
        Self {
            readings,
            captured_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Calendar date this snapshot is partitioned under (`YYYY-MM-DD`).
    pub fn date_key(&self) -> String {
        self.captured_at.format(DATE_FORMAT).to_string()
    }

    /// Capture time rendered as `YYYY-MM-DD HH:MM`.
    pub fn last_updated(&self) -> String {
        self.captured_at.format(CAPTURE_TIME_FORMAT).to_string()
    }
}

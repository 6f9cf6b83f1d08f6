use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

pub type WalkId = i64;

/// One recorded walking session
#[derive(Debug, Clone, PartialEq)]
pub struct Walk {
    pub id: WalkId,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub total_steps: u64,
    pub distance_meters: f64,
    pub is_active: bool,
    /// Local calendar date of `start_time`, used for grouping
    pub date: NaiveDate,
}

impl Walk {
    /// Zero until the walk has been stopped
    pub fn duration_seconds(&self) -> i64 {
        match self.end_time {
            Some(end) => (end - self.start_time).num_seconds().max(0),
            None => 0,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

/// Totals of the completed walks recorded on one calendar date
#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_steps: u64,
    pub total_distance_meters: f64,
    pub walk_count: u32,
}

impl DailyStats {
    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }
}

/// Flat row used for CSV export
#[derive(Debug, Serialize)]
pub struct WalkRecord {
    pub id: WalkId,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_seconds: i64,
    pub total_steps: u64,
    pub distance_meters: f64,
}

impl From<&Walk> for WalkRecord {
    fn from(w: &Walk) -> Self {
        Self {
            id: w.id,
            date: w.date.format("%Y-%m-%d").to_string(),
            start_time: w.start_time.to_rfc3339(),
            end_time: w.end_time.map(|t| t.to_rfc3339()),
            duration_seconds: w.duration_seconds(),
            total_steps: w.total_steps,
            distance_meters: w.distance_meters,
        }
    }
}

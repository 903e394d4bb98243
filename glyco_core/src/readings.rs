//! Glucose reading log.
//!
//! Readings are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access. The engine never touches this file;
//! callers record a reading after a recommendation has been produced.

use crate::{Recommendation, Result, SeverityTier};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// How many readings the history view keeps
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A stored measurement with the advice given for it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlucoseReading {
    pub id: Uuid,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
    pub recommendation: String,
    pub tier: SeverityTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin_units: Option<f64>,
    #[serde(default)]
    pub is_emergency: bool,
}

impl GlucoseReading {
    pub fn new(value: f64, recommendation: &Recommendation, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            recorded_at,
            recommendation: recommendation.message.clone(),
            tier: recommendation.tier,
            insulin_units: recommendation.insulin_units,
            is_emergency: recommendation.is_emergency,
        }
    }
}

/// Reading sink trait for persisting readings
pub trait ReadingSink {
    fn append(&mut self, reading: &GlucoseReading) -> Result<()>;
}

impl ReadingSink for Vec<GlucoseReading> {
    fn append(&mut self, reading: &GlucoseReading) -> Result<()> {
        self.push(reading.clone());
        Ok(())
    }
}

/// JSONL-based reading sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl ReadingSink for JsonlSink {
    fn append(&mut self, reading: &GlucoseReading) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        // One line per reading, written in a single call
        let mut line = serde_json::to_string(reading)?;
        line.push('\n');
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended reading {} to {:?}", reading.id, self.path);
        Ok(())
    }
}

/// Read all readings from a log file, in file order
pub fn read_readings(path: &Path) -> Result<Vec<GlucoseReading>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut readings = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<GlucoseReading>(&line) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                tracing::warn!("Failed to parse reading at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} readings from {:?}", readings.len(), path);
    Ok(readings)
}

/// Newest readings first, at most `limit` of them
pub fn load_recent(path: &Path, limit: usize) -> Result<Vec<GlucoseReading>> {
    let mut readings = read_readings(path)?;
    readings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    readings.truncate(limit);
    Ok(readings)
}

/// Readings taken in the last `days` days.
///
/// A window reaching past the representable calendar keeps every reading.
pub fn within_days(
    readings: &[GlucoseReading],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<&GlucoseReading> {
    let cutoff = Duration::try_days(days).and_then(|span| now.checked_sub_signed(span));
    readings
        .iter()
        .filter(|r| cutoff.map_or(true, |cutoff| r.recorded_at >= cutoff))
        .collect()
}

/// Readings taken on a given (UTC) calendar day
pub fn on_day(readings: &[GlucoseReading], day: NaiveDate) -> Vec<&GlucoseReading> {
    readings
        .iter()
        .filter(|r| r.recorded_at.date_naive() == day)
        .collect()
}

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::Utc;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::detector::DetectionResult;
use crate::events::PhaseEvent;
use crate::samples::samples_to_csv;
use crate::types::Sample;

pub const UPLOAD_PREFIX: &str = "acceleration-data-";
pub const EVENTS_CSV_HEADER: &str =
    "Event Type,Start Time (s),End Time (s),Duration (s),Peak/Min Value,Axis,Additional Data";

const DEFAULT_MAX_FILES: usize = 100;
const DEFAULT_MAX_TOTAL_BYTES: u64 = 50 * 1024 * 1024;

/// Limits applied to uploaded recordings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub max_files: usize,
    pub max_total_bytes: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

impl RetentionPolicy {
    pub fn max_size_mb(&self) -> f64 {
        self.max_total_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    pub csv_files: Vec<String>,
    pub json_files: Vec<String>,
    pub total_files: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub freed_bytes: u64,
    pub remaining: usize,
}

/// Paths written for one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedArtifacts {
    pub result_json: PathBuf,
    pub values_csv: PathBuf,
    pub events_csv: PathBuf,
}

struct StoredUpload {
    name: String,
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Filesystem-safe UTC timestamp with microseconds.
pub fn file_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S-%6fZ").to_string()
}

/// Read a recording, decompressing `.gz` files.
pub fn load_text(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Events table for one detection run: every phase event, then one row per
/// validated sequence.
pub fn events_to_csv(result: &DetectionResult) -> String {
    let mut lines = vec![EVENTS_CSV_HEADER.to_string()];

    for event in result.events.all() {
        let (value, axis, extra) = match &event {
            PhaseEvent::Deceleration(d) => (d.peak_value, d.axis.to_string(), String::new()),
            PhaseEvent::Freefall(f) => (f.min_value, String::new(), String::new()),
            PhaseEvent::Impact(i) => (i.peak_value, String::new(), format!("x={} y={} z={}", i.x, i.y, i.z)),
        };
        lines.push(format!(
            "{},{},{},{},{},{},{}",
            event.label(),
            event.start_time(),
            event.end_time(),
            event.duration(),
            value,
            axis,
            extra
        ));
    }

    for (index, fall) in result.sequences.iter().enumerate() {
        lines.push(format!(
            "fall_detected,{},{},{},{},,Fall #{}",
            fall.deceleration.start_time,
            fall.impact.time,
            fall.total_duration,
            fall.impact.peak_value,
            index + 1
        ));
    }

    lines.join("\n")
}

/// Directory of uploaded recordings and analysis artifacts.
#[derive(Clone, Debug)]
pub struct ResultStore {
    dir: PathBuf,
    policy: RetentionPolicy,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create results directory {}", self.dir.display()))
    }

    /// Store an uploaded recording, enforcing retention first.
    pub fn save_upload(&self, csv: &str) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        if let Err(e) = self.cleanup() {
            log::warn!("Retention cleanup failed before upload: {:#}", e);
        }

        let path = self.dir.join(format!("{}{}.csv", UPLOAD_PREFIX, file_timestamp()));
        fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Saved upload to {}", path.display());
        Ok(path)
    }

    pub fn save_result(&self, result: &DetectionResult, samples: &[Sample]) -> anyhow::Result<SavedArtifacts> {
        self.ensure_dir()?;
        let ts = file_timestamp();

        let artifacts = SavedArtifacts {
            result_json: self.dir.join(format!("{}.json", ts)),
            values_csv: self.dir.join(format!("{}-values.csv", ts)),
            events_csv: self.dir.join(format!("{}-events.csv", ts)),
        };

        fs::write(&artifacts.result_json, serde_json::to_string_pretty(result)?)?;
        fs::write(&artifacts.values_csv, samples_to_csv(samples))?;
        fs::write(&artifacts.events_csv, events_to_csv(result))?;

        log::info!("Results saved to {}", artifacts.result_json.display());
        Ok(artifacts)
    }

    pub fn list_files(&self) -> anyhow::Result<FileListing> {
        if !self.dir.exists() {
            return Ok(FileListing {
                csv_files: Vec::new(),
                json_files: Vec::new(),
                total_files: 0,
            });
        }

        let mut csv_files = Vec::new();
        let mut json_files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".csv") {
                csv_files.push(name);
            } else if name.ends_with(".json") {
                json_files.push(name);
            }
        }
        csv_files.sort();
        json_files.sort();

        let total_files = csv_files.len() + json_files.len();
        Ok(FileListing {
            csv_files,
            json_files,
            total_files,
        })
    }

    fn uploads(&self) -> anyhow::Result<Vec<StoredUpload>> {
        let mut uploads = Vec::new();
        if !self.dir.exists() {
            return Ok(uploads);
        }

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(UPLOAD_PREFIX) && name.ends_with(".csv")) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            uploads.push(StoredUpload {
                name,
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        // Oldest first; names carry the upload time and break mtime ties
        uploads.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(uploads)
    }

    /// Delete the oldest uploads until both the count and size limits hold.
    pub fn cleanup(&self) -> anyhow::Result<CleanupReport> {
        let uploads = self.uploads()?;
        let excess = uploads.len().saturating_sub(self.policy.max_files);

        let mut doomed: Vec<bool> = (0..uploads.len()).map(|i| i < excess).collect();
        let mut total_bytes: u64 = uploads.iter().skip(excess).map(|u| u.size).sum();

        for (i, upload) in uploads.iter().enumerate().skip(excess) {
            if total_bytes <= self.policy.max_total_bytes {
                break;
            }
            doomed[i] = true;
            total_bytes -= upload.size;
        }

        let mut report = CleanupReport::default();
        for (upload, _) in uploads.iter().zip(&doomed).filter(|(_, d)| **d) {
            match fs::remove_file(&upload.path) {
                Ok(()) => {
                    report.freed_bytes += upload.size;
                    report.deleted.push(upload.name.clone());
                }
                Err(e) => log::warn!("Failed to delete {}: {}", upload.path.display(), e),
            }
        }
        report.remaining = uploads.len() - report.deleted.len();

        if !report.deleted.is_empty() {
            log::info!(
                "Cleanup: deleted {} old file(s), freed {:.2} MB",
                report.deleted.len(),
                report.freed_bytes as f64 / (1024.0 * 1024.0)
            );
        }
        Ok(report)
    }
}

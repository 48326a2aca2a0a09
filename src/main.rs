use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::fs;
use std::path::{Path, PathBuf};

use fall_detection_rs::samples::parse_samples;
use fall_detection_rs::store::{load_text, ResultStore, RetentionPolicy};
use fall_detection_rs::{FallDetector, Thresholds};

#[derive(Parser, Debug)]
#[command(name = "fall_detector")]
#[command(about = "Offline three-phase fall detection for accelerometer recordings", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one recording and print the result as JSON
    Analyze {
        /// CSV (or .csv.gz) recording
        file: PathBuf,

        /// JSON file overriding detection thresholds
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Also write result JSON, values CSV and events CSV here
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Run every labeled recording under a directory (`fall/` and `no_fall/`)
    Batch {
        dir: PathBuf,

        #[arg(long)]
        thresholds: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Fall,
    NoFall,
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}

fn load_detector(thresholds: Option<&Path>) -> Result<FallDetector> {
    let thresholds = match thresholds {
        Some(path) => Thresholds::from_json_file(path)?,
        None => Thresholds::default(),
    };
    Ok(FallDetector::new(thresholds))
}

fn is_recording(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".csv") || name.ends_with(".csv.gz")
}

/// Expected verdict from the nearest `fall` or `no_fall` directory.
fn label_for(path: &Path) -> Option<Label> {
    path.parent()?
        .components()
        .rev()
        .find_map(|c| match c.as_os_str().to_str() {
            Some("fall") => Some(Label::Fall),
            Some("no_fall") => Some(Label::NoFall),
            _ => None,
        })
}

fn collect_recordings(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_recordings(&path, out)?;
        } else if is_recording(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn analyze(file: &Path, thresholds: Option<&Path>, output_dir: Option<&Path>, compact: bool) -> Result<()> {
    let detector = load_detector(thresholds)?;
    let samples = parse_samples(&load_text(file)?);
    let result = detector.detect(&samples);

    if let Some(dir) = output_dir {
        let artifacts = ResultStore::new(dir, RetentionPolicy::default()).save_result(&result, &samples)?;
        eprintln!("[{}] Results written to {}", ts_now(), artifacts.result_json.display());
    }

    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", json);
    Ok(())
}

fn batch(dir: &Path, thresholds: Option<&Path>) -> Result<()> {
    let detector = load_detector(thresholds)?;

    let mut recordings = Vec::new();
    collect_recordings(dir, &mut recordings)?;
    recordings.sort();

    println!("[{}] Batch run over {} recording(s) in {}", ts_now(), recordings.len(), dir.display());

    let (mut passed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
    for path in &recordings {
        let Some(label) = label_for(path) else {
            skipped += 1;
            continue;
        };

        let result = match load_text(path) {
            Ok(raw) => detector.detect_text(&raw),
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let expected = label == Label::Fall;
        let shown = path.strip_prefix(dir).unwrap_or(path).display();
        if result.fall_detected == expected {
            passed += 1;
            println!("  {} {}", "PASS".green(), shown);
        } else {
            failed += 1;
            println!(
                "  {} {} (expected {}, got {})",
                "FAIL".red(),
                shown,
                if expected { "fall" } else { "no fall" },
                if result.fall_detected { "fall" } else { "no fall" }
            );
        }
    }

    println!();
    println!("  Passed:  {}", passed.to_string().green());
    println!("  Failed:  {}", failed.to_string().red());
    println!("  Skipped: {}", skipped);

    if failed > 0 {
        anyhow::bail!("{} of {} labeled recording(s) failed", failed, passed + failed);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Analyze {
            file,
            thresholds,
            output_dir,
            compact,
        } => analyze(&file, thresholds.as_deref(), output_dir.as_deref(), compact),
        Command::Batch { dir, thresholds } => batch(&dir, thresholds.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_nearest_directory() {
        assert_eq!(label_for(Path::new("data/fall/crash_01.csv")), Some(Label::Fall));
        assert_eq!(label_for(Path::new("data/no_fall/commute.csv.gz")), Some(Label::NoFall));
        assert_eq!(label_for(Path::new("fall/no_fall/pothole.csv")), Some(Label::NoFall));
        assert_eq!(label_for(Path::new("data/misc/ride.csv")), None);
    }

    #[test]
    fn test_recording_extensions() {
        assert!(is_recording(Path::new("ride.csv")));
        assert!(is_recording(Path::new("ride.csv.gz")));
        assert!(!is_recording(Path::new("ride.json")));
        assert!(!is_recording(Path::new("ride.json.gz")));
    }
}

use std::path::Path;
use std::sync::Arc;

use chrono::Local;

use crate::detector::{DetectionResult, FallDetector};
use crate::error::DetectionError;
use crate::notify::{alert_details, fall_alert_message, Notifier};
use crate::samples::parse_samples;
use crate::store::{load_text, ResultStore};

/// Detector plus the side effects a deployment wants around it: artifact
/// persistence and fall alerts. Neither side effect can fail an analysis.
pub struct FallDetectionService {
    detector: FallDetector,
    notifier: Arc<dyn Notifier>,
    store: Option<ResultStore>,
}

impl FallDetectionService {
    pub fn new(detector: FallDetector, notifier: Arc<dyn Notifier>, store: Option<ResultStore>) -> Self {
        Self {
            detector,
            notifier,
            store,
        }
    }

    pub fn detector(&self) -> &FallDetector {
        &self.detector
    }

    pub fn store(&self) -> Option<&ResultStore> {
        self.store.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub async fn analyze_text(&self, raw: &str) -> DetectionResult {
        let detector = self.detector.clone();
        let store = self.store.clone();
        let raw = raw.to_owned();

        // Parsing, detection and artifact writes run on the blocking pool
        let analysis = tokio::task::spawn_blocking(move || analyze_blocking(&detector, store.as_ref(), &raw)).await;

        let result = match analysis {
            Ok(result) => result,
            Err(e) => {
                log::error!("Analysis task failed: {}", e);
                let error = DetectionError::Panicked(e.to_string());
                DetectionResult::failed(self.detector.thresholds(), 0, &error)
            }
        };

        if let Some(message) = fall_alert_message(&result, Local::now()) {
            log::warn!("[FALL] Fall detected");
            for line in alert_details(&result) {
                log::warn!("[FALL]   {}", line);
            }
            if let Err(e) = self.notifier.send(&message).await {
                log::error!("Failed to send fall notification: {:#}", e);
            }
        } else {
            log::info!("No fall detected");
        }

        result
    }

    pub async fn analyze_file(&self, path: &Path) -> anyhow::Result<DetectionResult> {
        let path = path.to_owned();
        let raw = tokio::task::spawn_blocking(move || load_text(&path)).await??;
        Ok(self.analyze_text(&raw).await)
    }
}

fn analyze_blocking(detector: &FallDetector, store: Option<&ResultStore>, raw: &str) -> DetectionResult {
    let samples = parse_samples(raw);
    log::info!("Analyzing {} samples", samples.len());

    let result = detector.detect(&samples);

    if let Some(store) = store {
        if let Err(e) = store.save_result(&result, &samples) {
            log::error!("Failed to save detection results: {:#}", e);
        }
    }
    result
}

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::{BoxFuture, FutureExt};
use serde_json::json;

use crate::detector::{DetectionResult, Summary};
use crate::thresholds::GRAVITY;

pub const ALARM_MESSAGE: &str = "🚨 ALERT: Potential fall detected!";
pub const FALSE_ALARM_MESSAGE: &str = "✅ False alarm - User confirmed they are okay";

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Outbound alert channel. Failures are reported to the caller, which decides
/// whether they matter.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, message: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Posts messages to a Discord channel through the bot REST API.
pub struct DiscordNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    channel_id: String,
}

impl DiscordNotifier {
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("FallDetection (https://github.com/fall-detection-rs, 0.1.0)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: DISCORD_API.to_string(),
            token: token.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Point the notifier at a different API root (e.g. a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/channels/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.channel_id
        )
    }
}

impl Notifier for DiscordNotifier {
    fn send<'a>(&'a self, message: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            let response = self
                .client
                .post(self.messages_url())
                .header("Authorization", format!("Bot {}", self.token))
                .json(&json!({ "content": message }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Discord returned HTTP {}: {}", status.as_u16(), body);
            }

            log::info!("Discord notification sent successfully");
            Ok(())
        }
        .boxed()
    }
}

/// Writes alerts to the log; used when no external channel is configured.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(&'a self, message: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            log::info!("[NOTIFY] {}", message.replace('\n', " "));
            Ok(())
        }
        .boxed()
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(&'a self, message: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            self.messages
                .lock()
                .map_err(|_| anyhow::anyhow!("Failed to acquire message lock"))?
                .push(message.to_string());
            Ok(())
        }
        .boxed()
    }
}

fn format_local(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Alert text for a positive verdict, `None` when no fall was detected.
pub fn fall_alert_message(result: &DetectionResult, now: DateTime<Local>) -> Option<String> {
    if !result.fall_detected {
        return None;
    }

    let title = match result.summary {
        Some(Summary::ImpactOnly { .. }) => "🚨 **FALL DETECTED (low speed)** 🚨",
        _ => "🚨 **FALL DETECTED** 🚨",
    };

    Some(format!(
        "{}\n\n⏰ {}\n\n⚠️ No response from the user yet",
        title,
        format_local(now)
    ))
}

/// Phase breakdown of a positive verdict, one line per phase.
pub fn alert_details(result: &DetectionResult) -> Vec<String> {
    match &result.summary {
        Some(Summary::ThreePhase {
            first_fall_time,
            first_fall_duration,
            peak_deceleration,
            deceleration_axis,
            peak_impact_force,
            freefall_duration,
            ..
        }) => {
            let first = result.first_sequence();
            let freefall_start = first.map(|s| s.freefall.start_time).unwrap_or(*first_fall_time);
            let impact_time = first.map(|s| s.impact.time).unwrap_or(*first_fall_time);
            vec![
                "Type: three-phase fall".to_string(),
                format!(
                    "Deceleration: {:.2}s → {:.1}g on the {}-axis",
                    first_fall_time,
                    peak_deceleration.abs() / GRAVITY,
                    deceleration_axis
                ),
                format!(
                    "Free-fall: {:.2}s → {:.2}s duration",
                    freefall_start, freefall_duration
                ),
                format!("Impact: {:.2}s → {:.1}g force", impact_time, peak_impact_force / GRAVITY),
                format!("Total duration: {:.2}s", first_fall_duration),
            ]
        }
        Some(Summary::ImpactOnly {
            impact_time,
            peak_impact_force,
            ..
        }) => vec![
            "Type: impact-only fall".to_string(),
            format!("Impact: {:.2}s → {:.2}g force", impact_time, peak_impact_force / GRAVITY),
            "Slow tip-over or slide detected".to_string(),
        ],
        None => Vec::new(),
    }
}

pub fn user_fine_message(now: DateTime<Local>) -> String {
    format!(
        "✅ **User is Fine** ✅\n\n⏰ {}\n\n👤 The user has confirmed they are okay and doing well.",
        format_local(now)
    )
}

/// Startup check for a newer GitHub release. Informational only.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

pub const RELEASES_URL: &str =
    "https://api.github.com/repos/YouTyekera/GameMusicControl/releases/latest";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    /// A release with a different tag exists.
    Available(String),
    /// The release metadata carried no tag.
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: Option<String>,
}

/// Compares release tags, ignoring a leading `v` and trailing `.0` parts,
/// so `v1.0` and `1.0.0` name the same release.
pub fn compare(current: &str, latest: Option<&str>) -> UpdateStatus {
    let normalize = |tag: &str| {
        let mut parts: Vec<&str> = tag.trim().trim_start_matches(['v', 'V']).split('.').collect();
        while parts.len() > 1 && parts.last().is_some_and(|p| p.chars().all(|c| c == '0')) {
            parts.pop();
        }
        parts.join(".")
    };
    match latest.map(str::trim).filter(|t| !t.is_empty()) {
        None => UpdateStatus::Unknown,
        Some(tag) if normalize(tag) == normalize(current) => UpdateStatus::UpToDate,
        Some(tag) => UpdateStatus::Available(tag.to_string()),
    }
}

/// Fetches the `tag_name` of the latest release published at `url`.
pub async fn fetch_latest_tag(url: &str) -> Result<Option<String>> {
    let client = reqwest::Client::builder()
        // GitHub rejects API requests without a User-Agent.
        .user_agent(concat!("game-music-control/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")?;

    let release: Release = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?
        .error_for_status()
        .context("Release endpoint returned an error status")?
        .json()
        .await
        .context("Failed to parse release metadata")?;

    Ok(release.tag_name)
}

/// Checks [`RELEASES_URL`] against the running version.
pub async fn check_for_update(current: &str) -> Result<UpdateStatus> {
    let latest = fetch_latest_tag(RELEASES_URL).await?;
    Ok(compare(current, latest.as_deref()))
}

/// Runs the startup check and records a newer tag in the GUI status.
/// Failures are logged and otherwise ignored.
pub async fn run(state: Arc<AppState>) {
    match check_for_update(env!("CARGO_PKG_VERSION")).await {
        Ok(UpdateStatus::Available(tag)) => {
            tracing::info!("A new version is available: {tag}");
            state.update_status(|s| s.update_available = Some(tag));
        }
        Ok(UpdateStatus::UpToDate) => tracing::debug!("Running the latest release"),
        Ok(UpdateStatus::Unknown) => tracing::debug!("No tag_name found in the latest release"),
        Err(e) => tracing::warn!("Update check failed: {e:#}"),
    }
}

//! Page snapshot fixtures: a JSON description of everything the browser
//! would supply on one page view, used to drive the collectors without one.

use collector::{PageElement, TimingSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed fixture: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything one simulated page view exposes to the collectors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub page: PageInfo,
    /// Host configuration values, keyed exactly as the engine expects them
    /// (`wgUserId`, `wgExtensionAssetsPath`, `wgImageMetrics`, ...).
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub geo: Option<GeoInfo>,
    /// The main image, when this page has one.
    #[serde(default)]
    pub image: Option<PageElement>,
    #[serde(default)]
    pub timing: Option<TimingInfo>,
    /// Value the head-stage observer captured; 0 means the image was already
    /// loaded, absent means it could not measure.
    #[serde(default)]
    pub head_load_time: Option<f64>,
    #[serde(default)]
    pub platform: PlatformFlags,
    /// Probe script behavior, keyed by script filename. Unlisted scripts
    /// load and execute normally.
    #[serde(default)]
    pub scripts: HashMap<String, ScriptBehavior>,
}

impl PageSnapshot {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Collection only runs on file pages; other page types never load the
    /// measurement module at all.
    pub is_file_page: bool,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "https:".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingInfo {
    pub navigation_type: Option<i64>,
    pub navigation_start: Option<f64>,
    /// Resource-timing entries keyed by absolute URL.
    #[serde(default)]
    pub resources: HashMap<String, TimingSnapshot>,
}

/// Passive feature-detection results for this simulated browser.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFlags {
    pub credentialed_xhr: bool,
    pub xdomain_request: bool,
    pub img_cross_origin: bool,
    pub script_cross_origin: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBehavior {
    #[serde(default)]
    pub outcome: ScriptOutcome,
    /// Simulated network delay before the script settles.
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOutcome {
    /// Load callback fires and the payload runs (sets its marker).
    #[default]
    Executes,
    /// Load callback fires but the payload body never ran. Some proxies
    /// deliver an empty or mangled response that still counts as loaded.
    Loads,
    /// Error callback fires; nothing ran.
    Errors,
}

//! Host-page configuration: the key names the engine shares with the host,
//! per-concern sampling rates and an in-memory configuration store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::sources::ConfigSource;

/// Configuration keys shared with the host page. The probe marker keys are
/// written by the injected payload scripts and read back at collection time.
pub mod keys {
    /// Authenticated user id; absent or null for anonymous sessions.
    pub const USER_ID: &str = "wgUserId";
    /// Absolute base URL the probe payload scripts are served from.
    pub const ASSET_BASE_PATH: &str = "wgExtensionAssetsPath";
    /// Per-concern sampling rates, nested under `samplingFactor`.
    pub const IMAGE_METRICS: &str = "wgImageMetrics";
    /// Marker set by the cross-origin probe payload when it executes.
    pub const CORS_TEST_SUCCEEDED: &str = "wgImageMetricsCorsTestSucceeded";
    /// Marker set by the same-origin control payload when it executes.
    pub const NON_CORS_TEST_SUCCEEDED: &str = "wgImageMetricsNonCorsTestSucceeded";
}

fn factor_or_disabled<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // Hosts send `false` (or nothing) for an unset rate; anything non-numeric
    // means sampling is disabled for that concern.
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.as_f64()),
        _ => Ok(None),
    }
}

/// Sampling rates per measurable concern, read once per page view. A rate is
/// the reciprocal of the inclusion probability ("1 in N" requests measured);
/// `None` disables the concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingRates {
    #[serde(deserialize_with = "factor_or_disabled")]
    pub image: Option<f64>,
    /// Overrides `image` for logged-in sessions when set.
    #[serde(rename = "imageLoggedin", deserialize_with = "factor_or_disabled")]
    pub image_logged_in: Option<f64>,
    #[serde(deserialize_with = "factor_or_disabled")]
    pub cors: Option<f64>,
}

impl SamplingRates {
    /// Reads the rates from the host configuration, treating a missing or
    /// malformed entry as all-disabled.
    pub fn from_config(config: &dyn ConfigSource) -> Self {
        config
            .get(keys::IMAGE_METRICS)
            .and_then(|value| value.get("samplingFactor").cloned())
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// The image-load factor for this session. The logged-in override is
    /// applied here so the sampler itself stays identity-agnostic.
    pub fn image_factor(&self, is_anon: bool) -> Option<f64> {
        if !is_anon {
            if let Some(factor) = self.image_logged_in {
                return Some(factor);
            }
        }
        self.image
    }

    pub fn cors_factor(&self) -> Option<f64> {
        self.cors
    }
}

/// In-memory [`ConfigSource`]. This is the store the probe payloads write
/// their markers into, so it ships with the engine rather than living in
/// test code only.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            values: Mutex::new(
                pairs
                    .into_iter()
                    .map(|(key, value)| (key.into(), value))
                    .collect(),
            ),
        }
    }
}

impl ConfigSource for MemoryConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .expect("config store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .expect("config store lock poisoned")
            .insert(key.to_string(), value);
    }
}

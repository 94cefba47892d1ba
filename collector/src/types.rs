use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single telemetry event under construction: an ordered mapping of field
/// names to JSON values. Events are built incrementally, submitted exactly
/// once and never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricEvent {
    fields: Map<String, Value>,
}

impl MetricEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Sets a field only if it is not already present. Enrichment uses this
    /// so collector-supplied fields are never overridden.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<Value>) {
        if !self.fields.contains_key(name) {
            self.fields.insert(name.to_string(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Converts a millisecond measurement to a JSON number, emitting whole
/// values as integers so the wire payload matches what browsers report.
pub fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Browser-reported timing for one fetched resource. All times are in
/// milliseconds relative to the start of the page navigation, except
/// `duration` which is the net load time of the resource itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSnapshot {
    pub duration: f64,
    pub start_time: f64,
    /// Missing or zero when the browser could not observe the first byte.
    #[serde(default)]
    pub response_start: Option<f64>,
    pub response_end: f64,
}

/// The target element of a measurement: the main image of a file page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageElement {
    /// Absolute resolved URL of the image (never a relative attribute value).
    pub src: String,
    /// Descriptive (alt) text, when the page supplies one.
    #[serde(default)]
    pub alt: Option<String>,
}

impl PageElement {
    /// File-type tag parsed from the descriptive text: the lower-cased
    /// substring after the last ".".
    pub fn file_type(&self) -> Option<String> {
        let alt = self.alt.as_deref()?;
        if alt.is_empty() {
            return None;
        }
        alt.rsplit('.').next().map(str::to_ascii_lowercase)
    }
}

/// Outcome of the cross-origin support checks: four passive feature
/// detections plus the two active script-execution markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProbeResult {
    pub xhr_supported: bool,
    pub xdomain_supported: bool,
    pub img_attribute_supported: bool,
    pub script_attribute_supported: bool,
    /// The cross-origin probe script actually executed.
    pub script_loaded: bool,
    /// The same-origin control script executed; distinguishes a CORS-specific
    /// failure from script injection being broken generally.
    pub sanity_check: bool,
}

//! Capability implementations backed by a [`PageSnapshot`], plus the
//! printing event sink. Together these stand in for the browser and the
//! host page.

use crate::fixture::{PageSnapshot, PlatformFlags, ScriptBehavior, ScriptOutcome, TimingInfo};
use async_trait::async_trait;
use chrono::Utc;
use collector::{
    keys, Capabilities, ConfigSource, EventSink, HeadObserver, LoadedPage, MemoryConfig,
    MetricEvent, PageElement, PageElementSource, PlatformSupport, ScriptLoader, StaticGeo,
    StaticLocation, TimingSnapshot, TimingSource,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct SnapshotTiming {
    info: TimingInfo,
}

impl TimingSource for SnapshotTiming {
    fn navigation_type(&self) -> Option<i64> {
        self.info.navigation_type
    }

    fn navigation_start(&self) -> Option<f64> {
        self.info.navigation_start
    }

    fn resource_entry(&self, url: &str) -> Option<TimingSnapshot> {
        self.info.resources.get(url).copied()
    }
}

pub struct SnapshotPage {
    image: Option<PageElement>,
}

impl PageElementSource for SnapshotPage {
    fn main_image(&self) -> Option<PageElement> {
        self.image.clone()
    }
}

pub struct SnapshotPlatform(PlatformFlags);

impl PlatformSupport for SnapshotPlatform {
    fn credentialed_xhr(&self) -> bool {
        self.0.credentialed_xhr
    }

    fn xdomain_request(&self) -> bool {
        self.0.xdomain_request
    }

    fn img_cross_origin_attribute(&self) -> bool {
        self.0.img_cross_origin
    }

    fn script_cross_origin_attribute(&self) -> bool {
        self.0.script_cross_origin
    }
}

pub struct SnapshotHead(Option<f64>);

impl HeadObserver for SnapshotHead {
    fn captured_load_time(&self) -> Option<f64> {
        self.0
    }
}

/// Simulates script injection. An `executes` outcome writes the payload's
/// marker into the shared config store before settling, exactly like the
/// real probe scripts do; `loads` and `errors` settle without running.
pub struct SimScriptLoader {
    config: Arc<MemoryConfig>,
    scripts: HashMap<String, ScriptBehavior>,
}

impl SimScriptLoader {
    fn filename(url: &str) -> &str {
        url.rsplit('/').next().unwrap_or(url)
    }

    fn behavior(&self, url: &str) -> ScriptBehavior {
        self.scripts
            .get(Self::filename(url))
            .copied()
            .unwrap_or_default()
    }

    fn marker_for(url: &str) -> Option<&'static str> {
        match Self::filename(url) {
            "cors-test.js" => Some(keys::CORS_TEST_SUCCEEDED),
            "non-cors-test.js" => Some(keys::NON_CORS_TEST_SUCCEEDED),
            _ => None,
        }
    }
}

#[async_trait]
impl ScriptLoader for SimScriptLoader {
    async fn load_script(&self, url: &str, cross_origin: bool) {
        let behavior = self.behavior(url);
        if behavior.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(behavior.delay_ms)).await;
        }

        debug!(url, cross_origin, outcome = ?behavior.outcome, "script settled");
        if behavior.outcome == ScriptOutcome::Executes {
            if let Some(marker) = Self::marker_for(url) {
                self.config.set(marker, json!(true));
            }
        }
    }
}

/// Prints every received event to stdout and counts submissions.
#[derive(Default)]
pub struct PrintingSink {
    received: AtomicUsize,
}

impl PrintingSink {
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }
}

impl EventSink for PrintingSink {
    fn log_event(&self, schema: &str, event: MetricEvent) {
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(schema, "event received");

        let envelope = json!({
            "schema": schema,
            "receivedAt": Utc::now().to_rfc3339(),
            "event": event.into_value(),
        });
        match serde_json::to_string_pretty(&envelope) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => info!(%error, "event could not be rendered"),
        }
    }
}

/// Wires one capability bundle from a snapshot. The config store is shared
/// with the script loader so executing probes can write their markers.
pub fn capabilities(snapshot: &PageSnapshot, sink: Arc<PrintingSink>) -> Capabilities {
    let config = Arc::new(MemoryConfig::from_pairs(
        snapshot
            .config
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    ));

    Capabilities {
        location: Arc::new(StaticLocation(snapshot.page.protocol.clone())),
        config: Arc::clone(&config) as Arc<dyn ConfigSource>,
        geo: Arc::new(StaticGeo {
            country: snapshot.geo.as_ref().and_then(|geo| geo.country.clone()),
        }),
        sink,
        timing: Arc::new(SnapshotTiming {
            info: snapshot.timing.clone().unwrap_or_default(),
        }),
        page: Arc::new(SnapshotPage {
            image: snapshot.image.clone(),
        }),
        platform: Arc::new(SnapshotPlatform(snapshot.platform)),
        head: Arc::new(SnapshotHead(snapshot.head_load_time)),
        events: Arc::new(LoadedPage),
        scripts: Arc::new(SimScriptLoader {
            config,
            scripts: snapshot.scripts.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(scripts: HashMap<String, ScriptBehavior>) -> (SimScriptLoader, Arc<MemoryConfig>) {
        let config = Arc::new(MemoryConfig::new());
        (
            SimScriptLoader {
                config: Arc::clone(&config),
                scripts,
            },
            config,
        )
    }

    #[tokio::test]
    async fn test_executing_script_sets_its_marker() {
        let (sim, config) = loader(HashMap::new());

        sim.load_script("https://assets.example/ImageMetrics/resources/cors-test.js", true)
            .await;
        sim.load_script(
            "https://assets.example/ImageMetrics/resources/non-cors-test.js",
            false,
        )
        .await;

        assert!(config.get_flag(keys::CORS_TEST_SUCCEEDED));
        assert!(config.get_flag(keys::NON_CORS_TEST_SUCCEEDED));
    }

    #[tokio::test]
    async fn test_failing_script_leaves_marker_unset() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "cors-test.js".to_string(),
            ScriptBehavior {
                outcome: ScriptOutcome::Errors,
                delay_ms: 0,
            },
        );
        let (sim, config) = loader(scripts);

        sim.load_script("https://assets.example/ImageMetrics/resources/cors-test.js", true)
            .await;

        assert!(!config.get_flag(keys::CORS_TEST_SUCCEEDED));
    }

    #[test]
    fn test_marker_selection_distinguishes_the_control_script() {
        assert_eq!(
            SimScriptLoader::marker_for("https://a/ImageMetrics/resources/cors-test.js"),
            Some(keys::CORS_TEST_SUCCEEDED)
        );
        assert_eq!(
            SimScriptLoader::marker_for("https://a/ImageMetrics/resources/non-cors-test.js"),
            Some(keys::NON_CORS_TEST_SUCCEEDED)
        );
        assert_eq!(SimScriptLoader::marker_for("https://a/other.js"), None);
    }
}

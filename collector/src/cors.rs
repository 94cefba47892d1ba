//! Empirically checks whether the visitor's browser and network path
//! preserve cross-origin script loading. Some intercepting proxies strip the
//! response headers CORS needs, causing silent load failures; the active
//! probe observes exactly that.

use std::sync::Arc;

use futures::join;
use tracing::debug;

use crate::config::keys;
use crate::logger::{EventLogger, MetricLogger};
use crate::sources::{Capabilities, ConfigSource, PlatformSupport, ScriptLoader};
use crate::types::{FeatureProbeResult, MetricEvent};

/// Schema the cross-origin support events are tagged with.
pub const CORS_SUPPORT_SCHEMA: &str = "ImageMetricsCorsSupport";

/// Payload that, when it executes, sets the cross-origin marker.
const CORS_TEST_SCRIPT: &str = "cors-test.js";
/// Same-origin control payload; its marker distinguishes "the CORS payload
/// specifically failed" from "script injection is broken generally".
const SANITY_TEST_SCRIPT: &str = "non-cors-test.js";

/// Single-use collector for cross-origin support. Runs the active probes,
/// waits for both to settle (load or error, never by polling), then collects
/// the marker flags and passive feature detections into one event.
pub struct CorsSupportCollector {
    logger: EventLogger,
    config: Arc<dyn ConfigSource>,
    platform: Arc<dyn PlatformSupport>,
    scripts: Arc<dyn ScriptLoader>,
}

impl CorsSupportCollector {
    /// Factory wiring the capability handles; `sampling_factor` must already
    /// be resolved for this session.
    pub fn create(sampling_factor: f64, caps: &Capabilities) -> Self {
        Self {
            logger: EventLogger::new(sampling_factor, caps),
            config: Arc::clone(&caps.config),
            platform: Arc::clone(&caps.platform),
            scripts: Arc::clone(&caps.scripts),
        }
    }

    /// Runs both probe scripts concurrently and collects once both have
    /// settled. A probe that never executes still settles its future and
    /// simply leaves its marker unset, so this cannot hang and a blocked
    /// script is recorded as `scriptLoaded: false` rather than raised as a
    /// fault; the failure is itself the signal being measured.
    pub async fn install(self) {
        join!(
            self.load_probe(CORS_TEST_SCRIPT, true),
            self.load_probe(SANITY_TEST_SCRIPT, false),
        );
        self.collect();
    }

    async fn load_probe(&self, filename: &str, cross_origin: bool) {
        let url = self.script_url(filename);
        debug!(%url, cross_origin, "loading probe script");
        self.scripts.load_script(&url, cross_origin).await;
    }

    /// Probe script URL under the host's asset base path. A relative base
    /// path would defeat cross-origin loading, but then there is nothing to
    /// measure on such a host anyway.
    fn script_url(&self, filename: &str) -> String {
        let base = self
            .config
            .get(keys::ASSET_BASE_PATH)
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();
        format!("{base}/ImageMetrics/resources/{filename}")
    }

    /// The feature flags as observed right now: platform detections plus the
    /// execution markers the probe payloads may have written.
    pub fn probe_result(&self) -> FeatureProbeResult {
        FeatureProbeResult {
            xhr_supported: self.platform.credentialed_xhr(),
            xdomain_supported: self.platform.xdomain_request(),
            img_attribute_supported: self.platform.img_cross_origin_attribute(),
            script_attribute_supported: self.platform.script_cross_origin_attribute(),
            script_loaded: self.config.get_flag(keys::CORS_TEST_SUCCEEDED),
            sanity_check: self.config.get_flag(keys::NON_CORS_TEST_SUCCEEDED),
        }
    }

    /// Builds and submits the event, exactly once per collection cycle.
    pub fn collect(&self) {
        let probe = self.probe_result();

        let mut event = MetricEvent::new();
        event.set("xhrSupported", probe.xhr_supported);
        event.set("xdomainSupported", probe.xdomain_supported);
        event.set("imgAttributeSupported", probe.img_attribute_supported);
        event.set("scriptAttributeSupported", probe.script_attribute_supported);
        event.set("scriptLoaded", probe.script_loaded);
        event.set("sanityCheck", probe.sanity_check);

        self.log(event);
    }
}

impl MetricLogger for CorsSupportCollector {
    fn schema(&self) -> &'static str {
        CORS_SUPPORT_SCHEMA
    }

    fn logger(&self) -> &EventLogger {
        &self.logger
    }
}

//! Shared event enrichment and submission, independent of what metric is
//! being measured. Collectors compose an [`EventLogger`] instead of
//! inheriting from a base type.

use std::sync::Arc;

use tracing::debug;

use crate::config::keys;
use crate::sources::{Capabilities, ConfigSource, EventSink, GeoSource, LocationSource};
use crate::types::{json_number, MetricEvent};

/// Enriches partial events with the session-wide fields and forwards them to
/// the event sink. Constructed once per collector with the sampling factor
/// already resolved for this session.
pub struct EventLogger {
    sampling_factor: f64,
    location: Arc<dyn LocationSource>,
    config: Arc<dyn ConfigSource>,
    geo: Arc<dyn GeoSource>,
    sink: Arc<dyn EventSink>,
}

impl EventLogger {
    pub fn new(sampling_factor: f64, caps: &Capabilities) -> Self {
        Self {
            sampling_factor,
            location: Arc::clone(&caps.location),
            config: Arc::clone(&caps.config),
            geo: Arc::clone(&caps.geo),
            sink: Arc::clone(&caps.sink),
        }
    }

    /// True when no authenticated user identity is present in configuration.
    pub fn is_anon(&self) -> bool {
        self.config
            .get(keys::USER_ID)
            .map_or(true, |value| value.is_null())
    }

    /// Enriches `event` and submits it to the sink, exactly once. Fields the
    /// collector already set are never overridden. `country` is set only when
    /// the geography capability exposes a country; there is no placeholder
    /// value for "unknown".
    pub fn submit(&self, schema: &str, mut event: MetricEvent) {
        debug_assert!(!schema.is_empty(), "collector submitted an event without a schema");

        event.set_if_absent("samplingFactor", json_number(self.sampling_factor));
        event.set_if_absent("isHttps", self.location.protocol() == "https:");
        event.set_if_absent("isAnon", self.is_anon());
        if let Some(country) = self.geo.country() {
            event.set_if_absent("country", country);
        }

        debug!(schema, "submitting metric event");
        self.sink.log_event(schema, event);
    }
}

/// The capability every concrete collector provides: a fixed schema name and
/// a handle on the shared enrichment logger. `log` is the single submission
/// path; calling it more than once per collection cycle is a bug in the
/// collector.
pub trait MetricLogger {
    /// Schema identifier the emitted events are tagged with.
    fn schema(&self) -> &'static str;

    fn logger(&self) -> &EventLogger;

    fn log(&self, event: MetricEvent) {
        self.logger().submit(self.schema(), event);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::sources::{LoadedPage, StaticGeo, StaticLocation};
    use crate::types::{PageElement, TimingSnapshot};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Event sink recording every submission for assertions.
    #[derive(Default)]
    pub(crate) struct CaptureSink {
        pub events: Mutex<Vec<(String, MetricEvent)>>,
    }

    impl CaptureSink {
        pub fn taken(&self) -> Vec<(String, MetricEvent)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl crate::sources::EventSink for CaptureSink {
        fn log_event(&self, schema: &str, event: MetricEvent) {
            self.events.lock().unwrap().push((schema.to_string(), event));
        }
    }

    #[derive(Default)]
    pub(crate) struct NoTiming;

    impl crate::sources::TimingSource for NoTiming {
        fn navigation_type(&self) -> Option<i64> {
            None
        }
        fn navigation_start(&self) -> Option<f64> {
            None
        }
        fn resource_entry(&self, _url: &str) -> Option<TimingSnapshot> {
            None
        }
    }

    #[derive(Default)]
    pub(crate) struct NoElement;

    impl crate::sources::PageElementSource for NoElement {
        fn main_image(&self) -> Option<PageElement> {
            None
        }
    }

    #[derive(Default)]
    pub(crate) struct NoPlatformSupport;

    impl crate::sources::PlatformSupport for NoPlatformSupport {
        fn credentialed_xhr(&self) -> bool {
            false
        }
        fn xdomain_request(&self) -> bool {
            false
        }
        fn img_cross_origin_attribute(&self) -> bool {
            false
        }
        fn script_cross_origin_attribute(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    pub(crate) struct NoHeadObserver;

    impl crate::sources::HeadObserver for NoHeadObserver {
        fn captured_load_time(&self) -> Option<f64> {
            None
        }
    }

    #[derive(Default)]
    pub(crate) struct NoopScriptLoader;

    #[async_trait]
    impl crate::sources::ScriptLoader for NoopScriptLoader {
        async fn load_script(&self, _url: &str, _cross_origin: bool) {}
    }

    /// Optional overrides for a test capability bundle, mirroring what a real
    /// host page would wire differently per scenario.
    #[derive(Default)]
    pub(crate) struct TestCaps {
        pub protocol: Option<&'static str>,
        pub config: Option<std::sync::Arc<MemoryConfig>>,
        pub country: Option<String>,
        pub timing: Option<std::sync::Arc<dyn crate::sources::TimingSource>>,
        pub page: Option<std::sync::Arc<dyn crate::sources::PageElementSource>>,
        pub platform: Option<std::sync::Arc<dyn crate::sources::PlatformSupport>>,
        pub head: Option<std::sync::Arc<dyn crate::sources::HeadObserver>>,
        pub scripts: Option<std::sync::Arc<dyn crate::sources::ScriptLoader>>,
    }

    pub(crate) fn capabilities(overrides: TestCaps) -> (Capabilities, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        let caps = Capabilities {
            location: Arc::new(StaticLocation(
                overrides.protocol.unwrap_or("http:").to_string(),
            )),
            config: overrides
                .config
                .unwrap_or_else(|| Arc::new(MemoryConfig::new())),
            geo: Arc::new(StaticGeo {
                country: overrides.country,
            }),
            sink: Arc::clone(&sink) as Arc<dyn crate::sources::EventSink>,
            timing: overrides.timing.unwrap_or_else(|| Arc::new(NoTiming)),
            page: overrides.page.unwrap_or_else(|| Arc::new(NoElement)),
            platform: overrides
                .platform
                .unwrap_or_else(|| Arc::new(NoPlatformSupport)),
            head: overrides.head.unwrap_or_else(|| Arc::new(NoHeadObserver)),
            events: Arc::new(LoadedPage),
            scripts: overrides
                .scripts
                .unwrap_or_else(|| Arc::new(NoopScriptLoader)),
        };
        (caps, sink)
    }

    #[test]
    fn test_enrichment_adds_session_fields() {
        let (caps, sink) = capabilities(TestCaps::default());
        let logger = EventLogger::new(100.0, &caps);

        logger.submit("TestSchema", MetricEvent::new());

        let events = sink.taken();
        assert_eq!(events.len(), 1);
        let (schema, event) = &events[0];
        assert_eq!(schema, "TestSchema");
        assert_eq!(event.get("samplingFactor"), Some(&json!(100)));
        assert_eq!(event.get("isHttps"), Some(&json!(false)));
        assert_eq!(event.get("isAnon"), Some(&json!(true)));
        assert_eq!(event.get("country"), None);
    }

    #[test]
    fn test_enrichment_never_overrides_collector_fields() {
        let (caps, sink) = capabilities(TestCaps {
            country: Some("HU".to_string()),
            ..Default::default()
        });
        let logger = EventLogger::new(100.0, &caps);

        let mut event = MetricEvent::new();
        event.set("samplingFactor", 1);
        event.set("country", "XX");
        logger.submit("TestSchema", event);

        let events = sink.taken();
        let event = &events[0].1;
        assert_eq!(event.get("samplingFactor"), Some(&json!(1)));
        assert_eq!(event.get("country"), Some(&json!("XX")));
    }

    #[test]
    fn test_https_detection() {
        let (caps, sink) = capabilities(TestCaps {
            protocol: Some("https:"),
            ..Default::default()
        });
        EventLogger::new(1.0, &caps).submit("TestSchema", MetricEvent::new());

        assert_eq!(sink.taken()[0].1.get("isHttps"), Some(&json!(true)));
    }

    #[test]
    fn test_authenticated_session_is_not_anon() {
        let config = Arc::new(MemoryConfig::from_pairs([(keys::USER_ID, json!(1))]));
        let (caps, sink) = capabilities(TestCaps {
            config: Some(config),
            ..Default::default()
        });
        EventLogger::new(1.0, &caps).submit("TestSchema", MetricEvent::new());

        assert_eq!(sink.taken()[0].1.get("isAnon"), Some(&json!(false)));
    }

    #[test]
    fn test_null_user_id_is_anon() {
        let config = Arc::new(MemoryConfig::from_pairs([(keys::USER_ID, Value::Null)]));
        let (caps, sink) = capabilities(TestCaps {
            config: Some(config),
            ..Default::default()
        });
        EventLogger::new(1.0, &caps).submit("TestSchema", MetricEvent::new());

        assert_eq!(sink.taken()[0].1.get("isAnon"), Some(&json!(true)));
    }

    #[test]
    fn test_country_present_only_when_geo_supplies_one() {
        let (caps, sink) = capabilities(TestCaps {
            country: Some("HU".to_string()),
            ..Default::default()
        });
        EventLogger::new(1.0, &caps).submit("TestSchema", MetricEvent::new());

        assert_eq!(sink.taken()[0].1.get("country"), Some(&json!("HU")));
    }

    #[test]
    #[should_panic(expected = "without a schema")]
    #[cfg(debug_assertions)]
    fn test_empty_schema_fails_loudly() {
        let (caps, _sink) = capabilities(TestCaps::default());
        EventLogger::new(1.0, &caps).submit("", MetricEvent::new());
    }
}

//! Capability traits for every external collaborator the collectors touch.
//! Collectors receive these through constructor injection, never through
//! ambient globals, so each one is independently testable.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::types::{MetricEvent, PageElement, TimingSnapshot};

/// Shared key-value configuration delivered by the host page. Also the store
/// the probe payload scripts write their execution markers into.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);

    /// True only for an explicit boolean `true`; missing or differently typed
    /// values read as false.
    fn get_flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }
}

/// The external system receiving finished events. Fire-and-forget: the
/// collector neither expects nor awaits an acknowledgment.
pub trait EventSink: Send + Sync {
    fn log_event(&self, schema: &str, event: MetricEvent);
}

/// The page's own location.
pub trait LocationSource: Send + Sync {
    /// Protocol with trailing colon, e.g. `"https:"`.
    fn protocol(&self) -> String;
}

/// Visitor geography, when the host exposes it.
pub trait GeoSource: Send + Sync {
    fn country(&self) -> Option<String>;
}

/// Browser-reported navigation and resource timing. Any part may be
/// unavailable on older platforms.
pub trait TimingSource: Send + Sync {
    /// Raw navigation type code (0 navigate, 1 reload, 2 back/forward).
    fn navigation_type(&self) -> Option<i64>;
    /// Navigation start timestamp, on the same clock as the head-stage
    /// observer's captured value.
    fn navigation_start(&self) -> Option<f64>;
    /// Timing entry for the resource at the given absolute URL.
    fn resource_entry(&self, url: &str) -> Option<TimingSnapshot>;
}

/// DOM lookup of the measurement target.
pub trait PageElementSource: Send + Sync {
    /// The main image of the file page, or `None` when this page type does
    /// not carry one.
    fn main_image(&self) -> Option<PageElement>;
}

/// Passive feature detection for cross-origin loading support.
pub trait PlatformSupport: Send + Sync {
    /// Credentialed XHR is available.
    fn credentialed_xhr(&self) -> bool;
    /// The legacy cross-domain request object exists.
    fn xdomain_request(&self) -> bool;
    /// Image elements accept a cross-origin attribute.
    fn img_cross_origin_attribute(&self) -> bool;
    /// Script elements accept a cross-origin attribute.
    fn script_cross_origin_attribute(&self) -> bool;
}

/// The head-stage onload observer, installed by an earlier-loading script.
pub trait HeadObserver: Send + Sync {
    /// Timestamp captured when the target image finished loading, on the
    /// navigation-timing clock. Exactly 0 means the image was already
    /// complete when first checked (cached); `None` means unmeasurable.
    fn captured_load_time(&self) -> Option<f64>;
}

/// Page lifecycle events the collectors suspend on.
#[async_trait]
pub trait PageEvents: Send + Sync {
    /// Resolves once the whole page (not just the target image) has finished
    /// loading. Resolves immediately if it already has.
    async fn page_loaded(&self);
}

/// Script injection into the host page, used by the active cross-origin
/// probe. Implementations must settle on load OR error: an injected script
/// that never runs still resolves, it just leaves its marker unset.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load_script(&self, url: &str, cross_origin: bool);
}

/// Bundle of capability handles a host wires up once per page view and hands
/// to the collector factories.
#[derive(Clone)]
pub struct Capabilities {
    pub location: Arc<dyn LocationSource>,
    pub config: Arc<dyn ConfigSource>,
    pub geo: Arc<dyn GeoSource>,
    pub sink: Arc<dyn EventSink>,
    pub timing: Arc<dyn TimingSource>,
    pub page: Arc<dyn PageElementSource>,
    pub platform: Arc<dyn PlatformSupport>,
    pub head: Arc<dyn HeadObserver>,
    pub events: Arc<dyn PageEvents>,
    pub scripts: Arc<dyn ScriptLoader>,
}

/// Fixed page location.
#[derive(Debug, Clone)]
pub struct StaticLocation(pub String);

impl LocationSource for StaticLocation {
    fn protocol(&self) -> String {
        self.0.clone()
    }
}

/// Geography from a fixed, optional country code.
#[derive(Debug, Clone, Default)]
pub struct StaticGeo {
    pub country: Option<String>,
}

impl GeoSource for StaticGeo {
    fn country(&self) -> Option<String> {
        self.country.clone()
    }
}

/// A page that has already finished loading; `page_loaded` resolves at once.
#[derive(Debug, Clone, Default)]
pub struct LoadedPage;

#[async_trait]
impl PageEvents for LoadedPage {
    async fn page_loaded(&self) {}
}

//! Measures how long the main image of a file page took to load, combining
//! three independent signal groups with graceful degradation: navigation
//! type, resource timing, and a head-stage onload fallback.

use std::sync::Arc;

use tracing::debug;

use crate::logger::{EventLogger, MetricLogger};
use crate::sources::{Capabilities, HeadObserver, PageElementSource, PageEvents, TimingSource};
use crate::types::{json_number, MetricEvent, PageElement};

/// Schema the loading-time events are tagged with.
pub const LOADING_TIME_SCHEMA: &str = "ImageMetricsLoadingTime";

/// The only measurement context supported: the main image of a file page.
const IMAGE_TYPE: &str = "filepage-main";

fn navigation_type_name(code: i64) -> Option<&'static str> {
    match code {
        0 => Some("navigate"),
        1 => Some("reload"),
        2 => Some("back_forward"),
        _ => None,
    }
}

/// Single-use collector for image-load timing. Created per page view, runs
/// one collection cycle once the page has fully loaded, then is discarded.
pub struct LoadingTimeCollector {
    logger: EventLogger,
    timing: Arc<dyn TimingSource>,
    page: Arc<dyn PageElementSource>,
    head: Arc<dyn HeadObserver>,
    events: Arc<dyn PageEvents>,
}

impl LoadingTimeCollector {
    /// Factory wiring the capability handles; `sampling_factor` must already
    /// be resolved for this session.
    pub fn create(sampling_factor: f64, caps: &Capabilities) -> Self {
        Self {
            logger: EventLogger::new(sampling_factor, caps),
            timing: Arc::clone(&caps.timing),
            page: Arc::clone(&caps.page),
            head: Arc::clone(&caps.head),
            events: Arc::clone(&caps.events),
        }
    }

    /// Waits for the page's full-load event (so resource timing and the
    /// fallback observer are maximally available), then collects once.
    pub async fn install(self) {
        self.events.page_loaded().await;
        self.collect();
    }

    /// Runs one collection cycle. Aborts with no event when the target image
    /// is absent; that is a normal outcome for page types without one.
    pub fn collect(&self) {
        let Some(image) = self.page.main_image() else {
            debug!("no main image on this page, skipping loading-time collection");
            return;
        };

        let mut event = MetricEvent::new();
        event.set("imageType", IMAGE_TYPE);

        self.add_navigation_type(&mut event);
        let timed = self.add_resource_timing(&mut event, &image);
        self.add_auxiliary_data(&mut event, &image, timed);

        self.log(event);
    }

    fn add_navigation_type(&self, event: &mut MetricEvent) {
        if let Some(name) = self.timing.navigation_type().and_then(navigation_type_name) {
            event.set("navigationType", name);
        }
    }

    /// Adds the resource-timing fields when the browser has an entry for the
    /// image's absolute URL; returns whether one was found.
    ///
    /// - `ownLoadingTime`: net time the browser spent loading the image.
    /// - `fullLoadingTime`: time from opening the page to finishing the load.
    /// - `fetchDelay`: request to first byte, only when response-start is
    ///   reported and non-zero.
    fn add_resource_timing(&self, event: &mut MetricEvent, image: &PageElement) -> bool {
        let Some(timing) = self.timing.resource_entry(&image.src) else {
            return false;
        };

        event.set("ownLoadingTime", json_number(timing.duration));
        event.set("fullLoadingTime", json_number(timing.response_end));
        if let Some(response_start) = timing.response_start {
            if response_start != 0.0 {
                event.set("fetchDelay", json_number(response_start - timing.start_time));
            }
        }
        true
    }

    /// Adds the non-timing-API signals: the file-type tag, and, only when
    /// resource timing was unavailable, the head-stage observer fallback.
    /// An observer value of 0 means the image was already loaded (cached) and
    /// is emitted as 0, never conflated with "unmeasurable".
    fn add_auxiliary_data(&self, event: &mut MetricEvent, image: &PageElement, timed: bool) {
        if let Some(file_type) = image.file_type() {
            event.set("fileType", file_type);
        }

        if timed {
            return;
        }
        match self.head.captured_load_time() {
            Some(captured) if captured == 0.0 => {
                event.set("fallbackFullLoadingTime", 0);
            }
            Some(captured) => {
                if let Some(navigation_start) = self.timing.navigation_start() {
                    event.set(
                        "fallbackFullLoadingTime",
                        json_number(captured - navigation_start),
                    );
                }
            }
            None => {}
        }
    }
}

impl MetricLogger for LoadingTimeCollector {
    fn schema(&self) -> &'static str {
        LOADING_TIME_SCHEMA
    }

    fn logger(&self) -> &EventLogger {
        &self.logger
    }
}

pub mod config;
pub mod cors;
pub mod loading_time;
pub mod logger;
pub mod sampler;
pub mod sources;
pub mod types;

pub use config::{keys, MemoryConfig, SamplingRates};
pub use cors::{CorsSupportCollector, CORS_SUPPORT_SCHEMA};
pub use loading_time::{LoadingTimeCollector, LOADING_TIME_SCHEMA};
pub use logger::{EventLogger, MetricLogger};
pub use sampler::RandomSampler;
pub use sources::{
    Capabilities, ConfigSource, EventSink, GeoSource, HeadObserver, LoadedPage, LocationSource,
    PageElementSource, PageEvents, PlatformSupport, ScriptLoader, StaticGeo, StaticLocation,
    TimingSource,
};
pub use types::{FeatureProbeResult, MetricEvent, PageElement, TimingSnapshot};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::cors::*;
    pub use crate::loading_time::*;
    pub use crate::logger::*;
    pub use crate::sampler::*;
    pub use crate::sources::*;
    pub use crate::types::*;
}

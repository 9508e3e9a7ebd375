//! Intent lifecycle and matching core.
//!
//! The [`IntentManager`] owns the canonical intent store and composes the
//! other components: the [`ProcessingPipeline`] and [`Processor`] that run
//! intents through stages and type-specific handlers, the
//! [`MatchingEngine`] that pairs compatible intents, and the
//! [`LifecycleTracker`] that follows status transitions and expiry.

pub mod event_bus;
pub mod lifecycle;
pub mod manager;
pub mod matching;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod topics;

pub use event_bus::EventBus;
pub use lifecycle::{IntentTracker, LifecycleCallback, LifecycleSettings, LifecycleTracker};
pub use manager::{IntentManager, IntentManagerBuilder, IntentSubscription, MatchingStatus};
pub use matching::{MatchingEngine, MatchingRule, MatchingSettings};
pub use metrics::{ManagerMetrics, ProcessorMetrics};
pub use pipeline::{PipelineSettings, ProcessingPipeline, ProcessingStage};
pub use processor::{HandlerRegistry, IntentHandler, Processor, ProcessorSettings};
pub use topics::resolve_topic;

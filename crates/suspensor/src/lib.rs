//! Cooperative suspension for poll-driven renderers.
//!
//! A [`Resource`] wraps one asynchronous operation behind a non-blocking
//! [`Resource::read`]. A [`ResourceCache`] deduplicates resources by a
//! normalized key, a [`TransitionScheduler`] decides when a busy indicator is
//! worth showing, and a [`RevealGroup`] sequences how several suspended
//! subtrees drop their fallbacks. [`SuspenseBoundary`] is the retry loop that
//! ties reads back to rendering.

pub mod boundary;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod readiness;
pub mod resource;
pub mod reveal;
pub mod scenario;
pub mod transition;

pub use boundary::{BoundaryStats, BoundaryView, FallbackRenderer, Resolved, SuspenseBoundary};
pub use cache::{
    CacheMetrics, CaseInsensitive, EvictionPolicy, ExactKey, KeyNormalizer, LruEviction,
    NeverEvict, ResourceCache,
};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{CacheConfig, Config, ConfigError, RevealConfig};
pub use error::{ReadError, SuspensorError};
pub use readiness::{ReadyState, Readiness};
pub use resource::{Read, Resource, ResourceId, ResourceStatus, Settle, Suspension};
pub use reveal::{RevealGroup, RevealItem, RevealOrder, RevealPlan, SlotPlan, SlotView};
pub use transition::{
    BusyPhase, TransitionConfig, TransitionHandle, TransitionId, TransitionScheduler,
    TransitionStatus, TransitionWindow,
};

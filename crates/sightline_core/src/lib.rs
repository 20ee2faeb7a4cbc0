//! Sightline Core Runtime
//!
//! This crate provides the foundational primitives for the Sightline
//! position-observer runtime:
//!
//! - **Geometry**: viewport rectangles, intersection, and relative-position
//!   classification
//! - **Frame Scheduling**: the measure/mutate two-phase frame pump that all
//!   layout reads and DOM writes go through
//! - **Observables**: keyed handler registries with deterministic fire order
//! - **Debounced Passes**: trailing-edge coalescing for resize/re-scan storms
//! - **Host Services**: traits for the collaborators the embedding host owns
//!   (viewport, viewer, action dispatch, document root)
//! - **Document Context**: per-document service registry and dependency
//!   injection
//!
//! # Example
//!
//! ```rust
//! use sightline_core::geometry::{relative_position, Rect, RelativePosition};
//!
//! let viewport = Rect::new(0.0, 0.0, 800.0, 500.0);
//! let below = Rect::new(0.0, 1000.0, 800.0, 300.0);
//! assert_eq!(relative_position(&below, &viewport), RelativePosition::Bottom);
//! ```

pub mod component;
pub mod config;
pub mod deferred;
pub mod error;
pub mod geometry;
pub mod host;
pub mod observable;
pub mod pass;
pub mod services;
pub mod vsync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use component::{Component, ComponentId, ComponentRegistry};
pub use config::{parse_margin_pair, parse_ratio_pair, parse_trigger, RatioPair};
pub use deferred::Deferred;
pub use error::ConfigError;
pub use geometry::{
    adjust_margins, exceeds_ratio, relative_position, Length, Margins, Rect, RelativePosition,
};
pub use host::{
    ActionEvent, ActionService, ActionTrust, AttributeHit, DocumentRoot, ElementId,
    ViewerService, ViewportService,
};
pub use observable::{HandlerId, Observable};
pub use pass::Pass;
pub use services::{DocumentContext, ServiceRegistry};
pub use vsync::{FrameScheduler, FrameTask, Phase};

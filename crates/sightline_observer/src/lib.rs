//! Sightline Position Observer
//!
//! The geometry-observation subsystem: a per-document service that samples
//! element rectangles against the viewport once per frame and dispatches
//! change-only position entries, plus the consumers built on top of it:
//!
//! - **Position Observer**: the registry + measurement pass
//!   ([`position::PositionObserver`])
//! - **Visibility Policy**: host visibility × ratio hysteresis × trigger
//!   state → enter/exit/progress ([`visibility::VisibilityEngine`])
//! - **Scroll-bound Scenes**: normalized scroll ticks and duration events
//!   for scroll-driven timelines ([`scene::ScrollboundScene`])
//! - **Playback Gating**: triggered/visible gating over an abstract runner
//!   with debounced restart ([`playback::PlaybackGate`])
//! - **Visibility Watcher**: the attribute-configured component firing
//!   `enter`/`exit`/`progress` actions ([`watcher::VisibilityWatcher`])
//! - **Parallax**: scroll-driven translation through the measure/mutate
//!   pump ([`parallax::ParallaxController`])

pub mod parallax;
pub mod playback;
pub mod position;
pub mod scene;
pub mod visibility;
pub mod watcher;

pub use parallax::ParallaxController;
pub use playback::{Playback, PlaybackGate};
pub use position::{Fidelity, PositionEntry, PositionObserver, SubscriptionId};
pub use scene::ScrollboundScene;
pub use visibility::{VisibilityConfig, VisibilityEngine, VisibilityEvent};
pub use watcher::VisibilityWatcher;

//! Visibility policy engine
//!
//! Combines three inputs into one `visible` boolean and the events hanging
//! off its edges: the trigger state (has the consumer been activated at
//! all), host visibility (is the tab/frame visible), and scene visibility
//! (ratio thresholds against the margin-adjusted viewport).
//!
//! Policy, in priority order:
//!
//! 1. Not triggered: no output at all.
//! 2. Host not visible: not visible; the true→false edge fires exit with a
//!    final progress snapshot exactly once.
//! 3. Scene is the top-level document root: visible mirrors host visibility
//!    directly, no ratio math.
//! 4. Otherwise classify the position rect against the margin-adjusted
//!    viewport. `Inside` is visible regardless of thresholds; `Top`/`Bottom`
//!    are visible iff the exposed height fraction meets the
//!    direction-appropriate ratio — with hysteresis, comparing against the
//!    `start` pair while hidden and the `end` pair while visible, so the
//!    boundary cannot flicker.
//!
//! Equal inputs are idempotent: replaying the same host state or position
//! entry emits nothing.

use sightline_core::config::RatioPair;
use sightline_core::geometry::{
    adjust_margins, exceeds_ratio, relative_position, Margins, RelativePosition,
};

use crate::position::PositionEntry;

/// Hysteresis thresholds plus viewport margins for one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VisibilityConfig {
    /// Ratios required to become visible.
    pub start: RatioPair,
    /// Ratios required to stay visible. Defaults equal to `start`, which
    /// collapses the hysteresis to a single boundary.
    pub end: RatioPair,
    pub margins: Margins,
}

impl VisibilityConfig {
    pub fn with_ratios(start: RatioPair, end: RatioPair) -> Self {
        Self {
            start,
            end,
            margins: Margins::default(),
        }
    }
}

/// Events emitted on visibility edges and while visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibilityEvent {
    Enter,
    /// The final progress snapshot accompanies the exit: `0.0` when the
    /// scene sits toward the viewport bottom, else `1.0`.
    Exit { final_progress: f32 },
    /// Continuous progress while visible:
    /// `1 − position.top / adjusted_viewport.height`, unclamped.
    Progress { progress: f32 },
}

pub struct VisibilityEngine {
    config: VisibilityConfig,
    scene_is_root: bool,
    triggered: bool,
    host_visible: bool,
    visible: bool,
    last_entry: Option<PositionEntry>,
    last_relative: Option<RelativePosition>,
    sink: Box<dyn FnMut(VisibilityEvent) + Send>,
}

impl VisibilityEngine {
    pub fn new(
        config: VisibilityConfig,
        scene_is_root: bool,
        sink: impl FnMut(VisibilityEvent) + Send + 'static,
    ) -> Self {
        Self {
            config,
            scene_is_root,
            triggered: false,
            host_visible: false,
            visible: false,
            last_entry: None,
            last_relative: None,
            sink: Box::new(sink),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Activate or deactivate the consumer. Deactivation silences the
    /// engine without an exit event: an untriggered engine produces no
    /// output at all.
    pub fn set_triggered(&mut self, triggered: bool) {
        if self.triggered == triggered {
            return;
        }
        self.triggered = triggered;
        if triggered {
            self.evaluate(false);
        } else {
            self.visible = false;
        }
    }

    /// Feed a host (tab/frame) visibility change.
    pub fn host_visibility_changed(&mut self, host_visible: bool) {
        if self.host_visible == host_visible {
            return;
        }
        self.host_visible = host_visible;
        if !self.triggered {
            return;
        }
        self.evaluate(false);
    }

    /// Feed a scene position update.
    pub fn position_changed(&mut self, entry: &PositionEntry) {
        if self.last_entry.as_ref() == Some(entry) {
            return;
        }
        self.last_entry = Some(entry.clone());
        if !self.triggered {
            return;
        }
        self.evaluate(true);
    }

    fn evaluate(&mut self, from_position: bool) {
        let was_visible = self.visible;
        let now_visible = self.compute_visible();

        if was_visible && !now_visible {
            let final_progress = match self.last_relative {
                Some(RelativePosition::Bottom) => 0.0,
                _ => 1.0,
            };
            tracing::debug!(final_progress, "visibility exit");
            (self.sink)(VisibilityEvent::Exit { final_progress });
        }
        if !was_visible && now_visible {
            tracing::debug!("visibility enter");
            (self.sink)(VisibilityEvent::Enter);
        }
        self.visible = now_visible;

        if now_visible && from_position {
            if let Some(progress) = self.current_progress() {
                (self.sink)(VisibilityEvent::Progress { progress });
            }
        }
    }

    fn compute_visible(&mut self) -> bool {
        if !self.triggered || !self.host_visible {
            return false;
        }
        if self.scene_is_root {
            return true;
        }
        let Some(entry) = &self.last_entry else {
            return false;
        };
        let adjusted = adjust_margins(&entry.viewport_rect, &self.config.margins);
        let Some(position) = &entry.position_rect else {
            self.last_relative = Some(entry.relative_position);
            return false;
        };
        let relative = relative_position(position, &adjusted);
        self.last_relative = Some(relative);

        match relative {
            RelativePosition::Inside => true,
            RelativePosition::Outside => false,
            RelativePosition::Top => {
                let ratio = if self.visible {
                    self.config.end.top
                } else {
                    self.config.start.top
                };
                exceeds_ratio(position, &adjusted, relative, ratio)
            }
            RelativePosition::Bottom => {
                let ratio = if self.visible {
                    self.config.end.bottom
                } else {
                    self.config.start.bottom
                };
                exceeds_ratio(position, &adjusted, relative, ratio)
            }
        }
    }

    fn current_progress(&self) -> Option<f32> {
        let entry = self.last_entry.as_ref()?;
        let position = entry.position_rect.as_ref()?;
        let adjusted = adjust_margins(&entry.viewport_rect, &self.config.margins);
        Some(1.0 - position.top / adjusted.height)
    }
}
